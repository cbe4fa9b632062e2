//! One-shot flash messages carried in a cookie across a redirect
//!
//! `CookieJar` percent-encodes values when writing `Set-Cookie` and decodes
//! them when reading the request, so messages are stored raw.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

const FLASH_COOKIE: &str = "flash";

/// Queue a message for the next rendered page
pub fn push(jar: CookieJar, message: &str, secure: bool) -> CookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, message.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Take the queued message, clearing the cookie
pub fn take(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(message) = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_string()) else {
        return (jar, None);
    };

    let mut removal = Cookie::build((FLASH_COOKIE, "")).path("/").build();
    removal.make_removal();
    (jar.remove(removal), Some(message))
}
