//! Username/password login
//!
//! Implements the form login flow and logout.

use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::password::verify_password;
use super::session::{SESSION_COOKIE, Session, create_session_token};
use crate::AppState;
use crate::api::{LoginForm, flash, views};
use crate::error::AppError;

const LOGIN_FAILED: &str = "Login failed, please check your credentials and try again.";
const ACCOUNT_DISABLED: &str = "Your account is currently disabled.";
const LOGGED_IN: &str = "You were successfully logged in.";

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - POST /login - Credential check
/// - GET|POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout).post(logout))
}

// =============================================================================
// Login Page
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    next: String,
}

/// GET /login
async fn login_page(Query(query): Query<LoginQuery>, jar: CookieJar) -> Response {
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::anonymous(message);
    (jar, views::login_form(&ctx, &query.next, "")).into_response()
}

/// POST /login
///
/// # Steps
/// 1. Look up the user and verify the password
/// 2. Refuse disabled accounts
/// 3. Sign a session and set the cookie
/// 4. Redirect to `next` when it is a local path
async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = state.db.get_user_by_username(form.username.trim()).await?;

    let verified = match &user {
        Some(user) => verify_password(&form.password, &user.password_hash).unwrap_or_else(|error| {
            tracing::warn!(%error, user = %user.username, "Stored password hash is unusable");
            false
        }),
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::info!(username = %form.username, "Login failed");
            return Ok(rejected(&form, LOGIN_FAILED));
        }
    };

    if !user.is_active {
        tracing::info!(user = %user.username, "Login refused for disabled account");
        return Ok(rejected(&form, ACCOUNT_DISABLED));
    }

    let session = Session::for_user(&user, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;
    let secure = state.secure_cookies();

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    let jar = flash::push(jar.add(cookie), LOGGED_IN, secure);

    tracing::info!(user = %user.username, "User logged in");

    Ok((jar, Redirect::to(safe_next(&form.next))).into_response())
}

fn rejected(form: &LoginForm, message: &str) -> Response {
    let ctx = views::PageContext::anonymous(Some(message.to_string()));
    views::login_form(&ctx, &form.next, &form.username).into_response()
}

/// Post-login target, restricted to same-site paths
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\") {
        next
    } else {
        "/"
    }
}

// =============================================================================
// Logout
// =============================================================================

/// GET|POST /logout
///
/// Clears session cookie and redirects home.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let mut removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    removal.make_removal();
    (jar.remove(removal), Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next("/gallery?page=2"), "/gallery?page=2");
        assert_eq!(safe_next(""), "/");
        assert_eq!(safe_next("https://evil.example"), "/");
        assert_eq!(safe_next("//evil.example"), "/");
        assert_eq!(safe_next("/\\evil.example"), "/");
    }
}
