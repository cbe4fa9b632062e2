//! E2E tests for login, logout and session handling

mod common;

use common::{TEST_PASSWORD, TestServer, location, set_cookies};

#[tokio::test]
async fn test_login_page_renders() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/login?next=/gallery"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    assert!(body.contains(r#"name="password""#));
    assert!(body.contains(r#"value="/gallery""#));
}

#[tokio::test]
async fn test_anonymous_board_request_redirects_to_login() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/gallery?page=2"))
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/login?next=%2Fgallery%3Fpage%3D2");
}

#[tokio::test]
async fn test_login_sets_session_and_redirects_to_next() {
    let server = TestServer::new().await;
    server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[
            ("username", "alice"),
            ("password", TEST_PASSWORD),
            ("next", "/gallery"),
        ])
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/gallery");

    let cookies = set_cookies(&response);
    assert!(cookies.contains("session="));
    assert!(cookies.contains("HttpOnly"));
    assert!(cookies.contains("flash=You%20were%20successfully%20logged%20in."));
}

#[tokio::test]
async fn test_login_message_shows_on_form_page_after_redirect() {
    let server = TestServer::new().await;
    server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[
            ("username", "alice"),
            ("password", TEST_PASSWORD),
            ("next", "/post/add"),
        ])
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(location(&response), "/post/add");

    // Replay the cookies the way a browser would
    let cookie = set_cookies(&response)
        .lines()
        .filter_map(|line| line.split(';').next())
        .collect::<Vec<_>>()
        .join("; ");

    let response = server
        .client
        .get(server.url("/post/add"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert!(set_cookies(&response).contains("flash=;"));
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"<p class="flash">You were successfully logged in.</p>"#));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let server = TestServer::new().await;
    server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[
            ("username", "alice"),
            ("password", TEST_PASSWORD),
            ("next", "//evil.example/"),
        ])
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let server = TestServer::new().await;
    server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[("username", "alice"), ("password", "nope"), ("next", "")])
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert!(!set_cookies(&response).contains("session="));
    let body = response.text().await.unwrap();
    assert!(body.contains("Login failed, please check your credentials and try again."));
}

#[tokio::test]
async fn test_login_of_disabled_account_is_refused() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;
    server.state.db.set_user_active(user.id, false).await.unwrap();

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[("username", "alice"), ("password", TEST_PASSWORD), ("next", "")])
        .send()
        .await
        .expect("request succeeds");

    assert!(!set_cookies(&response).contains("session="));
    let body = response.text().await.unwrap();
    assert!(body.contains("Your account is currently disabled."));
}

#[tokio::test]
async fn test_session_of_disabled_account_is_rejected() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;
    let cookie = server.session_cookie(&user);
    server.state.db.set_user_active(user.id, false).await.unwrap();

    let response = server
        .client
        .get(server.url("/"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/login"));
}

#[tokio::test]
async fn test_tampered_session_is_rejected() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;
    let cookie = format!("{}x", server.session_cookie(&user));

    let response = server
        .client
        .get(server.url("/"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert!(location(&response).starts_with("/login"));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    for method in [reqwest::Method::GET, reqwest::Method::POST] {
        let response = server
            .client
            .request(method, server.url("/logout"))
            .header("Cookie", server.session_cookie(&user))
            .send()
            .await
            .expect("request succeeds");

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/");
        assert!(set_cookies(&response).contains("session=;"));
    }
}

#[tokio::test]
async fn test_admin_is_bootstrapped_from_config() {
    let server = TestServer::new().await;

    let admin = server.admin().await;
    assert!(admin.is_superuser);

    let response = server
        .client
        .post(server.url("/login"))
        .form(&[("username", "admin"), ("password", "admin-password"), ("next", "")])
        .send()
        .await
        .expect("request succeeds");

    assert!(set_cookies(&response).contains("session="));
}
