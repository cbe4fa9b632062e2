//! E2E tests for profile settings

mod common;

use common::{TestServer, location, set_cookies};

#[tokio::test]
async fn test_profile_page_shows_defaults() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    let response = server
        .client
        .get(server.url("/profile"))
        .header("Cookie", server.session_cookie(&user))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"name="pagination""#));
    assert!(body.contains(r#"name="comment_filter""#));
    assert!(body.contains(r#"name="activity""#));
    assert!(body.contains(r#"name="nightmode""#));

    // Visiting the profile page creates the row with defaults
    let profile = server.state.db.get_or_create_profile(user.id).await.unwrap();
    assert_eq!(profile.pagination, 10);
    assert_eq!(profile.comment_filter, 5);
    assert_eq!(profile.activity, 10);
    assert!(!profile.nightmode);
}

#[tokio::test]
async fn test_profile_update_is_saved() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/profile"))
        .header("Cookie", server.session_cookie(&user))
        .form(&[
            ("pagination", "25"),
            ("comment_filter", "3"),
            ("activity", "15"),
            ("nightmode", "on"),
        ])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
    assert!(set_cookies(&response).contains("flash=Profile%20Successfully%20Updated."));

    let profile = server.state.db.get_or_create_profile(user.id).await.unwrap();
    assert_eq!(profile.pagination, 25);
    assert_eq!(profile.comment_filter, 3);
    assert_eq!(profile.activity, 15);
    assert!(profile.nightmode);

    let feed = server
        .client
        .get(server.url("/"))
        .header("Cookie", server.session_cookie(&user))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(feed.contains(r#"<body class="night">"#));
}

#[tokio::test]
async fn test_unchecked_nightmode_turns_it_off() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;
    let mut profile = server.state.db.get_or_create_profile(user.id).await.unwrap();
    profile.nightmode = true;
    server.state.db.update_profile(&profile).await.unwrap();

    server
        .client
        .post(server.url("/profile"))
        .header("Cookie", server.session_cookie(&user))
        .form(&[("pagination", "10"), ("comment_filter", "5"), ("activity", "10")])
        .send()
        .await
        .unwrap();

    let profile = server.state.db.get_or_create_profile(user.id).await.unwrap();
    assert!(!profile.nightmode);
}

#[tokio::test]
async fn test_profile_rejects_unlisted_choice() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    let response = server
        .client
        .post(server.url("/profile"))
        .header("Cookie", server.session_cookie(&user))
        .form(&[("pagination", "7"), ("comment_filter", "5"), ("activity", "10")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("Select a valid choice for pagination."));

    let profile = server.state.db.get_or_create_profile(user.id).await.unwrap();
    assert_eq!(profile.pagination, 10);
}

#[tokio::test]
async fn test_activity_list_follows_profile_length() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;
    let image = common::png(8, 8, [0, 0, 0]);
    for n in 0..7 {
        server.create_post(&user, &format!("Entry {}", n), image.clone()).await;
    }

    server
        .client
        .post(server.url("/profile"))
        .header("Cookie", server.session_cookie(&user))
        .form(&[("pagination", "5"), ("comment_filter", "5"), ("activity", "5")])
        .send()
        .await
        .unwrap();

    let feed = server
        .client
        .get(server.url("/"))
        .header("Cookie", server.session_cookie(&user))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(feed.matches(r#"<li class="post">"#).count(), 5);
    // The oldest entries live on page two with five posts per page
    assert!(feed.contains("<h2>Entry 6</h2>"));
    assert!(!feed.contains("<h2>Entry 0</h2>"));
}
