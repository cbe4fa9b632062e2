//! E2E tests for the media gallery

mod common;

use common::{TestServer, png};
use imageboard::data::User;

const MP4_HEADER: &[u8] = b"\0\0\0\x18ftypmp42\0\0\0\0isommp42";

fn animated_gif() -> Vec<u8> {
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgba, RgbaImage};

    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        let frames = [0u8, 255].into_iter().map(|shade| {
            Frame::new(RgbaImage::from_pixel(6, 6, Rgba([shade, 0, 0, 255])))
        });
        encoder.encode_frames(frames).unwrap();
    }
    buffer
}

async fn upload(server: &TestServer, user: &User, title: &str, file_name: &str, data: Vec<u8>) {
    let form = reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("body", "body")
        .part("image", reqwest::multipart::Part::bytes(data).file_name(file_name.to_string()));

    let response = server
        .client
        .post(server.url("/post/add"))
        .header("Cookie", server.session_cookie(user))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection(), "upload of {} failed", file_name);
}

async fn gallery(server: &TestServer, user: &User, query: &str) -> String {
    server
        .client
        .get(server.url(&format!("/gallery{}", query)))
        .header("Cookie", server.session_cookie(user))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_gallery_renders_each_media_kind() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    upload(&server, &user, "Still", "still.png", png(20, 20, [10, 20, 30])).await;
    upload(&server, &user, "Moving", "moving.gif", animated_gif()).await;
    upload(&server, &user, "Clip", "clip.mp4", MP4_HEADER.to_vec()).await;

    let page = gallery(&server, &user, "").await;

    // Still images show their thumbnail
    assert!(page.contains(r#"src="/media/thumbs/"#));
    // Animated GIFs play in place
    assert!(page.contains(r#"class="media animated""#));
    // Videos get a player
    assert!(page.contains("<video"));
    assert!(page.contains(".mp4"));
}

#[tokio::test]
async fn test_gallery_records_source_attributes() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    upload(&server, &user, "Moving", "moving.gif", animated_gif()).await;
    upload(&server, &user, "Still", "still.gif", {
        use image::{ImageOutputFormat, Rgba, RgbaImage};
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])))
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageOutputFormat::Gif)
            .unwrap();
        buffer
    })
    .await;

    let posts = server.state.db.list_posts(10, 0).await.unwrap();
    for post in posts {
        let name = post.image.unwrap();
        let attributes = server
            .state
            .db
            .get_source_attributes(&name)
            .await
            .unwrap()
            .expect("attributes recorded on upload");
        assert_eq!(attributes.format.as_deref(), Some("GIF"));
        assert_eq!(attributes.animated, post.title == "Moving");
    }
}

#[tokio::test]
async fn test_gallery_is_empty_without_posts() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    let page = gallery(&server, &user, "?page=7").await;

    assert!(page.contains(r#"<section class="gallery"></section>"#));
    assert!(page.contains(r#"<span class="current">1</span>"#));
}
