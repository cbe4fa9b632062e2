//! Common test utilities for E2E tests

#![allow(dead_code)]

use imageboard::data::User;
use imageboard::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects, so tests can inspect them
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        imageboard::metrics::init_metrics();

        // Create temporary directory for test database and media
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let media_root = temp_dir.path().join("media");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            storage: config::StorageConfig {
                media: config::MediaStorageConfig {
                    root: media_root,
                    public_url: "/media".to_string(),
                    max_upload_bytes: 1024 * 1024,
                    thumbnail_size: 64,
                    formats: config::default_media_formats(),
                },
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
            },
            admin: config::AdminConfig {
                username: "admin".to_string(),
                password: Some("admin-password".to_string()),
            },
            board: config::BoardConfig {
                gallery_page_size: 40,
            },
            embed: config::EmbedConfig {
                fetch_info: false,
                timeout_seconds: 1,
                excluded_backends: Vec::new(),
            },
            cache: config::CacheConfig {
                embed_info_ttl: 60,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = imageboard::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a regular user with `TEST_PASSWORD`
    pub async fn create_user(&self, username: &str) -> User {
        let hash = imageboard::auth::hash_password(TEST_PASSWORD).unwrap();
        self.state.db.create_user(username, &hash, false).await.unwrap()
    }

    /// The bootstrapped admin account
    pub async fn admin(&self) -> User {
        self.state
            .db
            .get_user_by_username("admin")
            .await
            .unwrap()
            .expect("admin account is bootstrapped")
    }

    /// `Cookie` header value carrying a valid session for `user`
    pub fn session_cookie(&self, user: &User) -> String {
        use imageboard::auth::{SESSION_COOKIE, Session, create_session_token};

        let session = Session::for_user(user, 3600);
        let token = create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test session");
        format!("{}={}", SESSION_COOKIE, token)
    }

    /// Submit the new-post form as `user`
    pub async fn create_post(&self, user: &User, title: &str, image: Vec<u8>) -> reqwest::Response {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("body", format!("{} body", title))
            .part(
                "image",
                reqwest::multipart::Part::bytes(image).file_name("upload.png"),
            );

        self.client
            .post(self.url("/post/add"))
            .header("Cookie", self.session_cookie(user))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

/// Redirect target of a response
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Every `Set-Cookie` header joined for substring checks
pub fn set_cookies(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Solid-colour PNG; different colours give different content hashes
pub fn png(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    let image = RgbImage::from_pixel(width, height, Rgb(colour));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .unwrap();
    buffer
}
