//! Imageboard - a small self-hosted image and media board
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Server-rendered board pages and forms                    │
//! │  - Login/logout                                             │
//! │  - Metrics, health, media files                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Posts, comments and media lifecycle                      │
//! │  - Feed/gallery assembly, latest activity                   │
//! │  - Source attributes, media embeds                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Moka in-memory caches                                    │
//! │  - Content-addressed media directory                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and HTML rendering
//! - `service`: Business logic layer
//! - `data`: Database and cache layer
//! - `storage`: Local media storage and decoding
//! - `auth`: Password login and signed sessions
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like database pool, caches, and services.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Media storage (local directory)
    pub storage: Arc<storage::MediaStorage>,

    pub activity: Arc<service::ActivityService>,
    pub board: Arc<service::BoardService>,
    pub posts: Arc<service::PostService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Initialize caches
    /// 3. Prepare the media directory
    /// 4. Wire services
    /// 5. Bootstrap the admin account
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        // 2. Initialize caches
        let activity_cache = Arc::new(data::ActivityCache::new());
        let embed_cache = Arc::new(data::EmbedInfoCache::new(config.cache.embed_info_ttl));
        tracing::info!("Caches initialized");

        // 3. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Imageboard/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.embed.timeout_seconds))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        // 4. Prepare media storage
        let storage = Arc::new(storage::MediaStorage::new(&config.storage.media)?);
        tracing::info!(root = %config.storage.media.root.display(), "Media storage initialized");

        // 5. Wire services
        let formats = Arc::new(config.storage.media.formats.clone());
        let attributes = Arc::new(service::AttributeService::new(
            db.clone(),
            storage.clone(),
            formats.clone(),
        ));
        let activity = Arc::new(service::ActivityService::new(
            db.clone(),
            activity_cache,
        ));
        let embed = Arc::new(service::EmbedService::new(
            http_client,
            embed_cache,
            config.embed.clone(),
        ));
        let board = Arc::new(service::BoardService::new(
            db.clone(),
            storage.clone(),
            attributes.clone(),
            embed,
            config.board.gallery_page_size,
        ));
        let posts = Arc::new(service::PostService::new(
            db.clone(),
            storage.clone(),
            attributes,
            activity.clone(),
            formats,
            config.storage.media.max_upload_bytes,
            config.storage.media.thumbnail_size,
        ));

        // 6. Initialize admin user
        Self::ensure_admin_user(&db, &config).await?;

        metrics::POSTS_TOTAL.set(db.count_posts().await?);

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            storage,
            activity,
            board,
            posts,
        })
    }

    /// Whether cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.should_use_secure_cookies()
    }

    /// Ensure the admin superuser exists with the configured password
    ///
    /// Skipped when no admin password is configured; accounts can then only
    /// be provisioned directly in the database.
    async fn ensure_admin_user(
        db: &data::Database,
        config: &config::AppConfig,
    ) -> Result<(), error::AppError> {
        let Some(password) = config.admin.password.as_deref() else {
            tracing::debug!("No admin password configured; skipping admin bootstrap");
            return Ok(());
        };

        let password_hash = auth::hash_password(password)?;

        if let Some(user) = db.get_user_by_username(&config.admin.username).await? {
            db.update_user_credentials(user.id, &password_hash, true)
                .await?;
            tracing::info!(username = %user.username, "Admin account updated");
            return Ok(());
        }

        let user = db
            .create_user(&config.admin.username, &password_hash, true)
            .await?;
        tracing::info!(username = %user.username, "Admin account created");

        Ok(())
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let media_prefix = state
        .config
        .storage
        .media
        .public_url
        .trim_end_matches('/')
        .to_string();
    let media_files = ServeDir::new(state.storage.root());

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::board_router(state.clone()))
        .nest_service(&media_prefix, media_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
