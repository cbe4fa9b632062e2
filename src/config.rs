//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    pub board: BoardConfig,
    pub embed: EmbedConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "board.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://board.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub media: MediaStorageConfig,
}

/// Media storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaStorageConfig {
    /// Directory holding uploaded files, named by content hash
    pub root: PathBuf,
    /// URL prefix the media directory is served under
    pub public_url: String,
    /// Upload size limit in bytes (default: 5 MiB)
    pub max_upload_bytes: usize,
    /// Longest edge of generated thumbnails in pixels
    pub thumbnail_size: u32,
    /// Enabled decoders, keyed by decoder name
    #[serde(default = "default_media_formats")]
    pub formats: BTreeMap<String, FormatSpec>,
}

/// How a decoder is presented on the board
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FormatSpec {
    /// Short code stored in source attributes (e.g. "GIF")
    pub code: String,
    /// Whether files of this format may be animated
    pub animated: bool,
}

impl FormatSpec {
    fn new(code: &str, animated: bool) -> Self {
        Self {
            code: code.to_string(),
            animated,
        }
    }
}

/// Default decoder table
///
/// `FFMPEG` covers every recognised video container.
pub fn default_media_formats() -> BTreeMap<String, FormatSpec> {
    BTreeMap::from([
        ("JPEG".to_string(), FormatSpec::new("JPG", false)),
        ("PNG".to_string(), FormatSpec::new("PNG", false)),
        ("ICO".to_string(), FormatSpec::new("ICO", false)),
        ("GIF".to_string(), FormatSpec::new("GIF", true)),
        ("FFMPEG".to_string(), FormatSpec::new("VIDEO", true)),
    ])
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Bootstrap superuser, created on startup when a password is configured
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    pub password: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: None,
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

/// Board presentation settings
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Posts per gallery page (default: 40)
    pub gallery_page_size: i64,
}

/// Embedded media settings
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedConfig {
    /// Query oEmbed endpoints for titles and sizes
    pub fetch_info: bool,
    /// oEmbed request timeout in seconds
    pub timeout_seconds: u64,
    /// Backends never queried server-side (e.g. "SoundCloud")
    #[serde(default)]
    pub excluded_backends: Vec<String>,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// oEmbed info TTL in seconds (default: 86400)
    pub embed_info_ttl: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (IMAGEBOARD__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/imageboard.db")?
            .set_default("storage.media.root", "data/media")?
            .set_default("storage.media.public_url", "/media")?
            .set_default("storage.media.max_upload_bytes", 5 * 1024 * 1024)?
            .set_default("storage.media.thumbnail_size", 420)?
            .set_default("auth.session_max_age", 604800)?
            .set_default("board.gallery_page_size", 40)?
            .set_default("embed.fetch_info", true)?
            .set_default("embed.timeout_seconds", 10)?
            .set_default("cache.embed_info_ttl", 86400)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("IMAGEBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.storage.media.max_upload_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "storage.media.max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        let public_url = self.storage.media.public_url.trim_end_matches('/');
        if !public_url.starts_with('/') || public_url.len() < 2 {
            return Err(crate::error::AppError::Config(
                "storage.media.public_url must be a path below the site root, e.g. /media"
                    .to_string(),
            ));
        }

        if self.board.gallery_page_size <= 0 {
            return Err(crate::error::AppError::Config(
                "board.gallery_page_size must be greater than 0".to_string(),
            ));
        }

        if self.storage.media.formats.is_empty() {
            return Err(crate::error::AppError::Config(
                "storage.media.formats must enable at least one decoder".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/imageboard-test.db"),
            },
            storage: StorageConfig {
                media: MediaStorageConfig {
                    root: PathBuf::from("/tmp/imageboard-media"),
                    public_url: "/media".to_string(),
                    max_upload_bytes: 5 * 1024 * 1024,
                    thumbnail_size: 420,
                    formats: default_media_formats(),
                },
            },
            auth: AuthConfig {
                session_secret: "x".repeat(32),
                session_max_age: 604_800,
            },
            admin: AdminConfig::default(),
            board: BoardConfig {
                gallery_page_size: 40,
            },
            embed: EmbedConfig {
                fetch_info: false,
                timeout_seconds: 10,
                excluded_backends: Vec::new(),
            },
            cache: CacheConfig {
                embed_info_ttl: 86_400,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.should_use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_http_for_non_local_domain() {
        let mut config = valid_config();
        config.server.domain = "board.example.com".to_string();
        config.server.protocol = "http".to_string();

        let error = config
            .validate()
            .expect_err("public domains must require https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("server.protocol must be https")
        ));
    }

    #[test]
    fn validate_rejects_empty_format_table() {
        let mut config = valid_config();
        config.storage.media.formats.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn default_formats_mark_gif_and_video_as_animated() {
        let formats = default_media_formats();
        assert_eq!(formats["GIF"], FormatSpec::new("GIF", true));
        assert_eq!(formats["FFMPEG"], FormatSpec::new("VIDEO", true));
        assert!(!formats["JPEG"].animated);
    }
}
