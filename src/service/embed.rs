//! Embedded media links
//!
//! Recognises YouTube, Vimeo and SoundCloud links, turns them into player
//! URLs and looks up oEmbed info for them.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::EmbedConfig;
use crate::data::{EmbedInfo, EmbedInfoCache};
use crate::error::AppError;

/// Form error for links no backend recognises
pub const UNRECOGNISED_LINK: &str = "Unrecognised media link, supported: YouTube, Vimeo, SoundCloud.";

const MAX_WIDTH: u32 = 420;
const MAX_VIDEO_HEIGHT: u32 = 315;
const MAX_AUDIO_HEIGHT: u32 = 176;

/// Media hosting backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedBackend {
    YouTube,
    Vimeo,
    SoundCloud,
}

impl EmbedBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Vimeo => "Vimeo",
            Self::SoundCloud => "SoundCloud",
        }
    }

    fn oembed_endpoint(&self) -> &'static str {
        match self {
            Self::YouTube => "https://www.youtube.com/oembed",
            Self::Vimeo => "https://vimeo.com/api/oembed.json",
            Self::SoundCloud => "https://soundcloud.com/oembed",
        }
    }

    fn max_height(&self) -> u32 {
        match self {
            Self::SoundCloud => MAX_AUDIO_HEIGHT,
            Self::YouTube | Self::Vimeo => MAX_VIDEO_HEIGHT,
        }
    }
}

/// A recognised media link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub backend: EmbedBackend,
    /// Backend-specific media id (video id, track path)
    pub code: String,
    /// Link as submitted
    pub url: String,
}

impl Embed {
    /// Recognise a media link
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let (backend, code) = match host {
            "youtube.com" | "m.youtube.com" => {
                let code = match segments.as_slice() {
                    ["watch"] => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned()),
                    ["embed", code] => Some(code.to_string()),
                    _ => None,
                }?;
                (EmbedBackend::YouTube, code)
            }
            "youtu.be" => match segments.as_slice() {
                [code] => (EmbedBackend::YouTube, code.to_string()),
                _ => return None,
            },
            "vimeo.com" | "player.vimeo.com" => {
                let code = segments
                    .iter()
                    .find(|s| s.bytes().all(|b| b.is_ascii_digit()))?;
                (EmbedBackend::Vimeo, code.to_string())
            }
            "soundcloud.com" | "m.soundcloud.com" => match segments.as_slice() {
                [artist, track] => (EmbedBackend::SoundCloud, format!("{}/{}", artist, track)),
                _ => return None,
            },
            _ => return None,
        };

        let code_ok = !code.is_empty()
            && code
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'/'));
        if !code_ok {
            return None;
        }

        Some(Self {
            backend,
            code,
            url: raw.to_string(),
        })
    }

    /// Player URL for an iframe
    pub fn player_url(&self) -> String {
        match self.backend {
            EmbedBackend::YouTube => format!("https://www.youtube.com/embed/{}", self.code),
            EmbedBackend::Vimeo => format!("https://player.vimeo.com/video/{}", self.code),
            EmbedBackend::SoundCloud => format!(
                "https://w.soundcloud.com/player/?url={}",
                urlencoding::encode(&self.canonical_url())
            ),
        }
    }

    /// Link in the form the backend's oEmbed endpoint expects
    pub fn canonical_url(&self) -> String {
        match self.backend {
            EmbedBackend::YouTube => format!("https://www.youtube.com/watch?v={}", self.code),
            EmbedBackend::Vimeo => format!("https://vimeo.com/{}", self.code),
            EmbedBackend::SoundCloud => format!("https://soundcloud.com/{}", self.code),
        }
    }

    pub fn max_width(&self) -> u32 {
        MAX_WIDTH
    }

    pub fn max_height(&self) -> u32 {
        self.backend.max_height()
    }
}

/// Validate an optional media link from a form
///
/// Blank input means "no link".
pub fn validate_link(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    match Embed::parse(raw) {
        Some(embed) => Ok(Some(embed.url)),
        None => Err(AppError::Validation(UNRECOGNISED_LINK.to_string())),
    }
}

/// Embed service
///
/// Fetches oEmbed info with a shared HTTP client and caches the outcome.
pub struct EmbedService {
    http_client: reqwest::Client,
    cache: Arc<EmbedInfoCache>,
    config: EmbedConfig,
}

impl EmbedService {
    pub fn new(http_client: reqwest::Client, cache: Arc<EmbedInfoCache>, config: EmbedConfig) -> Self {
        Self {
            http_client,
            cache,
            config,
        }
    }

    /// Whether info for this backend may be fetched server-side
    pub fn fetches(&self, backend: EmbedBackend) -> bool {
        self.config.fetch_info
            && !self
                .config
                .excluded_backends
                .iter()
                .any(|name| name.eq_ignore_ascii_case(backend.name()))
    }

    /// oEmbed info for a link, `None` when disabled or unavailable
    pub async fn info(&self, embed: &Embed) -> Option<Arc<EmbedInfo>> {
        if !self.fetches(embed.backend) {
            return None;
        }

        let key = embed.canonical_url();
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let info = match self.fetch(embed).await {
            Ok(info) => Some(info),
            Err(error) => {
                tracing::warn!(
                    backend = embed.backend.name(),
                    url = %key,
                    %error,
                    "oEmbed lookup failed"
                );
                None
            }
        };

        self.cache.insert(&key, info.clone()).await;
        info.map(Arc::new)
    }

    async fn fetch(&self, embed: &Embed) -> Result<EmbedInfo, AppError> {
        let max_width = embed.max_width().to_string();
        let max_height = embed.max_height().to_string();
        let url = embed.canonical_url();

        let info = self
            .http_client
            .get(embed.backend.oembed_endpoint())
            .query(&[
                ("url", url.as_str()),
                ("maxwidth", max_width.as_str()),
                ("maxheight", max_height.as_str()),
                ("format", "json"),
            ])
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedInfo>()
            .await?;

        Ok(info)
    }
}
