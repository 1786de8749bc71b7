//! Upstream Plex client.
//!
//! Everything the aggregator needs is behind the [`PlexServer`] trait so
//! tests can run against a canned server. The real client speaks the JSON
//! flavor of the Plex HTTP API with the token attached to every request as
//! a query credential.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PlexError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// The envelope every Plex endpoint wraps its payload in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaContainer {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "Directory", default)]
    pub directory: Vec<Section>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MediaContainer", default)]
    media_container: MediaContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
}

/// A library item or active session. Series-level fields (`grandparent*`)
/// are present for episodes and absent for movies and music.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "grandparentTitle", default)]
    pub grandparent_title: Option<String>,
    #[serde(rename = "grandparentThumb", default)]
    pub grandparent_thumb: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(rename = "addedAt", default)]
    pub added_at: Option<i64>,
    #[serde(rename = "librarySectionTitle", default)]
    pub library_section_title: Option<String>,
    #[serde(rename = "User", default)]
    pub user: Option<SessionUser>,
    #[serde(rename = "TranscodeSession", default)]
    pub transcode_session: Option<TranscodeSession>,
    #[serde(rename = "Media", default)]
    pub media: Vec<MediaStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscodeSession {
    #[serde(rename = "videoDecision", default)]
    pub video_decision: Option<String>,
    #[serde(rename = "audioDecision", default)]
    pub audio_decision: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaStream {
    /// Stream bitrate in kbps.
    #[serde(default)]
    pub bitrate: Option<u64>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// The queries one status cycle is built from.
#[async_trait]
pub trait PlexServer: Send + Sync {
    /// Lightweight reachability probe (`GET /`).
    async fn probe(&self) -> Result<(), PlexError>;
    async fn library_sections(&self) -> Result<Vec<Section>, PlexError>;
    async fn section_size(&self, key: &str) -> Result<u64, PlexError>;
    async fn recently_added(&self) -> Result<Vec<MediaItem>, PlexError>;
    async fn sessions(&self) -> Result<MediaContainer, PlexError>;
    /// Raw image bytes for a thumbnail path like `/library/metadata/42/thumb/7`.
    async fn artwork(&self, thumb: &str) -> Result<Vec<u8>, PlexError>;
}

pub struct PlexClient {
    base: String,
    token: String,
    http: reqwest::Client,
}

impl PlexClient {
    pub fn new(server_url: &str, token: &str) -> Result<Self, PlexError> {
        let url =
            reqwest::Url::parse(server_url).map_err(|e| PlexError::InvalidUrl(e.to_string()))?;
        if !url.has_host() {
            return Err(PlexError::InvalidUrl(server_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    async fn query(&self, path: &str) -> Result<MediaContainer, PlexError> {
        let envelope: Envelope = self
            .http
            .get(format!("{}{}", self.base, path))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.media_container)
    }

    fn artwork_url(&self, thumb: &str) -> String {
        let sep = if thumb.contains('?') { '&' } else { '?' };
        format!("{}{}{}X-Plex-Token={}", self.base, thumb, sep, self.token)
    }
}

#[async_trait]
impl PlexServer for PlexClient {
    async fn probe(&self) -> Result<(), PlexError> {
        self.query("/").await.map(|_| ())
    }

    async fn library_sections(&self) -> Result<Vec<Section>, PlexError> {
        Ok(self.query("/library/sections").await?.directory)
    }

    async fn section_size(&self, key: &str) -> Result<u64, PlexError> {
        let container = self.query(&format!("/library/sections/{key}/all")).await?;
        Ok(container.size.unwrap_or(0))
    }

    async fn recently_added(&self) -> Result<Vec<MediaItem>, PlexError> {
        Ok(self.query("/library/recentlyAdded").await?.metadata)
    }

    async fn sessions(&self) -> Result<MediaContainer, PlexError> {
        self.query("/status/sessions").await
    }

    async fn artwork(&self, thumb: &str) -> Result<Vec<u8>, PlexError> {
        let response = self.http.get(self.artwork_url(thumb)).send().await?;
        if !response.status().is_success() {
            return Err(PlexError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
