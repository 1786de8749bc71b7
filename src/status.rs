//! Status aggregation: one [`StatusSnapshot`] per broadcast cycle.
//!
//! Every sub-step degrades on its own; a dead library query must not take
//! the session list down with it. Nothing here returns an error, the
//! snapshot is always produced.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::bridge::AdbBridge;
use crate::broadcast::BroadcastHub;
use crate::device::{self, DeviceStatus};
use crate::plex::{MediaItem, PlexError, PlexServer};

const DEFAULT_ACCENT: &str = "#333";

// ── Snapshot model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RecentlyAdded {
    pub title: String,
    #[serde(rename = "addedAt")]
    pub added_at: DateTime<Utc>,
    pub library: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkBandwidth {
    pub sent_mbps: String,
    pub recv_mbps: String,
}

impl Default for NetworkBandwidth {
    fn default() -> Self {
        Self {
            sent_mbps: "0".into(),
            recv_mbps: "0".into(),
        }
    }
}

/// Display-oriented summary of the first active session.
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub title: String,
    /// Present only for episodes, where `title` carries the show name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    /// Inlined `data:` URI so the device never fetches images itself.
    #[serde(rename = "artworkData")]
    pub artwork_data: String,
    #[serde(rename = "dominantColor")]
    pub dominant_color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub title: String,
    pub user: String,
    pub transcoding: bool,
    pub show: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActiveStreams {
    pub count: u64,
    #[serde(rename = "nowPlaying")]
    pub now_playing: Option<NowPlaying>,
    pub details: Vec<SessionDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeDetail {
    pub title: String,
    pub user: String,
    #[serde(rename = "videoDecision", skip_serializing_if = "Option::is_none")]
    pub video_decision: Option<String>,
    #[serde(rename = "audioDecision", skip_serializing_if = "Option::is_none")]
    pub audio_decision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcoding {
    pub count: u64,
    pub details: Vec<TranscodeDetail>,
}

/// The aggregate broadcast to the device every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    #[serde(rename = "deviceStatus")]
    pub device_status: DeviceStatus,
    #[serde(rename = "libraryStats")]
    pub library_stats: BTreeMap<String, u64>,
    #[serde(rename = "recentlyAdded")]
    pub recently_added: Option<RecentlyAdded>,
    #[serde(rename = "networkBandwidth")]
    pub network_bandwidth: NetworkBandwidth,
    #[serde(rename = "activeStreams")]
    pub active_streams: ActiveStreams,
    pub transcoding: Transcoding,
}

// ── Aggregation ──────────────────────────────────────────────────────────────

pub async fn collect_snapshot(
    upstream: Option<&dyn PlexServer>,
    bridge: &AdbBridge,
    hub: &BroadcastHub,
) -> StatusSnapshot {
    let connected = match upstream {
        Some(server) => server.probe().await.is_ok(),
        None => false,
    };

    let device_status = device::resolve(hub.client_count() > 0, bridge).await;
    let network_bandwidth = network_estimate(upstream).await;
    let library_stats = library_stats(upstream).await;
    let recently_added = most_recent_addition(upstream).await;
    let (mut active_streams, transcoding) = active_sessions(upstream).await;

    // A stale now-playing must never go out: no client handle or an empty
    // session list always clears it, whatever the session pass produced.
    if upstream.is_none() || active_streams.count == 0 {
        active_streams.now_playing = None;
    }

    StatusSnapshot {
        connected,
        device_status,
        library_stats,
        recently_added,
        network_bandwidth,
        active_streams,
        transcoding,
    }
}

/// Rough outbound estimate: the sum of per-session bitrates in mbps. The
/// receive side is not measured and stays "0".
async fn network_estimate(upstream: Option<&dyn PlexServer>) -> NetworkBandwidth {
    let Some(server) = upstream else {
        return NetworkBandwidth::default();
    };
    match server.sessions().await {
        Ok(container) => {
            let total_kbps: u64 = container
                .metadata
                .iter()
                .filter_map(|s| s.media.first().and_then(|m| m.bitrate))
                .sum();
            NetworkBandwidth {
                sent_mbps: format!("{:.1}", total_kbps as f64 / 1000.0),
                recv_mbps: "0".into(),
            }
        }
        Err(e) => {
            warn!("network estimate failed: {e}");
            NetworkBandwidth::default()
        }
    }
}

async fn library_stats(upstream: Option<&dyn PlexServer>) -> BTreeMap<String, u64> {
    let Some(server) = upstream else {
        return BTreeMap::new();
    };
    match try_library_stats(server).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("library stats failed: {e}");
            BTreeMap::new()
        }
    }
}

async fn try_library_stats(server: &dyn PlexServer) -> Result<BTreeMap<String, u64>, PlexError> {
    let mut stats = BTreeMap::new();
    for section in server.library_sections().await? {
        let count = server.section_size(&section.key).await?;
        stats.insert(section.title, count);
    }
    Ok(stats)
}

async fn most_recent_addition(upstream: Option<&dyn PlexServer>) -> Option<RecentlyAdded> {
    let server = upstream?;
    let items = match server.recently_added().await {
        Ok(items) => items,
        Err(e) => {
            warn!("recently added failed: {e}");
            return None;
        }
    };
    let item = items.into_iter().next()?;
    let added_at = item
        .added_at
        .and_then(|secs| DateTime::from_timestamp(secs, 0))?;
    Some(RecentlyAdded {
        // A series title reads better on the display than an episode title.
        title: item.grandparent_title.unwrap_or(item.title),
        added_at,
        library: item
            .library_section_title
            .unwrap_or_else(|| "Unknown".into()),
    })
}

async fn active_sessions(upstream: Option<&dyn PlexServer>) -> (ActiveStreams, Transcoding) {
    let Some(server) = upstream else {
        return (ActiveStreams::default(), Transcoding::default());
    };
    let container = match server.sessions().await {
        Ok(container) => container,
        Err(e) => {
            warn!("session info failed: {e}");
            return (ActiveStreams::default(), Transcoding::default());
        }
    };

    let mut streams = ActiveStreams {
        count: container.size.unwrap_or(0),
        ..ActiveStreams::default()
    };
    let mut transcoding = Transcoding::default();

    for session in &container.metadata {
        let user = session
            .user
            .as_ref()
            .map(|u| u.title.clone())
            .unwrap_or_else(|| "Unknown".into());

        streams.details.push(SessionDetail {
            title: session.title.clone(),
            user: user.clone(),
            transcoding: session.transcode_session.is_some(),
            show: session.grandparent_title.clone().unwrap_or_default(),
        });

        if streams.now_playing.is_none() {
            streams.now_playing = Some(now_playing_summary(server, session).await);
        }

        if let Some(transcode) = &session.transcode_session {
            transcoding.details.push(TranscodeDetail {
                title: session.title.clone(),
                user,
                video_decision: transcode.video_decision.clone(),
                audio_decision: transcode.audio_decision.clone(),
            });
        }
    }

    transcoding.count = transcoding.details.len() as u64;
    (streams, transcoding)
}

/// The first session of a cycle gets promoted to a richer summary with the
/// artwork inlined. A failed image fetch degrades to no artwork rather than
/// losing the whole session pass.
async fn now_playing_summary(server: &dyn PlexServer, session: &MediaItem) -> NowPlaying {
    let thumb = session
        .grandparent_thumb
        .as_deref()
        .or(session.thumb.as_deref());
    let artwork_data = match thumb {
        Some(path) => match server.artwork(path).await {
            Ok(bytes) => format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)),
            Err(e) => {
                warn!("artwork fetch failed: {e}");
                String::new()
            }
        },
        None => String::new(),
    };

    match &session.grandparent_title {
        Some(show) => NowPlaying {
            title: show.clone(),
            episode: Some(session.title.clone()),
            artwork_data,
            dominant_color: DEFAULT_ACCENT.into(),
        },
        None => NowPlaying {
            title: session.title.clone(),
            episode: None,
            artwork_data,
            dominant_color: DEFAULT_ACCENT.into(),
        },
    }
}
