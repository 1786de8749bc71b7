//! DeckView: bridges a Plex server's live status to a Spotify Car Thing
//! display over adb, and pushes the device webapp build.
//!
//! The crate is the whole application minus the window shell: the shell
//! calls into [`commands`] and renders whatever comes back, while
//! [`run`] drives the background service: a WebSocket listener for the
//! device plus a 5-second aggregate-and-broadcast cycle.

pub mod bridge;
pub mod broadcast;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod device;
pub mod plex;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bridge::AdbBridge;
use broadcast::BroadcastHub;
use config::ConnectionConfig;
use plex::PlexServer;

/// Cycle period for status aggregation and fan-out.
pub const BROADCAST_PERIOD: Duration = Duration::from_secs(5);

/// Everything the operations surface and the broadcast cycle share.
pub struct AppState {
    pub config: Mutex<ConnectionConfig>,
    pub config_path: PathBuf,
    /// Replaced wholesale on reconnect, never mutated in place. A cycle
    /// clones the handle once at cycle start and keeps it even if a
    /// reconnect lands mid-cycle.
    pub upstream: RwLock<Option<Arc<dyn PlexServer>>>,
    pub bridge: AdbBridge,
    pub hub: BroadcastHub,
}

impl AppState {
    pub fn new() -> Self {
        let (config, config_path) = config::load_config();
        Self {
            config: Mutex::new(config),
            config_path,
            upstream: RwLock::new(None),
            bridge: AdbBridge::new(),
            hub: BroadcastHub::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the broadcast service: the device listener plus the repeating
/// self-heal → aggregate → fan-out cycle. A single worker pulls from one
/// interval, so two cycles are never in flight at once; a cycle that runs
/// long delays the next tick instead of racing it. Never returns.
pub async fn run(state: Arc<AppState>) {
    tokio::spawn(broadcast::serve(state.hub.clone()));

    let mut ticker = tokio::time::interval(BROADCAST_PERIOD);
    loop {
        ticker.tick().await;

        state.bridge.ensure_tunnel().await;

        let upstream = state.upstream.read().unwrap().clone();
        let snapshot =
            status::collect_snapshot(upstream.as_deref(), &state.bridge, &state.hub).await;
        state.hub.broadcast(&snapshot);
    }
}
