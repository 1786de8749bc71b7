//! Operations exposed to the presentation layer.
//!
//! The shell stays thin: every operation here is a plain async call on
//! shared state, and every fallible one reports `Result<T, String>` so the
//! UI can show the text as-is.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{self, ConnectionConfig};
use crate::plex::{PlexClient, PlexServer};
use crate::status::{self, StatusSnapshot};
use crate::{deploy, AppState};

/// Current connection settings.
pub fn get_config(state: &AppState) -> ConnectionConfig {
    state.config.lock().unwrap().clone()
}

/// Persist new settings and (re)connect.
///
/// The settings are saved even when the connection attempt fails. On any
/// failure no client is retained: dependent operations see "disconnected",
/// never a half-built handle.
pub async fn connect_server(state: &AppState, new_config: ConnectionConfig) -> Result<(), String> {
    if let Err(e) = config::write_config(&state.config_path, &new_config) {
        error!("error saving config: {e}");
    }
    *state.config.lock().unwrap() = new_config.clone();

    let client = match PlexClient::new(&new_config.server_url, &new_config.access_token) {
        Ok(client) => client,
        Err(e) => {
            *state.upstream.write().unwrap() = None;
            return Err(e.to_string());
        }
    };

    match client.probe().await {
        Ok(()) => {
            let handle: Arc<dyn PlexServer> = Arc::new(client);
            *state.upstream.write().unwrap() = Some(handle);
            info!("connected to {}", new_config.server_url);
            Ok(())
        }
        Err(e) => {
            *state.upstream.write().unwrap() = None;
            error!("plex connect error: {e}");
            Err(e.to_string())
        }
    }
}

/// On-demand status, same aggregation as the broadcast cycle.
pub async fn server_status(state: &AppState) -> StatusSnapshot {
    let upstream = state.upstream.read().unwrap().clone();
    status::collect_snapshot(upstream.as_deref(), &state.bridge, &state.hub).await
}

/// Manual tunnel apply. Unlike the background self-heal this reports back.
pub async fn apply_tunnel(state: &AppState) -> Result<String, String> {
    state.bridge.apply_tunnel().await.map_err(|e| e.to_string())
}

/// Push the webapp bundle to the device and reboot it. The error text is
/// phase-tagged so the caller can tell a failed mount from a failed reboot.
pub async fn push_build(state: &AppState, override_path: Option<&Path>) -> Result<String, String> {
    deploy::run(&state.bridge, override_path)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn connect_with_invalid_url_retains_no_client() {
        let state = test_state();
        let result = connect_server(
            &state,
            ConnectionConfig {
                server_url: "not a url".into(),
                access_token: "tok".into(),
            },
        )
        .await;

        assert!(result.is_err());
        assert!(state.upstream.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_connect_still_persists_the_config() {
        let state = test_state();
        let attempted = ConnectionConfig {
            server_url: "not a url".into(),
            access_token: "tok".into(),
        };
        let _ = connect_server(&state, attempted.clone()).await;

        assert_eq!(get_config(&state), attempted);
        assert_eq!(config::read_config(&state.config_path), Some(attempted));
        std::fs::remove_file(&state.config_path).ok();
    }

    #[tokio::test]
    async fn status_without_client_reports_disconnected() {
        let state = test_state();
        let snapshot = server_status(&state).await;
        assert!(!snapshot.connected);
        assert_eq!(snapshot.active_streams.count, 0);
    }

    #[tokio::test]
    async fn push_build_surfaces_phase_tagged_error() {
        let state = test_state();
        let missing = std::env::temp_dir().join("deckview-commands-no-bundle");
        let err = push_build(&state, Some(&missing)).await.unwrap_err();
        assert!(err.contains("bundle not found"));
    }
}
