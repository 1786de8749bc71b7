//! Locates the webapp build on disk and drives the bridge push sequence.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::bridge::{AdbBridge, BridgeError};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("build bundle not found (looked in {0})")]
    BundleNotFound(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Where the webapp build may live, in preference order: an explicit
/// override (development), then the packaged resource layouts next to the
/// executable.
fn bundle_candidates(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = override_path {
        candidates.push(path.to_path_buf());
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    candidates.push(
        exe_dir
            .join("resources")
            .join("app")
            .join("webapp")
            .join("build"),
    );
    candidates.push(exe_dir.join("resources").join("webapp").join("build"));

    candidates
}

/// First existing candidate wins; none existing is an error on its own,
/// reported before the bridge is ever involved.
pub fn locate_bundle(override_path: Option<&Path>) -> Result<PathBuf, DeployError> {
    let candidates = bundle_candidates(override_path);
    if let Some(found) = candidates.iter().find(|p| p.is_dir()) {
        return Ok(found.clone());
    }
    let searched = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(DeployError::BundleNotFound(searched))
}

/// Locate the bundle, then run the device push sequence.
pub async fn run(bridge: &AdbBridge, override_path: Option<&Path>) -> Result<String, DeployError> {
    let bundle = locate_bundle(override_path)?;
    info!("pushing webapp build from {}", bundle.display());
    Ok(bridge.deploy(&bundle).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok_output, scripted_bridge};

    fn temp_bundle_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deckview-bundle-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_bundle_fails_before_any_bridge_command() {
        let (bridge, calls) = scripted_bridge(|_| Ok(ok_output("")));
        let missing = std::env::temp_dir().join("deckview-no-such-bundle");

        let result = run(&bridge, Some(&missing)).await;

        assert!(matches!(result, Err(DeployError::BundleNotFound(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn override_bundle_is_used_when_present() {
        let dir = temp_bundle_dir("override");
        let (bridge, calls) = scripted_bridge(|_| Ok(ok_output("4 files pushed")));

        let result = run(&bridge, Some(&dir)).await;

        assert_eq!(result.unwrap(), "4 files pushed");
        assert_eq!(calls.lock().unwrap().len(), 4);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn override_path_is_first_candidate() {
        let candidates = bundle_candidates(Some(Path::new("/tmp/dev-build")));
        assert_eq!(candidates[0], PathBuf::from("/tmp/dev-build"));
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn bundle_error_names_searched_paths() {
        let missing = std::env::temp_dir().join("deckview-nowhere");
        match locate_bundle(Some(&missing)) {
            Err(DeployError::BundleNotFound(searched)) => {
                assert!(searched.contains("deckview-nowhere"));
            }
            other => panic!("expected BundleNotFound, got {other:?}"),
        }
    }
}
