use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings for the upstream Plex server.
///
/// The on-disk key names predate this implementation; existing
/// `config.json` files keep working unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    #[serde(rename = "plex_server_url")]
    pub server_url: String,
    #[serde(rename = "plex_token")]
    pub access_token: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://<PLEX_SERVER_IP>:32400".into(),
            access_token: "<YOUR_PLEX_TOKEN>".into(),
        }
    }
}

impl ConnectionConfig {
    /// True until the user has replaced the fresh-install placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.server_url.contains('<') || self.access_token.contains('<')
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("DeckView")
}

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Loads the persisted config, falling back to defaults on a missing or
/// unreadable file. Also returns the path writes should go to.
pub fn load_config() -> (ConnectionConfig, PathBuf) {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).ok();
    let path = dir.join("config.json");
    let config = read_config(&path).unwrap_or_default();
    (config, path)
}

pub fn read_config(path: &Path) -> Option<ConnectionConfig> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
}

pub fn write_config(path: &Path, config: &ConnectionConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("deckview-{}-{}.json", tag, std::process::id()))
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_config_path("roundtrip");
        let config = ConnectionConfig {
            server_url: "http://10.0.0.5:32400".into(),
            access_token: "abc123".into(),
        };
        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path), Some(config));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_reads_as_none() {
        let path = temp_config_path("missing");
        assert_eq!(read_config(&path), None);
    }

    #[test]
    fn corrupt_file_reads_as_none() {
        let path = temp_config_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_config(&path), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn disk_format_keeps_original_key_names() {
        let json = serde_json::to_string(&ConnectionConfig::default()).unwrap();
        assert!(json.contains("plex_server_url"));
        assert!(json.contains("plex_token"));
    }

    #[test]
    fn defaults_are_placeholders() {
        assert!(ConnectionConfig::default().is_placeholder());
        let real = ConnectionConfig {
            server_url: "http://10.0.0.5:32400".into(),
            access_token: "abc123".into(),
        };
        assert!(!real.is_placeholder());
    }
}
