//! Shared test fakes: a scripted stand-in for the adb executable and a
//! canned Plex server.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::bridge::{AdbBridge, CommandOutput, CommandRunner};
use crate::broadcast::BroadcastHub;
use crate::config::ConnectionConfig;
use crate::plex::{MediaContainer, MediaItem, PlexError, PlexServer, Section};
use crate::AppState;

type Script = Box<dyn Fn(&str) -> io::Result<CommandOutput> + Send + Sync>;

/// Records every invocation and answers from a caller-supplied script.
/// The script sees the argument list joined with spaces.
pub(crate) struct FakeRunner {
    calls: Arc<Mutex<Vec<String>>>,
    script: Script,
}

impl FakeRunner {
    pub fn new(script: impl Fn(&str) -> io::Result<CommandOutput> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Box::new(script),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        _program: &Path,
        args: &[&str],
        _cwd: Option<&Path>,
    ) -> io::Result<CommandOutput> {
        let invocation = args.join(" ");
        self.calls.lock().unwrap().push(invocation.clone());
        (self.script)(&invocation)
    }
}

pub(crate) fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub(crate) fn failed_output(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Bridge wired to a scripted runner, with the call log alongside.
pub(crate) fn scripted_bridge(
    script: impl Fn(&str) -> io::Result<CommandOutput> + Send + Sync + 'static,
) -> (AdbBridge, Arc<Mutex<Vec<String>>>) {
    let runner = FakeRunner::new(script);
    let calls = runner.calls();
    (
        AdbBridge::for_tests(PathBuf::from("adb"), true, Box::new(runner)),
        calls,
    )
}

/// Bridge whose tunnel probe always reports inactive.
pub(crate) fn offline_bridge() -> AdbBridge {
    let (bridge, _) = scripted_bridge(|_| Ok(failed_output("no devices")));
    bridge
}

/// Canned Plex server. `sessions`/`artwork` set to `None` script a failing
/// query; everything else answers from the stored values.
#[derive(Default)]
pub(crate) struct FakePlex {
    pub reachable: bool,
    pub sections: Vec<Section>,
    pub section_sizes: HashMap<String, u64>,
    pub fail_section_sizes: bool,
    pub recent: Vec<MediaItem>,
    pub sessions: Option<MediaContainer>,
    pub artwork: Option<Vec<u8>>,
}

fn unavailable() -> PlexError {
    PlexError::Status(503)
}

#[async_trait]
impl PlexServer for FakePlex {
    async fn probe(&self) -> Result<(), PlexError> {
        if self.reachable {
            Ok(())
        } else {
            Err(unavailable())
        }
    }

    async fn library_sections(&self) -> Result<Vec<Section>, PlexError> {
        Ok(self.sections.clone())
    }

    async fn section_size(&self, key: &str) -> Result<u64, PlexError> {
        if self.fail_section_sizes {
            return Err(unavailable());
        }
        Ok(self.section_sizes.get(key).copied().unwrap_or(0))
    }

    async fn recently_added(&self) -> Result<Vec<MediaItem>, PlexError> {
        Ok(self.recent.clone())
    }

    async fn sessions(&self) -> Result<MediaContainer, PlexError> {
        self.sessions.clone().ok_or_else(unavailable)
    }

    async fn artwork(&self, _thumb: &str) -> Result<Vec<u8>, PlexError> {
        self.artwork.clone().ok_or_else(unavailable)
    }
}

static STATE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// App state with a throwaway config path and an offline bridge.
pub(crate) fn test_state() -> AppState {
    let n = STATE_COUNTER.fetch_add(1, Ordering::SeqCst);
    AppState {
        config: Mutex::new(ConnectionConfig::default()),
        config_path: std::env::temp_dir().join(format!(
            "deckview-test-config-{}-{}.json",
            std::process::id(),
            n
        )),
        upstream: RwLock::new(None),
        bridge: offline_bridge(),
        hub: BroadcastHub::new(),
    }
}
