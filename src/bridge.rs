//! Transport bridge controller: everything that shells out to `adb`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reverse mapping that lets the device reach the broadcast server over USB.
pub const REVERSE_SPEC: &str = "tcp:8891";

/// Webapp directory on the device filesystem.
const DEVICE_WEBAPP_DIR: &str = "/usr/share/qt-superbird-app/webapp/";

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("adb binary not found at {0}")]
    BinaryNotFound(PathBuf),
    #[error("mount error: {0}")]
    Mount(String),
    #[error("push error: {0}")]
    Push(String),
    #[error("reboot error: {0}")]
    Reboot(String),
    #[error("adb error: {0}")]
    Command(String),
}

/// Outcome of one bridge-executable invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn error_text(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Seam between the controller and the OS so tests can script adb.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> std::io::Result<CommandOutput>;
}

/// Spawns the real executable via tokio.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> std::io::Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().await?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub struct AdbBridge {
    adb_path: PathBuf,
    /// Resolved once at construction; the reverse listing is unreliable on
    /// macOS, so the tunnel check never spawns adb there.
    tunnel_supported: bool,
    runner: Box<dyn CommandRunner>,
}

impl AdbBridge {
    pub fn new() -> Self {
        let adb_path = locate_adb();
        info!("using adb at: {}", adb_path.display());
        Self {
            adb_path,
            tunnel_supported: cfg!(not(target_os = "macos")),
            runner: Box::new(SystemRunner),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        adb_path: PathBuf,
        tunnel_supported: bool,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            adb_path,
            tunnel_supported,
            runner,
        }
    }

    async fn exec(&self, args: &[&str], cwd: Option<&Path>) -> Result<String, String> {
        match self.runner.run(&self.adb_path, args, cwd).await {
            Ok(out) if out.success => Ok(out.stdout.trim().to_string()),
            Ok(out) => Err(out.error_text()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Whether the reverse mapping for the broadcast port is currently live.
    /// Always answers; any failure to ask counts as "not active".
    pub async fn is_tunnel_active(&self) -> bool {
        if !self.tunnel_supported {
            return false;
        }
        match self.exec(&["reverse", "--list"], None).await {
            Ok(listing) => listing.contains(REVERSE_SPEC),
            Err(_) => false,
        }
    }

    /// Background self-heal: re-apply the reverse mapping if it has dropped.
    /// Failures are logged, never surfaced.
    pub async fn ensure_tunnel(&self) {
        if self.is_tunnel_active().await {
            debug!("adb reverse already active");
            return;
        }
        match self.exec(&["reverse", REVERSE_SPEC, REVERSE_SPEC], None).await {
            Ok(out) => info!("adb reverse applied: {out}"),
            Err(e) => warn!("failed to apply adb reverse: {e}"),
        }
    }

    /// User-invoked apply. Unlike [`ensure_tunnel`](Self::ensure_tunnel)
    /// this reports the outcome, and a missing bundled binary fails before
    /// anything is spawned.
    pub async fn apply_tunnel(&self) -> Result<String, BridgeError> {
        if self.adb_path.is_absolute() && !self.adb_path.exists() {
            return Err(BridgeError::BinaryNotFound(self.adb_path.clone()));
        }
        self.exec(&["reverse", REVERSE_SPEC, REVERSE_SPEC], None)
            .await
            .map_err(BridgeError::Command)
    }

    /// Pushes a webapp bundle to the device.
    ///
    /// The device root must be remounted read-write first; a failed remount
    /// aborts everything. Clearing the old webapp directory is best-effort,
    /// it may simply not exist yet. A failed push stops before the reboot,
    /// and a failed reboot is reported on its own so the caller knows the
    /// content may already have landed.
    pub async fn deploy(&self, bundle_root: &Path) -> Result<String, BridgeError> {
        self.exec(&["shell", "mount", "-o", "remount,rw", "/"], None)
            .await
            .map_err(BridgeError::Mount)?;

        let wipe_target = format!("{DEVICE_WEBAPP_DIR}*");
        if let Err(e) = self
            .exec(&["shell", "rm", "-rf", &wipe_target], None)
            .await
        {
            warn!("failed to clear old webapp directory (continuing): {e}");
        }

        let pushed = self
            .exec(&["push", ".", DEVICE_WEBAPP_DIR], Some(bundle_root))
            .await
            .map_err(BridgeError::Push)?;

        self.exec(&["reboot"], None)
            .await
            .map_err(BridgeError::Reboot)?;

        Ok(pushed)
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the bundled adb binary the same way the app ships it: dev tree
/// first, then the sidecar next to the executable, then whatever PATH has.
fn locate_adb() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let binary = if cfg!(windows) { "adb.exe" } else { "adb" };

    let dev_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("binaries")
        .join(binary);
    let sidecar = exe_dir.join(binary);

    let path = if dev_path.exists() {
        dev_path
    } else if sidecar.exists() {
        sidecar
    } else {
        PathBuf::from(binary)
    };

    if path.exists() {
        ensure_executable(&path);
    }

    path
}

#[cfg(unix)]
fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
        warn!("could not mark {} executable: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) {}
