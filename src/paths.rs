//! Application path resolution for portable and installed modes.
//!
//! - **Portable mode**: a `.portable` marker next to the executable keeps
//!   config and logs in the executable's directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   under `Gamepad OSC`.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used in installed mode
const APP_NAME: &str = "Gamepad OSC";

/// Default configuration file name
pub const CONFIG_FILE: &str = "config.yaml";

/// Application paths for config and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect paths from the environment.
    ///
    /// A `config.yaml` in the working directory wins, then the portable
    /// marker, then the platform data directory. Called before logging is
    /// initialized.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let data_dir = dirs::data_dir();

        Self::resolve(&cwd, &exe_dir, data_dir.as_deref())
    }

    fn resolve(cwd: &Path, exe_dir: &Path, data_dir: Option<&Path>) -> Self {
        if cwd.join(CONFIG_FILE).exists() {
            return Self::portable(cwd);
        }
        if exe_dir.join(".portable").exists() {
            return Self::portable(exe_dir);
        }

        let base = data_dir.unwrap_or(exe_dir).join(APP_NAME);
        Self {
            config: base.join(CONFIG_FILE),
            logs_dir: base.join("logs"),
            is_portable: false,
        }
    }

    fn portable(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Create the logs directory (and config directory in installed mode)
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)?;
        }
        if !self.is_portable {
            if let Some(parent) = self.config.parent() {
                if !parent.exists() {
                    debug!("Creating config directory: {}", parent.display());
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }
}
