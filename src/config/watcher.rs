//! Hot reload of the configuration file
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by replacing the file keep triggering reloads. Bursts of events
//! collapse into a single re-read.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period after the last change before the file is re-read
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Delivers a fresh [`AppConfig`] each time the file changes and parses
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Arc<AppConfig>>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    ///
    /// # Returns
    /// The watcher plus the initially loaded configuration
    pub async fn new(config_path: impl Into<PathBuf>) -> Result<(Self, Arc<AppConfig>)> {
        let path: PathBuf = config_path.into();
        let initial = Arc::new(
            AppConfig::load(&path)
                .await
                .context("Failed to load initial config")?,
        );

        let file_name = path
            .file_name()
            .map(OsString::from)
            .with_context(|| format!("Config path has no file name: {}", path.display()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (changes_tx, changes_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches_file(&event, &file_name) => {
                let _ = changes_tx.send(());
            }
            Ok(_) => {}
            Err(e) => error!("Config watch error: {}", e),
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(reload_loop(path.clone(), changes_rx, tx));

        info!("👀 Watching {} for changes", path.display());
        Ok((Self { _watcher: watcher, rx }, initial))
    }

    /// Wait for the next successfully parsed configuration
    ///
    /// Returns None once the watcher has shut down.
    pub async fn next_config(&mut self) -> Option<Arc<AppConfig>> {
        self.rx.recv().await
    }
}

fn touches_file(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    path: PathBuf,
    mut changes: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<Arc<AppConfig>>,
) {
    while changes.recv().await.is_some() {
        // Wait until writes settle, then fold everything queued meanwhile
        loop {
            tokio::time::sleep(RELOAD_DEBOUNCE).await;
            let mut more = false;
            while changes.try_recv().is_ok() {
                more = true;
            }
            if !more {
                break;
            }
        }

        if is_empty_file(&path).await {
            debug!("{} is empty, waiting for the write to finish", path.display());
            continue;
        }

        match AppConfig::load(&path).await {
            Ok(config) => {
                info!("Configuration reloaded from {}", path.display());
                if tx.send(Arc::new(config)).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring invalid config (keeping current): {:#}", e),
        }
    }
    debug!("Config reload loop exited");
}

async fn is_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() == 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(2);

    fn config_with_port(port: u16) -> String {
        format!("osc_settings:\n  port: {port}\ninternal_channels:\n  pan: {{ min_value: 0, max_value: 1 }}\n")
    }

    #[tokio::test]
    async fn test_broken_edit_is_skipped_until_fixed() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mapping.yaml");
        fs::write(&path, config_with_port(9100))?;

        let (mut watcher, config) = ConfigWatcher::new(&path).await?;
        assert_eq!(config.osc_settings.port, 9100);

        fs::write(&path, "osc_settings: [unclosed\n")?;
        let delivered =
            tokio::time::timeout(Duration::from_millis(500), watcher.next_config()).await;
        assert!(delivered.is_err(), "invalid YAML must not produce a config");

        fs::write(&path, config_with_port(9300))?;
        let next = tokio::time::timeout(WAIT, watcher.next_config())
            .await?
            .expect("watcher closed");
        assert_eq!(next.osc_settings.port, 9300);
        assert!(next.internal_channels.contains_key("pan"));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_files_in_directory_are_ignored() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mapping.yaml");
        fs::write(&path, config_with_port(9100))?;

        let (mut watcher, _) = ConfigWatcher::new(&path).await?;
        fs::write(dir.path().join("notes.yaml"), config_with_port(9999))?;

        let delivered =
            tokio::time::timeout(Duration::from_millis(500), watcher.next_config()).await;
        assert!(delivered.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_start() {
        let dir = TempDir::new().unwrap();
        let result = ConfigWatcher::new(dir.path().join("absent.yaml")).await;
        assert!(result.is_err());
    }
}
