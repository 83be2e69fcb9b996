//! Active layer tracking

use thiserror::Error;
use tracing::warn;

use crate::config::AppConfig;

#[derive(Debug, Error, PartialEq)]
pub enum LayerSwitchError {
    #[error("empty layer id")]
    Empty,

    #[error("unknown layer '{0}'")]
    Unknown(String),
}

/// Exactly one active layer at a time
#[derive(Debug, Clone)]
pub struct LayerState {
    active: String,
}

impl LayerState {
    pub fn new(config: &AppConfig) -> Self {
        let active = config.active_layer.trim().to_string();
        if !config.layers.contains_key(&active) {
            warn!("Configured active layer '{}' does not exist", active);
        }
        Self { active }
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Validate and perform a switch.
    ///
    /// # Returns
    /// `Ok(true)` when the active layer changed, `Ok(false)` when the target
    /// is already active
    pub fn request_switch(&mut self, target: &str, config: &AppConfig) -> Result<bool, LayerSwitchError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(LayerSwitchError::Empty);
        }
        if target == self.active {
            return Ok(false);
        }
        if !config.layers.contains_key(target) {
            return Err(LayerSwitchError::Unknown(target.to_string()));
        }
        self.active = target.to_string();
        Ok(true)
    }

    /// Keep the current layer across a reload when it still exists
    ///
    /// # Returns
    /// `true` if the active layer had to change
    pub fn reconcile(&mut self, config: &AppConfig) -> bool {
        if config.layers.contains_key(&self.active) {
            return false;
        }
        let fallback = config.active_layer.trim().to_string();
        warn!(
            "Active layer '{}' vanished from configuration, falling back to '{}'",
            self.active, fallback
        );
        let changed = fallback != self.active;
        self.active = fallback;
        changed
    }
}
