//! ChannelStore - current values of every channel and variable
//!
//! All writes clamp to the configured bounds and report whether the stored
//! value actually changed, so callers can skip emission on no-op writes.

use std::collections::HashMap;
use tracing::{debug, trace};

use super::types::{ChannelSpec, VariableSpec, CONTINUOUS_CHANGE_EPSILON};
use crate::config::AppConfig;

#[derive(Debug, Clone)]
struct ChannelEntry {
    spec: ChannelSpec,
    value: f64,
}

#[derive(Debug, Clone)]
struct VariableEntry {
    spec: VariableSpec,
    value: f64,
}

/// Channel and variable values with clamped, change-detecting setters
#[derive(Debug, Default)]
pub struct ChannelStore {
    channels: HashMap<String, ChannelEntry>,
    variables: HashMap<String, VariableEntry>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded from configuration defaults
    pub fn from_config(config: &AppConfig) -> Self {
        let mut store = Self::new();
        store.reinitialize(config);
        store
    }

    /// Re-seed from a new configuration.
    ///
    /// Surviving channels keep their value reclamped to the new range; new
    /// channels start at their default; removed channels are dropped.
    /// Variables follow the same rule, new ones starting at their configured
    /// current or initial value.
    pub fn reinitialize(&mut self, config: &AppConfig) {
        let mut channels = HashMap::with_capacity(config.internal_channels.len());
        for (name, channel_config) in &config.internal_channels {
            let spec = ChannelSpec::from_config(channel_config);
            let value = match self.channels.get(name) {
                Some(existing) => spec.clamp_and_snap(existing.value),
                None => spec.default,
            };
            channels.insert(name.clone(), ChannelEntry { spec, value });
        }

        let mut variables = HashMap::with_capacity(config.internal_variables.len());
        for (name, variable_config) in &config.internal_variables {
            let spec = VariableSpec::from_config(variable_config);
            let value = match self.variables.get(name) {
                Some(existing) => spec.clamp(existing.value),
                None => spec.clamp(variable_config.starting_value()),
            };
            variables.insert(name.clone(), VariableEntry { spec, value });
        }

        let dropped = self.channels.keys().filter(|n| !channels.contains_key(*n)).count();
        if dropped > 0 {
            debug!("Dropped {} channel(s) no longer in configuration", dropped);
        }

        self.channels = channels;
        self.variables = variables;
    }

    /// Write a channel value (discrete semantics: exact comparison).
    ///
    /// # Returns
    /// `true` if the stored value changed; unknown channels return `false`
    pub fn set_channel(&mut self, name: &str, value: f64) -> bool {
        self.write_channel(name, value, 0.0)
    }

    /// Write a channel value, ignoring differences below the continuous epsilon
    pub fn set_channel_continuous(&mut self, name: &str, value: f64) -> bool {
        self.write_channel(name, value, CONTINUOUS_CHANGE_EPSILON)
    }

    fn write_channel(&mut self, name: &str, value: f64, epsilon: f64) -> bool {
        let Some(entry) = self.channels.get_mut(name) else {
            trace!("Write to unknown channel '{}' ignored", name);
            return false;
        };
        let clamped = entry.spec.clamp_and_snap(value);
        let changed = if epsilon > 0.0 {
            (clamped - entry.value).abs() > epsilon
        } else {
            clamped != entry.value
        };
        if changed {
            entry.value = clamped;
        }
        changed
    }

    /// Write a variable value, clamped when both bounds exist
    ///
    /// # Returns
    /// `true` if the stored value changed; unknown variables return `false`
    pub fn set_variable(&mut self, name: &str, value: f64) -> bool {
        if !value.is_finite() {
            debug!("Non-finite value for variable '{}' ignored", name);
            return false;
        }
        let Some(entry) = self.variables.get_mut(name) else {
            trace!("Write to unknown variable '{}' ignored", name);
            return false;
        };
        let clamped = entry.spec.clamp(value);
        let changed = clamped != entry.value;
        if changed {
            entry.value = clamped;
        }
        changed
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelSpec> {
        self.channels.get(name).map(|e| &e.spec)
    }

    pub fn channel_value(&self, name: &str) -> Option<f64> {
        self.channels.get(name).map(|e| e.value)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.get(name).map(|e| &e.spec)
    }

    pub fn variable_value(&self, name: &str) -> Option<f64> {
        self.variables.get(name).map(|e| e.value)
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Snapshot of all channel values
    pub fn channel_values(&self) -> HashMap<String, f64> {
        self.channels.iter().map(|(n, e)| (n.clone(), e.value)).collect()
    }

    /// Snapshot of all variable values
    pub fn variable_values(&self) -> HashMap<String, f64> {
        self.variables.iter().map(|(n, e)| (n.clone(), e.value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, VariableConfig};
    use proptest::prelude::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.internal_channels.insert(
            "pan".to_string(),
            ChannelConfig {
                min_value: Some(0.0),
                max_value: Some(10.0),
                default: Some(5.0),
                osc_address: Some("/pan".to_string()),
                ..Default::default()
            },
        );
        config.internal_variables.insert(
            "bank".to_string(),
            VariableConfig {
                initial_value: Some(1.0),
                min_value: Some(1.0),
                max_value: Some(4.0),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_seeded_from_defaults() {
        let store = ChannelStore::from_config(&config());
        assert_eq!(store.channel_value("pan"), Some(5.0));
        assert_eq!(store.variable_value("bank"), Some(1.0));
        assert_eq!(store.channel_value("missing"), None);
    }

    #[test]
    fn test_idempotent_write() {
        let mut store = ChannelStore::from_config(&config());
        assert!(store.set_channel("pan", 3.0));
        assert!(!store.set_channel("pan", 3.0));
        assert!(!store.set_channel("nope", 3.0));
    }

    #[test]
    fn test_clamp_to_bounds() {
        let mut store = ChannelStore::from_config(&config());
        store.set_channel("pan", -1.0);
        assert_eq!(store.channel_value("pan"), Some(0.0));
        store.set_channel("pan", 11.0);
        assert_eq!(store.channel_value("pan"), Some(10.0));
    }

    #[test]
    fn test_continuous_epsilon() {
        let mut store = ChannelStore::from_config(&config());
        assert!(!store.set_channel_continuous("pan", 5.0 + 1e-8));
        assert!(store.set_channel_continuous("pan", 5.0 + 1e-6));
        // Exact comparison picks up tiny discrete writes
        assert!(store.set_channel("pan", 5.0));
    }

    #[test]
    fn test_variable_clamp() {
        let mut store = ChannelStore::from_config(&config());
        assert!(store.set_variable("bank", 9.0));
        assert_eq!(store.variable_value("bank"), Some(4.0));
        assert!(!store.set_variable("bank", 4.0));
        assert!(!store.set_variable("bank", f64::NAN));
    }

    #[test]
    fn test_reinitialize_preserves_and_reclamps() {
        let mut store = ChannelStore::from_config(&config());
        store.set_channel("pan", 8.0);
        store.set_variable("bank", 3.0);

        let mut next = config();
        if let Some(pan) = next.internal_channels.get_mut("pan") {
            pan.max_value = Some(6.0);
        }
        next.internal_channels.insert(
            "tilt".to_string(),
            ChannelConfig {
                min_value: Some(-1.0),
                max_value: Some(1.0),
                ..Default::default()
            },
        );
        store.reinitialize(&next);

        assert_eq!(store.channel_value("pan"), Some(6.0));
        assert_eq!(store.channel_value("tilt"), Some(-1.0));
        assert_eq!(store.variable_value("bank"), Some(3.0));

        store.reinitialize(&AppConfig::default());
        assert_eq!(store.channel_value("pan"), None);
        assert_eq!(store.variable_value("bank"), None);
    }

    proptest! {
        #[test]
        fn prop_channel_always_within_bounds(v in -1e6f64..1e6) {
            let mut store = ChannelStore::from_config(&config());
            store.set_channel("pan", v);
            let stored = store.channel_value("pan").unwrap_or(f64::NAN);
            prop_assert!((0.0..=10.0).contains(&stored));
        }
    }
}
