//! Configuration management for the gamepad OSC gateway
//!
//! Handles loading, sanitizing, and hot-reloading of YAML configuration files.
//! JSON files load too, since YAML is a superset.

pub mod lenient;
pub mod mapping;
pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::osc::OscArgType;

pub use mapping::{LayerConfig, LayerOscConfig, LayerValueType, MappingConfig, MappingParams, TargetName};
pub use watcher::ConfigWatcher;

/// Highest accepted OSC send rate per channel
pub const MAX_UPDATES_PER_SECOND_CAP: f64 = 240.0;

/// Accepted range for the scheduler tick rate
pub const TICK_RATE_RANGE_HZ: (f64, f64) = (1.0, 1000.0);

/// Upper bound for the activity and suppression windows
pub const MAX_WINDOW: Duration = Duration::from_secs(5);

/// Longest spacing between two sends of one channel
const MAX_EMIT_INTERVAL: Duration = Duration::from_secs(60);

/// Numeric setting that falls back to its default when the file holds junk
macro_rules! lenient_f64_or {
    ($name:ident, $default:ident) => {
        fn $name<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
            Ok(lenient::opt_f64(deserializer)?.unwrap_or_else($default))
        }
    };
}

lenient_f64_or!(lenient_stick_deadzone, default_stick_deadzone);
lenient_f64_or!(lenient_trigger_deadzone, default_trigger_deadzone);
lenient_f64_or!(lenient_polling_rate, default_polling_rate);
lenient_f64_or!(lenient_press_threshold, default_press_threshold);
lenient_f64_or!(lenient_rate_hz, default_rate_hz);
lenient_f64_or!(lenient_activity_window, default_activity_window);
lenient_f64_or!(lenient_variable_suppression, default_variable_suppression);

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub osc_settings: OscSettings,
    #[serde(default)]
    pub input_settings: InputSettings,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub internal_channels: HashMap<String, ChannelConfig>,
    #[serde(default)]
    pub internal_variables: HashMap<String, VariableConfig>,
    #[serde(default = "mapping::default_layers")]
    pub layers: HashMap<String, LayerConfig>,
    #[serde(default = "default_active_layer")]
    pub active_layer: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            osc_settings: OscSettings::default(),
            input_settings: InputSettings::default(),
            processing: ProcessingConfig::default(),
            internal_channels: HashMap::new(),
            internal_variables: HashMap::new(),
            layers: mapping::default_layers(),
            active_layer: default_active_layer(),
        }
    }
}

/// OSC output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OscSettings {
    #[serde(default = "default_osc_ip")]
    pub ip: String,
    #[serde(default = "default_osc_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub max_updates_per_second: Option<f64>,
    #[serde(default)]
    pub use_bundles: bool,
    /// Defaults to on when `ip` is a .255 broadcast address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_broadcast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_bind_ip: Option<String>,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            ip: default_osc_ip(),
            port: default_osc_port(),
            max_updates_per_second: None,
            use_bundles: false,
            allow_broadcast: None,
            local_bind_ip: None,
        }
    }
}

impl OscSettings {
    /// Effective per-channel send rate.
    ///
    /// Non-positive or missing values fall back to 60Hz, anything above
    /// [`MAX_UPDATES_PER_SECOND_CAP`] is capped.
    pub fn updates_per_second(&self) -> f64 {
        match self.max_updates_per_second {
            Some(hz) if hz > MAX_UPDATES_PER_SECOND_CAP => MAX_UPDATES_PER_SECOND_CAP,
            Some(hz) if hz > 0.0 => hz,
            _ => 60.0,
        }
    }

    /// Minimum spacing between two sends of the same channel
    pub fn emit_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.updates_per_second())
            .map_or(MAX_EMIT_INTERVAL, |interval| interval.min(MAX_EMIT_INTERVAL))
    }

    pub fn broadcast_enabled(&self) -> bool {
        self.allow_broadcast
            .unwrap_or_else(|| self.ip.trim().ends_with(".255"))
    }

    /// Local interface to bind, ignoring blanks and the wildcard address
    pub fn bind_ip(&self) -> Option<&str> {
        self.local_bind_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty() && *ip != "0.0.0.0")
    }

    /// True when a change requires a new socket
    pub fn transport_differs(&self, other: &OscSettings) -> bool {
        self.ip != other.ip
            || self.port != other.port
            || self.use_bundles != other.use_bundles
            || self.broadcast_enabled() != other.broadcast_enabled()
            || self.bind_ip() != other.bind_ip()
    }
}

/// Input shaping settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputSettings {
    #[serde(default = "default_stick_deadzone", deserialize_with = "lenient_stick_deadzone")]
    pub stick_deadzone: f64,
    #[serde(default = "default_trigger_deadzone", deserialize_with = "lenient_trigger_deadzone")]
    pub trigger_deadzone: f64,
    #[serde(default)]
    pub stick_curve: CurveSetting,
    #[serde(default = "default_polling_rate", deserialize_with = "lenient_polling_rate")]
    pub polling_rate_hz: f64,
    #[serde(default = "default_press_threshold", deserialize_with = "lenient_press_threshold")]
    pub button_press_threshold: f64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            stick_deadzone: default_stick_deadzone(),
            trigger_deadzone: default_trigger_deadzone(),
            stick_curve: CurveSetting::default(),
            polling_rate_hz: default_polling_rate(),
            button_press_threshold: default_press_threshold(),
        }
    }
}

/// Stick response curve: a number or a named preset
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CurveSetting {
    Exponent(f64),
    Named(String),
}

impl Default for CurveSetting {
    fn default() -> Self {
        CurveSetting::Exponent(1.0)
    }
}

impl CurveSetting {
    /// Exponent applied to stick magnitude (1.0 = linear)
    pub fn exponent(&self) -> f64 {
        match self {
            CurveSetting::Exponent(e) if e.is_finite() && *e > 0.0 => *e,
            CurveSetting::Named(name) if name.eq_ignore_ascii_case("linear") => 1.0,
            CurveSetting::Named(name) => match name.trim().parse::<f64>() {
                Ok(e) if e.is_finite() && e > 0.0 => e,
                _ => {
                    warn!("Unknown stick_curve '{}', using linear", name);
                    1.0
                }
            },
            CurveSetting::Exponent(e) => {
                warn!("Invalid stick_curve {}, using linear", e);
                1.0
            }
        }
    }
}

/// Scheduler loop timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_rate_hz", deserialize_with = "lenient_rate_hz")]
    pub rate_hz: f64,
    /// How long a channel keeps re-emitting after its last change
    #[serde(default = "default_activity_window", deserialize_with = "lenient_activity_window")]
    pub activity_window_s: f64,
    /// How long variable-templated channel addresses are held back after a variable change
    #[serde(default = "default_variable_suppression", deserialize_with = "lenient_variable_suppression")]
    pub variable_suppression_s: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            activity_window_s: default_activity_window(),
            variable_suppression_s: default_variable_suppression(),
        }
    }
}

impl ProcessingConfig {
    /// Effective tick rate: non-positive values fall back to the default,
    /// the rest is clamped to [`TICK_RATE_RANGE_HZ`]
    pub fn tick_rate_hz(&self) -> f64 {
        let (lo, hi) = TICK_RATE_RANGE_HZ;
        if self.rate_hz.is_finite() && self.rate_hz > 0.0 {
            self.rate_hz.clamp(lo, hi)
        } else {
            default_rate_hz()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz())
    }

    pub fn activity_window(&self) -> Duration {
        bounded_window(self.activity_window_s)
    }

    pub fn variable_suppression(&self) -> Duration {
        bounded_window(self.variable_suppression_s)
    }
}

/// Seconds to a window in `[0, MAX_WINDOW]`
fn bounded_window(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).map_or(MAX_WINDOW, |window| window.min(MAX_WINDOW))
}

/// Channel definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelConfig {
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Alternative `[min, max]` form
    #[serde(default, deserialize_with = "lenient::opt_range", skip_serializing)]
    pub range: Option<(Option<f64>, Option<f64>)>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osc_address: Option<String>,
    #[serde(default)]
    pub osc_type: OscArgType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub osc_strings: Vec<String>,
}

impl ChannelConfig {
    /// Valid `(min, max)` bounds, or `None` when missing or inverted
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let (range_lo, range_hi) = self.range.unwrap_or((None, None));
        let lo = self.min_value.or(range_lo)?;
        let hi = self.max_value.or(range_hi)?;
        (lo < hi).then_some((lo, hi))
    }
}

/// Variable definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VariableConfig {
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub step_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_change_osc: Option<VariableOscConfig>,
}

impl VariableConfig {
    /// Value a newly seen variable starts with
    pub fn starting_value(&self) -> f64 {
        self.current_value.or(self.initial_value).unwrap_or(0.0)
    }
}

/// OSC message sent whenever a variable changes
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VariableOscConfig {
    #[serde(default)]
    pub enabled: bool,
    /// May contain `{var}` and `{value}` tokens
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub value_type: OscArgType,
    /// `value`, `normalized_value`, or fixed text with `{var}`/`{value}` tokens
    #[serde(default = "default_value_content")]
    pub value_content: String,
}

impl AppConfig {
    /// Load configuration from file with sanitizing and validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.sanitize();
        config.validate()?;

        Ok(config)
    }

    /// Parse YAML or JSON text. An empty document yields the default configuration.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            warn!("Configuration is empty, using defaults");
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Coerce invalid numeric settings to safe values, warning about each fix
    pub fn sanitize(&mut self) {
        for (name, channel) in self.internal_channels.iter_mut() {
            let (min, max) = match channel.bounds() {
                Some(bounds) => bounds,
                None => {
                    warn!(
                        "Channel '{}' has missing or invalid bounds ({:?}..{:?}), using 0.0..1.0",
                        name,
                        channel.min_value.or(channel.range.and_then(|r| r.0)),
                        channel.max_value.or(channel.range.and_then(|r| r.1))
                    );
                    (0.0, 1.0)
                }
            };
            channel.min_value = Some(min);
            channel.max_value = Some(max);
            channel.range = None;

            if let Some(default) = channel.default {
                if default < min || default > max {
                    warn!(
                        "Channel '{}' default {} outside {}..{}, clamping",
                        name, default, min, max
                    );
                    channel.default = Some(default.clamp(min, max));
                }
            }

            if channel.osc_type == OscArgType::String && channel.osc_strings.is_empty() {
                warn!("Channel '{}' uses string OSC type without osc_strings", name);
            }
        }

        for (name, variable) in self.internal_variables.iter_mut() {
            if let (Some(min), Some(max)) = (variable.min_value, variable.max_value) {
                if min >= max {
                    warn!(
                        "Variable '{}' has invalid bounds {}..{}, ignoring them",
                        name, min, max
                    );
                    variable.min_value = None;
                    variable.max_value = None;
                }
            }
        }

        if self.osc_settings.max_updates_per_second.map_or(false, |hz| {
            hz <= 0.0 || hz > MAX_UPDATES_PER_SECOND_CAP
        }) {
            warn!(
                "osc_settings.max_updates_per_second out of range, using {} Hz",
                self.osc_settings.updates_per_second()
            );
        }

        let processing = &self.processing;
        let (lo, hi) = TICK_RATE_RANGE_HZ;
        if !(lo..=hi).contains(&processing.rate_hz) {
            warn!(
                "processing.rate_hz {} out of range, using {} Hz",
                processing.rate_hz,
                processing.tick_rate_hz()
            );
        }
        for (field, secs, effective) in [
            ("activity_window_s", processing.activity_window_s, processing.activity_window()),
            ("variable_suppression_s", processing.variable_suppression_s, processing.variable_suppression()),
        ] {
            if secs.is_nan() || secs < 0.0 || secs > MAX_WINDOW.as_secs_f64() {
                warn!("processing.{} {} out of range, using {:?}", field, secs, effective);
            }
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.osc_settings.ip.trim().is_empty() {
            anyhow::bail!("osc_settings.ip cannot be empty");
        }
        if self.osc_settings.port == 0 {
            anyhow::bail!("osc_settings.port cannot be 0");
        }

        if !self.layers.contains_key(&self.active_layer) {
            warn!(
                "Active layer '{}' is not defined; no mappings will be active",
                self.active_layer
            );
        }

        Ok(())
    }
}

// Default value functions
fn default_osc_ip() -> String { "127.0.0.1".to_string() }
fn default_osc_port() -> u16 { 9000 }
fn default_stick_deadzone() -> f64 { 0.1 }
fn default_trigger_deadzone() -> f64 { 0.1 }
fn default_polling_rate() -> f64 { 120.0 }
fn default_press_threshold() -> f64 { 0.5 }
fn default_rate_hz() -> f64 { 120.0 }
fn default_activity_window() -> f64 { 0.1 }
fn default_variable_suppression() -> f64 { 0.1 }
fn default_active_layer() -> String { "A".to_string() }
fn default_value_content() -> String { "value".to_string() }
