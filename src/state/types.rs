//! Channel and variable definitions resolved from configuration

use crate::config::{ChannelConfig, VariableConfig, VariableOscConfig};
use crate::osc::OscArgType;

/// Distance under which a value snaps onto a bound
pub const BOUND_SNAP_EPSILON: f64 = 1e-9;

/// Minimum difference counted as a change for continuous writes
pub const CONTINUOUS_CHANGE_EPSILON: f64 = 1e-7;

/// Resolved channel definition with guaranteed `min < max`
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub osc_address: Option<String>,
    pub osc_type: OscArgType,
    pub osc_strings: Vec<String>,
}

impl ChannelSpec {
    pub fn from_config(config: &ChannelConfig) -> Self {
        let (min, max) = config.bounds().unwrap_or((0.0, 1.0));
        let default = config.default.unwrap_or(min).clamp(min, max);
        Self {
            min,
            max,
            default,
            osc_address: config
                .osc_address
                .as_ref()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            osc_type: config.osc_type,
            osc_strings: config.osc_strings.clone(),
        }
    }

    /// Clamp into `[min, max]`, snapping values within epsilon of a bound
    pub fn clamp_and_snap(&self, value: f64) -> f64 {
        clamp_and_snap(value, self.min, self.max)
    }
}

/// Resolved variable definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub on_change_osc: Option<VariableOscConfig>,
}

impl VariableSpec {
    pub fn from_config(config: &VariableConfig) -> Self {
        Self {
            min: config.min_value,
            max: config.max_value,
            step: config.step_value,
            on_change_osc: config.on_change_osc.clone().filter(|osc| osc.enabled),
        }
    }

    /// Both bounds, when present and ordered
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) if lo < hi => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        match self.bounds() {
            Some((lo, hi)) => clamp_and_snap(value, lo, hi),
            None => value,
        }
    }
}

pub fn clamp_and_snap(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return if value == f64::INFINITY { max } else { min };
    }
    let clamped = value.clamp(min, max);
    if (clamped - min).abs() < BOUND_SNAP_EPSILON {
        min
    } else if (clamped - max).abs() < BOUND_SNAP_EPSILON {
        max
    } else {
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_spec_defaults_to_unit_range() {
        let spec = ChannelSpec::from_config(&ChannelConfig::default());
        assert_eq!((spec.min, spec.max, spec.default), (0.0, 1.0, 0.0));
        assert!(spec.osc_address.is_none());
    }

    #[test]
    fn test_channel_spec_clamps_default() {
        let config = ChannelConfig {
            min_value: Some(-1.0),
            max_value: Some(1.0),
            default: Some(4.0),
            osc_address: Some("  ".to_string()),
            ..Default::default()
        };
        let spec = ChannelSpec::from_config(&config);
        assert_eq!(spec.default, 1.0);
        assert!(spec.osc_address.is_none());
    }

    #[test]
    fn test_snap() {
        assert_eq!(clamp_and_snap(1.0 - 1e-10, 0.0, 1.0), 1.0);
        assert_eq!(clamp_and_snap(5e-10, 0.0, 1.0), 0.0);
        assert_eq!(clamp_and_snap(0.5, 0.0, 1.0), 0.5);
        assert_eq!(clamp_and_snap(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_variable_bounds_need_both() {
        let spec = VariableSpec { min: Some(0.0), ..Default::default() };
        assert_eq!(spec.clamp(-5.0), -5.0);

        let spec = VariableSpec { min: Some(0.0), max: Some(3.0), ..Default::default() };
        assert_eq!(spec.clamp(-5.0), 0.0);
        assert_eq!(spec.clamp(7.0), 3.0);
    }
}
