//! Deadzone and response-curve shaping for continuous inputs.
//!
//! # Shaping
//!
//! - Buttons and motion axes pass through untouched.
//! - Sticks and triggers below the deadzone read as zero; above it the
//!   remaining travel is rescaled so the deadzone edge maps to 0.0 and full
//!   deflection still maps to 1.0.
//! - Sticks then go through an optional exponent curve on their magnitude.
//!
//! # Raw device helpers
//!
//! - [`normalize_thumb`]: XInput thumbstick pair (i16 range) to the unit circle
//! - [`normalize_trigger`]: XInput trigger (u8 range) to [0, 1]

use crate::config::InputSettings;

use super::names::InputKind;

/// Largest single-axis deflection of an XInput thumbstick.
/// 32768 so that i16::MIN maps to exactly -1.0.
const THUMB_MAX_MAGNITUDE: f64 = 32768.0;

/// Shaping parameters resolved from [`InputSettings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeParams {
    pub stick_deadzone: f64,
    pub trigger_deadzone: f64,
    pub stick_curve: f64,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            stick_deadzone: 0.1,
            trigger_deadzone: 0.1,
            stick_curve: 1.0,
        }
    }
}

impl From<&InputSettings> for ShapeParams {
    fn from(settings: &InputSettings) -> Self {
        Self {
            stick_deadzone: settings.stick_deadzone.clamp(0.0, 1.0),
            trigger_deadzone: settings.trigger_deadzone.clamp(0.0, 1.0),
            stick_curve: settings.stick_curve.exponent(),
        }
    }
}

/// Shape a raw value according to its input kind
///
/// # Arguments
/// * `value` - Raw value as reported by the device layer
/// * `kind` - Classification of the generic input
/// * `params` - Deadzones and stick curve
///
/// # Returns
/// Shaped value with magnitude <= 1.0 for sticks and triggers
pub fn shape(value: f64, kind: InputKind, params: &ShapeParams) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    match kind {
        InputKind::Digital | InputKind::Motion => value,
        InputKind::BipolarAnalog => {
            apply_curve(apply_deadzone(value, params.stick_deadzone), params.stick_curve)
        }
        InputKind::UnipolarAnalog => apply_deadzone(value, params.trigger_deadzone),
    }
}

/// Zero values inside the deadzone and rescale the rest, preserving sign
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    let magnitude = value.abs();
    if magnitude < deadzone {
        return 0.0;
    }
    let effective = if deadzone >= 1.0 {
        1.0
    } else {
        ((magnitude - deadzone) / (1.0 - deadzone)).min(1.0)
    };
    effective.copysign(value)
}

/// Sign-preserving exponent curve; identity for curve 1.0 or value 0.0
pub fn apply_curve(value: f64, curve: f64) -> f64 {
    if curve == 1.0 || value == 0.0 {
        return value;
    }
    value.abs().min(1.0).powf(curve).copysign(value)
}

/// Map an XInput thumbstick pair onto the unit circle.
///
/// Scales radially so cardinal directions reach 1.0 and diagonals are
/// clamped to magnitude 1.0 instead of overshooting.
pub fn normalize_thumb(raw_x: i16, raw_y: i16) -> (f64, f64) {
    let x = raw_x as f64;
    let y = raw_y as f64;
    let magnitude = (x * x + y * y).sqrt();

    if magnitude == 0.0 {
        return (0.0, 0.0);
    }

    let normalized_magnitude = (magnitude / THUMB_MAX_MAGNITUDE).min(1.0);
    let scale = normalized_magnitude / magnitude;

    (x * scale, y * scale)
}

/// Normalize XInput trigger value (u8) to 0.0 to 1.0.
pub fn normalize_trigger(value: u8) -> f64 {
    value as f64 / 255.0
}
