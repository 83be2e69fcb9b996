//! Device-specific input names to generic, device-agnostic ids
//!
//! XInput names are already the generic vocabulary. JoyShockLibrary buttons
//! are mapped by position (south face button = `A`, and so on), so a mapping
//! written against one controller family works on the other.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

/// How a generic input reports values and merges across controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Button, 0.0 or 1.0
    Digital,
    /// Stick axis in [-1, 1]
    BipolarAnalog,
    /// Trigger in [0, 1]
    UnipolarAnalog,
    /// Accelerometer or gyro axis in [-1, 1]
    Motion,
}

impl InputKind {
    /// Continuous inputs feed the per-tick path, digital ones the press path
    pub fn is_analog(self) -> bool {
        !matches!(self, InputKind::Digital)
    }
}

pub const LEFT_STICK_X: &str = "LEFT_STICK_X";
pub const LEFT_STICK_Y: &str = "LEFT_STICK_Y";
pub const RIGHT_STICK_X: &str = "RIGHT_STICK_X";
pub const RIGHT_STICK_Y: &str = "RIGHT_STICK_Y";
pub const LEFT_TRIGGER: &str = "LEFT_TRIGGER";
pub const RIGHT_TRIGGER: &str = "RIGHT_TRIGGER";

const BIPOLAR: [&str; 4] = [LEFT_STICK_X, LEFT_STICK_Y, RIGHT_STICK_X, RIGHT_STICK_Y];
const UNIPOLAR: [&str; 2] = [LEFT_TRIGGER, RIGHT_TRIGGER];
const MOTION: [&str; 6] = ["ACCEL_X", "ACCEL_Y", "ACCEL_Z", "GYRO_X", "GYRO_Y", "GYRO_Z"];

const DIGITAL: [&str; 23] = [
    "A", "B", "X", "Y",
    "DPAD_UP", "DPAD_DOWN", "DPAD_LEFT", "DPAD_RIGHT",
    "START", "BACK", "GUIDE",
    "LEFT_THUMB", "RIGHT_THUMB",
    "LEFT_SHOULDER", "RIGHT_SHOULDER",
    "LEFT_TRIGGER_PRESS", "RIGHT_TRIGGER_PRESS",
    "CAPTURE", "MIC", "SL", "SR", "FNL", "FNR",
];

/// JoyShockLibrary name -> generic id
const JSL_ALIASES: [(&str, &str); 13] = [
    ("UP", "DPAD_UP"),
    ("DOWN", "DPAD_DOWN"),
    ("LEFT", "DPAD_LEFT"),
    ("RIGHT", "DPAD_RIGHT"),
    ("PLUS", "START"),
    ("MINUS", "BACK"),
    ("HOME", "GUIDE"),
    ("LEFT_STICK_PRESS", "LEFT_THUMB"),
    ("RIGHT_STICK_PRESS", "RIGHT_THUMB"),
    ("S", "A"),
    ("E", "B"),
    ("W", "X"),
    ("N", "Y"),
];

static RAW_TO_GENERIC: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, &'static str> = HashMap::new();
    for name in DIGITAL.iter().chain(&BIPOLAR).chain(&UNIPOLAR).chain(&MOTION) {
        table.insert(*name, *name);
    }
    for (raw, generic) in JSL_ALIASES {
        table.insert(raw, generic);
    }
    table
});

static KINDS: Lazy<HashMap<&'static str, InputKind>> = Lazy::new(|| {
    let mut kinds = HashMap::new();
    kinds.extend(BIPOLAR.iter().map(|n| (*n, InputKind::BipolarAnalog)));
    kinds.extend(UNIPOLAR.iter().map(|n| (*n, InputKind::UnipolarAnalog)));
    kinds.extend(MOTION.iter().map(|n| (*n, InputKind::Motion)));
    kinds.extend(DIGITAL.iter().map(|n| (*n, InputKind::Digital)));
    kinds
});

/// Translate a device-specific name into its generic id.
///
/// Unknown names pass through unchanged (logged as a lookup miss).
pub fn normalize(raw_name: &str) -> String {
    match RAW_TO_GENERIC.get(raw_name) {
        Some(generic) => (*generic).to_string(),
        None => {
            debug!("No generic mapping for raw input '{}', passing through", raw_name);
            raw_name.to_string()
        }
    }
}

/// Classify a generic id. Unknown ids are treated as buttons.
pub fn classify(generic: &str) -> InputKind {
    KINDS.get(generic).copied().unwrap_or(InputKind::Digital)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xinput_names_are_identity() {
        assert_eq!(normalize("A"), "A");
        assert_eq!(normalize("LEFT_STICK_X"), "LEFT_STICK_X");
        assert_eq!(normalize("DPAD_UP"), "DPAD_UP");
    }

    #[test]
    fn test_jsl_names_map_positionally() {
        assert_eq!(normalize("S"), "A");
        assert_eq!(normalize("N"), "Y");
        assert_eq!(normalize("UP"), "DPAD_UP");
        assert_eq!(normalize("PLUS"), "START");
        assert_eq!(normalize("LEFT_STICK_PRESS"), "LEFT_THUMB");
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(normalize("PADDLE_1"), "PADDLE_1");
        assert_eq!(classify("PADDLE_1"), InputKind::Digital);
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify("RIGHT_STICK_Y"), InputKind::BipolarAnalog);
        assert_eq!(classify("LEFT_TRIGGER"), InputKind::UnipolarAnalog);
        assert_eq!(classify("GYRO_Z"), InputKind::Motion);
        assert_eq!(classify("LEFT_TRIGGER_PRESS"), InputKind::Digital);
        assert!(classify("ACCEL_X").is_analog());
        assert!(!classify("B").is_analog());
    }
}
