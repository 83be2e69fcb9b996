//! JoyShockLibrary state to raw input event conversion
//!
//! JoyShockLibrary reports a "simple state" (button mask, analog triggers and
//! sticks as floats) plus, for motion-capable devices, an IMU state. This
//! module turns successive snapshots into raw input events for controller
//! ids of the form `jsl_{handle}`. Button names are JoyShockLibrary's own and
//! get translated to generic ids by [`super::names`].

use std::collections::HashMap;

use super::InputEvent;

/// Gyro rate (deg/s) that maps to full deflection
pub const GYRO_FULL_SCALE_DPS: f64 = 750.0;

/// JoyShockLibrary button masks
pub mod button_masks {
    pub const UP: u32 = 0x00001;
    pub const DOWN: u32 = 0x00002;
    pub const LEFT: u32 = 0x00004;
    pub const RIGHT: u32 = 0x00008;
    pub const PLUS: u32 = 0x00010;
    pub const MINUS: u32 = 0x00020;
    pub const LCLICK: u32 = 0x00040;
    pub const RCLICK: u32 = 0x00080;
    pub const L: u32 = 0x00100;
    pub const R: u32 = 0x00200;
    pub const ZL: u32 = 0x00400;
    pub const ZR: u32 = 0x00800;
    pub const S: u32 = 0x01000;
    pub const E: u32 = 0x02000;
    pub const W: u32 = 0x04000;
    pub const N: u32 = 0x08000;
    pub const HOME: u32 = 0x10000;
    pub const CAPTURE: u32 = 0x20000;
    pub const MIC: u32 = 0x40000;
    pub const SL: u32 = 0x80000;
    pub const SR: u32 = 0x100000;
    pub const FNL: u32 = 0x200000;
    pub const FNR: u32 = 0x400000;
}

const BUTTON_NAMES: [(u32, &str); 23] = [
    (button_masks::UP, "UP"),
    (button_masks::DOWN, "DOWN"),
    (button_masks::LEFT, "LEFT"),
    (button_masks::RIGHT, "RIGHT"),
    (button_masks::PLUS, "PLUS"),
    (button_masks::MINUS, "MINUS"),
    (button_masks::LCLICK, "LEFT_STICK_PRESS"),
    (button_masks::RCLICK, "RIGHT_STICK_PRESS"),
    (button_masks::L, "LEFT_SHOULDER"),
    (button_masks::R, "RIGHT_SHOULDER"),
    (button_masks::ZL, "LEFT_TRIGGER_PRESS"),
    (button_masks::ZR, "RIGHT_TRIGGER_PRESS"),
    (button_masks::S, "S"),
    (button_masks::E, "E"),
    (button_masks::W, "W"),
    (button_masks::N, "N"),
    (button_masks::HOME, "HOME"),
    (button_masks::CAPTURE, "CAPTURE"),
    (button_masks::MIC, "MIC"),
    (button_masks::SL, "SL"),
    (button_masks::SR, "SR"),
    (button_masks::FNL, "FNL"),
    (button_masks::FNR, "FNR"),
];

/// Mirror of JoyShockLibrary's simple state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JslSimpleState {
    pub buttons: u32,
    pub l_trigger: f32,
    pub r_trigger: f32,
    pub stick_lx: f32,
    pub stick_ly: f32,
    pub stick_rx: f32,
    pub stick_ry: f32,
}

/// Mirror of JoyShockLibrary's IMU state (accel in g, gyro in deg/s)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JslImuState {
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

/// Flatten a snapshot into named values.
///
/// Left stick Y is flipped so that "up" reads the same as XInput devices
/// wired through this library. Motion axes are clamped to [-1, 1].
pub fn snapshot_values(state: &JslSimpleState, imu: Option<&JslImuState>) -> Vec<(&'static str, f64)> {
    let mut values: Vec<(&'static str, f64)> = BUTTON_NAMES
        .iter()
        .map(|&(mask, name)| (name, if state.buttons & mask != 0 { 1.0 } else { 0.0 }))
        .collect();

    values.extend([
        ("LEFT_TRIGGER", state.l_trigger as f64),
        ("RIGHT_TRIGGER", state.r_trigger as f64),
        ("LEFT_STICK_X", state.stick_lx as f64),
        ("LEFT_STICK_Y", -(state.stick_ly as f64)),
        ("RIGHT_STICK_X", state.stick_rx as f64),
        ("RIGHT_STICK_Y", state.stick_ry as f64),
    ]);

    if let Some(imu) = imu {
        let motion = [
            ("ACCEL_X", imu.accel_x as f64),
            ("ACCEL_Y", imu.accel_y as f64),
            ("ACCEL_Z", imu.accel_z as f64),
            ("GYRO_X", imu.gyro_x as f64 / GYRO_FULL_SCALE_DPS),
            ("GYRO_Y", imu.gyro_y as f64 / GYRO_FULL_SCALE_DPS),
            ("GYRO_Z", imu.gyro_z as f64 / GYRO_FULL_SCALE_DPS),
        ];
        values.extend(motion.into_iter().map(|(name, v)| (name, v.clamp(-1.0, 1.0))));
    }

    values
}

/// Per-handle snapshot cache producing change events
#[derive(Debug, Default)]
pub struct JslTracker {
    previous: HashMap<i32, HashMap<&'static str, f64>>,
}

impl JslTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller_id(handle: i32) -> String {
        format!("jsl_{}", handle)
    }

    /// Device announced by the library's connect callback
    pub fn connect(&mut self, handle: i32, device_type: &str) -> InputEvent {
        self.previous.insert(handle, HashMap::new());
        InputEvent::Connected {
            controller_id: Self::controller_id(handle),
            device_type: "jsl".to_string(),
            details: device_type.to_string(),
        }
    }

    /// Device dropped; `None` if the handle was never connected
    pub fn disconnect(&mut self, handle: i32) -> Option<InputEvent> {
        self.previous.remove(&handle).map(|_| InputEvent::Disconnected {
            controller_id: Self::controller_id(handle),
        })
    }

    /// Diff a new snapshot against the last one for this handle
    pub fn update(&mut self, handle: i32, state: &JslSimpleState, imu: Option<&JslImuState>) -> Vec<InputEvent> {
        let controller_id = Self::controller_id(handle);
        let previous = self.previous.entry(handle).or_default();
        let mut events = Vec::new();

        for (name, value) in snapshot_values(state, imu) {
            let changed = match previous.get(name) {
                Some(old) => *old != value,
                None => value != 0.0,
            };
            if changed {
                events.push(InputEvent::raw(&controller_id, name, value));
            }
            previous.insert(name, value);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(events: &[InputEvent], wanted: &str) -> Option<f64> {
        events.iter().find_map(|e| match e {
            InputEvent::Raw { name, value, .. } if name == wanted => Some(*value),
            _ => None,
        })
    }

    #[test]
    fn test_buttons_and_sticks() {
        let mut tracker = JslTracker::new();
        tracker.connect(3, "DS4");

        let state = JslSimpleState {
            buttons: button_masks::S | button_masks::ZR,
            stick_ly: 0.5,
            r_trigger: 0.25,
            ..Default::default()
        };
        let events = tracker.update(3, &state, None);
        assert_eq!(value_of(&events, "S"), Some(1.0));
        assert_eq!(value_of(&events, "RIGHT_TRIGGER_PRESS"), Some(1.0));
        assert_eq!(value_of(&events, "LEFT_STICK_Y"), Some(-0.5));
        assert_eq!(value_of(&events, "RIGHT_TRIGGER"), Some(0.25));
        assert_eq!(value_of(&events, "N"), None);

        // Unchanged snapshot yields nothing; release yields 0.0
        assert!(tracker.update(3, &state, None).is_empty());
        let released = JslSimpleState { buttons: button_masks::ZR, ..state };
        let events = tracker.update(3, &released, None);
        assert_eq!(events.len(), 1);
        assert_eq!(value_of(&events, "S"), Some(0.0));
    }

    #[test]
    fn test_motion_scaling_and_clamp() {
        let imu = JslImuState {
            accel_x: 3.0,
            gyro_y: 375.0,
            gyro_z: -2000.0,
            ..Default::default()
        };
        let values: HashMap<_, _> = snapshot_values(&JslSimpleState::default(), Some(&imu))
            .into_iter()
            .collect();
        assert_eq!(values["ACCEL_X"], 1.0);
        assert_eq!(values["GYRO_Y"], 0.5);
        assert_eq!(values["GYRO_Z"], -1.0);
    }

    #[test]
    fn test_connect_disconnect() {
        let mut tracker = JslTracker::new();
        assert!(tracker.disconnect(9).is_none());
        let event = tracker.connect(9, "JOYCON LEFT");
        assert!(matches!(event, InputEvent::Connected { ref controller_id, .. } if controller_id == "jsl_9"));
        assert!(matches!(tracker.disconnect(9), Some(InputEvent::Disconnected { .. })));
    }
}
