//! XInput report to raw input event conversion
//!
//! Converts successive XInput gamepad reports (the `XINPUT_GAMEPAD` layout:
//! button bitfield, two u8 triggers, four i16 thumb axes) into raw input
//! events, emitting only what changed since the previous report.
//! Controllers are identified as `xinput_{user_index}`.

use super::normalize::{normalize_thumb, normalize_trigger};
use super::InputEvent;

/// Number of XInput user slots
pub const XINPUT_SLOTS: usize = 4;

/// XInput button bit flags, per the XInput API
mod button_flags {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

const BUTTON_NAMES: [(u16, &str); 14] = [
    (button_flags::DPAD_UP, "DPAD_UP"),
    (button_flags::DPAD_DOWN, "DPAD_DOWN"),
    (button_flags::DPAD_LEFT, "DPAD_LEFT"),
    (button_flags::DPAD_RIGHT, "DPAD_RIGHT"),
    (button_flags::START, "START"),
    (button_flags::BACK, "BACK"),
    (button_flags::LEFT_THUMB, "LEFT_THUMB"),
    (button_flags::RIGHT_THUMB, "RIGHT_THUMB"),
    (button_flags::LEFT_SHOULDER, "LEFT_SHOULDER"),
    (button_flags::RIGHT_SHOULDER, "RIGHT_SHOULDER"),
    (button_flags::A, "A"),
    (button_flags::B, "B"),
    (button_flags::X, "X"),
    (button_flags::Y, "Y"),
];

/// One XInput gamepad report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XInputReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl XInputReport {
    /// Normalized continuous values, in a fixed order
    fn axes(&self) -> [(&'static str, f64); 6] {
        let (lx, ly) = normalize_thumb(self.thumb_lx, self.thumb_ly);
        let (rx, ry) = normalize_thumb(self.thumb_rx, self.thumb_ry);
        [
            ("LEFT_STICK_X", lx),
            ("LEFT_STICK_Y", ly),
            ("RIGHT_STICK_X", rx),
            ("RIGHT_STICK_Y", ry),
            ("LEFT_TRIGGER", normalize_trigger(self.left_trigger)),
            ("RIGHT_TRIGGER", normalize_trigger(self.right_trigger)),
        ]
    }
}

/// Convert button changes between two reports into events.
///
/// With no previous report, every pressed button is reported.
pub fn convert_buttons(controller_id: &str, old_buttons: Option<u16>, new_buttons: u16) -> Vec<InputEvent> {
    BUTTON_NAMES
        .iter()
        .filter_map(|&(flag, name)| {
            let was_pressed = old_buttons.map_or(false, |b| b & flag != 0);
            let pressed = new_buttons & flag != 0;
            (was_pressed != pressed).then(|| InputEvent::raw(controller_id, name, if pressed { 1.0 } else { 0.0 }))
        })
        .collect()
}

/// Convert stick and trigger changes between two reports into events.
pub fn convert_axes(controller_id: &str, old: Option<&XInputReport>, new: &XInputReport) -> Vec<InputEvent> {
    let old_axes = old.map(XInputReport::axes);
    new.axes()
        .iter()
        .enumerate()
        .filter(|(i, (_, value))| match &old_axes {
            Some(prev) => prev[*i].1 != *value,
            None => *value != 0.0,
        })
        .map(|(_, (name, value))| InputEvent::raw(controller_id, name, *value))
        .collect()
}

/// Per-slot report cache turning polling results into connect, disconnect and input events
#[derive(Debug, Default)]
pub struct XInputTracker {
    last: [Option<XInputReport>; XINPUT_SLOTS],
}

impl XInputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller_id(user_index: usize) -> String {
        format!("xinput_{}", user_index)
    }

    /// Feed the latest poll result for a slot (`None` = not connected)
    pub fn update(&mut self, user_index: usize, report: Option<XInputReport>) -> Vec<InputEvent> {
        let Some(slot) = self.last.get_mut(user_index) else {
            return Vec::new();
        };
        let controller_id = Self::controller_id(user_index);
        let mut events = Vec::new();

        let previous = *slot;
        match (previous, report) {
            (None, None) => {}
            (Some(_), None) => {
                events.push(InputEvent::Disconnected { controller_id });
                *slot = None;
            }
            (_, Some(report)) => {
                if previous.is_none() {
                    events.push(InputEvent::Connected {
                        controller_id: controller_id.clone(),
                        device_type: "xinput".to_string(),
                        details: format!("XInput Controller {}", user_index + 1),
                    });
                }
                if previous != Some(report) {
                    events.extend(convert_buttons(&controller_id, previous.map(|p| p.buttons), report.buttons));
                    events.extend(convert_axes(&controller_id, previous.as_ref(), &report));
                }
                *slot = Some(report);
            }
        }

        events
    }
}
