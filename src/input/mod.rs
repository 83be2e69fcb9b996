//! Controller input: device conversion, name normalization, shaping and merging
//!
//! Device layers ([`xinput`], [`jsl`], [`provider`]) produce [`InputEvent`]s
//! carrying device-specific names and unshaped values. The engine then runs
//! each raw value through [`names::normalize`], [`normalize::shape`] and the
//! [`merger::StateMerger`].

pub mod jsl;
pub mod merger;
pub mod names;
pub mod normalize;
pub mod provider;
pub mod xinput;

pub use merger::StateMerger;
pub use names::{classify, normalize as normalize_name, InputKind};
pub use normalize::{shape, ShapeParams};
pub use provider::{EventCallback, GamepadProvider};

/// Event emitted by a device layer
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A controller appeared
    Connected {
        controller_id: String,
        device_type: String,
        details: String,
    },
    /// A controller went away; its contribution must be dropped
    Disconnected { controller_id: String },
    /// One input changed value (device-specific name, unshaped value)
    Raw {
        controller_id: String,
        name: String,
        value: f64,
    },
}

impl InputEvent {
    pub fn raw(controller_id: &str, name: &str, value: f64) -> Self {
        InputEvent::Raw {
            controller_id: controller_id.to_string(),
            name: name.to_string(),
            value,
        }
    }

    pub fn controller_id(&self) -> &str {
        match self {
            InputEvent::Connected { controller_id, .. }
            | InputEvent::Disconnected { controller_id }
            | InputEvent::Raw { controller_id, .. } => controller_id,
        }
    }
}
