//! Channel and variable state
//!
//! Holds the current numeric value of every configured channel and variable.
//! Setters clamp and report real changes; the engine decides what to emit.

mod store;
mod types;

pub use store::ChannelStore;
pub use types::{clamp_and_snap, ChannelSpec, VariableSpec, BOUND_SNAP_EPSILON, CONTINUOUS_CHANGE_EPSILON};
