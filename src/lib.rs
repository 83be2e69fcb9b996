//! Gamepad to OSC gateway
//!
//! Reads game controllers, merges their state, maps inputs onto named
//! channels and variables through layered mapping rules, and sends the
//! results as OSC over UDP at a bounded rate.

pub mod config;
pub mod engine;
pub mod input;
pub mod osc;
pub mod paths;
pub mod state;

pub use config::AppConfig;
pub use engine::{Engine, TickLoop, ValueUpdate};
