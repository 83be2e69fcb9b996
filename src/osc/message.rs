//! Typed OSC message construction
//!
//! Values are coerced to the requested type before encoding:
//! - float: `f` argument
//! - int: `i` argument, fractional part truncated
//! - bool: `i` argument 0 or 1
//! - string: `s` argument
//!
//! A string that cannot be read as a number is sent as a string whatever the
//! hint says.

use rosc::{OscMessage, OscType};

use super::{format_number, OscArgType, OscValue};

/// Strings read as `true` for boolean payloads
const TRUTHY: [&str; 4] = ["1", "true", "on", "yes"];

pub fn is_truthy_text(text: &str) -> bool {
    TRUTHY.contains(&text.trim().to_ascii_lowercase().as_str())
}

/// Build an OSC message with a single argument coerced to `hint`
pub fn build_message(address: &str, value: &OscValue, hint: OscArgType) -> OscMessage {
    OscMessage {
        addr: address.to_string(),
        args: vec![coerce(value, hint)],
    }
}

fn coerce(value: &OscValue, hint: OscArgType) -> OscType {
    match hint {
        OscArgType::String => OscType::String(match value {
            OscValue::String(s) => s.clone(),
            OscValue::Float(v) => format_number(*v),
            OscValue::Int(v) => v.to_string(),
            OscValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        }),
        OscArgType::Float => match as_number(value) {
            Some(v) => OscType::Float(v as f32),
            None => passthrough(value),
        },
        OscArgType::Int => match as_number(value) {
            Some(v) => OscType::Int(v.trunc() as i32),
            None => passthrough(value),
        },
        OscArgType::Bool => {
            let truthy = match value {
                OscValue::Bool(b) => *b,
                OscValue::Float(v) => *v != 0.0,
                OscValue::Int(v) => *v != 0,
                OscValue::String(s) => is_truthy_text(s),
            };
            OscType::Int(i32::from(truthy))
        }
    }
}

fn as_number(value: &OscValue) -> Option<f64> {
    match value {
        OscValue::Float(v) => Some(*v),
        OscValue::Int(v) => Some(*v as f64),
        OscValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        OscValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn passthrough(value: &OscValue) -> OscType {
    match value {
        OscValue::String(s) => OscType::String(s.clone()),
        other => OscType::String(other.to_string()),
    }
}
