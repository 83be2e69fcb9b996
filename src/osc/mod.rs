//! OSC output: value types, message construction and UDP sending
//!
//! The engine talks to an [`OscSink`]: it queues one message per eligible
//! emission and flushes exactly once per tick. [`UdpOscSender`] is the
//! network implementation; [`DiscardSink`] keeps the gateway running when no
//! socket could be opened.

pub mod message;
pub mod sender;
pub mod template;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

pub use message::build_message;
pub use sender::{OscError, UdpOscSender};

/// Type hint attached to a queued value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OscArgType {
    #[default]
    Float,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "boolean")]
    Bool,
    String,
}

/// Value handed to the sink before type coercion
#[derive(Debug, Clone, PartialEq)]
pub enum OscValue {
    Float(f64),
    Int(i32),
    Bool(bool),
    String(String),
}

impl fmt::Display for OscValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscValue::Float(v) => write!(f, "{}", format_number(*v)),
            OscValue::Int(v) => write!(f, "{}", v),
            OscValue::Bool(v) => write!(f, "{}", v),
            OscValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Destination for outgoing OSC messages
pub trait OscSink: Send {
    /// Queue one message; coercion to `hint` happens at construction time
    fn queue(&mut self, address: &str, value: OscValue, hint: OscArgType);

    /// Send everything queued and clear the queue, whatever the outcome
    fn flush(&mut self);
}

/// Sink used when no UDP socket is available
#[derive(Debug, Default)]
pub struct DiscardSink {
    queued: usize,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OscSink for DiscardSink {
    fn queue(&mut self, address: &str, value: OscValue, _hint: OscArgType) {
        trace!("OSC (discarded) {} {}", address, value);
        self.queued += 1;
    }

    fn flush(&mut self) {
        self.queued = 0;
    }
}

/// Render a number the way addresses and string payloads expect it:
/// integral values without a decimal part, everything else as-is.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Recording sink for tests: messages become visible once flushed
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSink {
    queued: Vec<(String, OscValue, OscArgType)>,
    pub sent: std::sync::Arc<parking_lot::Mutex<Vec<(String, OscValue, OscArgType)>>>,
    pub flushes: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn sent_to(&self, address: &str) -> Vec<OscValue> {
        self.sent
            .lock()
            .iter()
            .filter(|(a, _, _)| a == address)
            .map(|(_, v, _)| v.clone())
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[cfg(test)]
impl OscSink for RecordingSink {
    fn queue(&mut self, address: &str, value: OscValue, hint: OscArgType) {
        self.queued.push((address.to_string(), value, hint));
    }

    fn flush(&mut self) {
        self.sent.lock().append(&mut self.queued);
        self.flushes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn test_arg_type_aliases() {
        let t: OscArgType = serde_yaml::from_str("integer").unwrap();
        assert_eq!(t, OscArgType::Int);
        let t: OscArgType = serde_yaml::from_str("bool").unwrap();
        assert_eq!(t, OscArgType::Bool);
    }

    #[test]
    fn test_recording_sink_publishes_on_flush() {
        let mut sink = RecordingSink::default();
        sink.queue("/a", OscValue::Float(1.0), OscArgType::Float);
        assert!(sink.sent_to("/a").is_empty());
        sink.flush();
        assert_eq!(sink.sent_to("/a"), vec![OscValue::Float(1.0)]);
        assert_eq!(sink.flush_count(), 1);
    }
}
