//! Turns store values into queued OSC messages
//!
//! Channels go out at their configured address, with `{Variable}`
//! placeholders expanded from current variable values. Right after a
//! variable changes, channels whose address depends on variables are held
//! back briefly so a stale address is never sent in the same instant.

use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{LayerOscConfig, LayerValueType, VariableOscConfig};
use crate::osc::message::is_truthy_text;
use crate::osc::template::{expand_tokens, expand_variables, has_placeholders};
use crate::osc::{OscArgType, OscSink, OscValue};
use crate::state::{ChannelSpec, VariableSpec};

/// Result of trying to emit a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Queued,
    /// Channel has no OSC address
    Skipped,
    /// Address depends on a variable that just changed
    Suppressed,
}

/// Owns the sink and the variable-change suppression window
pub struct OscEmitter {
    sink: Box<dyn OscSink>,
    suppress_until: Option<Instant>,
}

impl OscEmitter {
    pub fn new(sink: Box<dyn OscSink>) -> Self {
        Self {
            sink,
            suppress_until: None,
        }
    }

    pub fn replace_sink(&mut self, sink: Box<dyn OscSink>) {
        self.sink = sink;
    }

    /// Hold back variable-dependent channels until `now + window`
    pub fn suppress_variable_dependents(&mut self, now: Instant, window: Duration) {
        let until = now + window;
        self.suppress_until = Some(self.suppress_until.map_or(until, |current| current.max(until)));
    }

    pub fn is_suppressing(&self, now: Instant) -> bool {
        self.suppress_until.is_some_and(|until| now < until)
    }

    /// Queue a channel value
    ///
    /// # Arguments
    /// * `spec` - Channel definition (address, type, strings)
    /// * `value` - Current channel value
    /// * `variables` - Variable lookup for placeholder expansion
    /// * `now` - Current time, for the suppression window
    pub fn emit_channel<F>(&mut self, spec: &ChannelSpec, value: f64, variables: F, now: Instant) -> EmitOutcome
    where
        F: Fn(&str) -> Option<f64>,
    {
        let Some(raw_address) = spec.osc_address.as_deref() else {
            return EmitOutcome::Skipped;
        };
        let dependent = has_placeholders(raw_address);
        if dependent && self.is_suppressing(now) {
            debug!("Holding back '{}' while variables settle", raw_address);
            return EmitOutcome::Suppressed;
        }

        let address = if dependent {
            expand_variables(raw_address, &variables)
        } else {
            raw_address.to_string()
        };

        let payload = match (spec.osc_type, spec.osc_strings.as_slice()) {
            (OscArgType::String, strings) if !strings.is_empty() => {
                let index = if value >= 0.5 && strings.len() > 1 { 1 } else { 0 };
                OscValue::String(expand_variables(&strings[index], &variables))
            }
            _ => OscValue::Float(value),
        };

        self.sink.queue(&address, payload, spec.osc_type);
        EmitOutcome::Queued
    }

    /// Queue a variable's change notification, if it has one
    pub fn emit_variable(&mut self, name: &str, value: f64, spec: &VariableSpec) -> bool {
        let Some(osc) = spec.on_change_osc.as_ref() else {
            return false;
        };
        if osc.address.trim().is_empty() {
            return false;
        }
        let address = expand_tokens(osc.address.trim(), name, value);
        let payload = variable_payload(osc, name, value, spec);
        self.sink.queue(&address, payload, osc.value_type);
        true
    }

    /// Queue the one-shot notification of a layer switch
    pub fn emit_layer_notice(&mut self, notice: &LayerOscConfig) -> bool {
        let text = notice.value.trim();
        let (payload, hint) = match notice.value_type {
            LayerValueType::Float => match text.parse::<f64>() {
                Ok(v) => (OscValue::Float(v), OscArgType::Float),
                Err(e) => {
                    error!("Layer notice value '{}' is not a float: {}", text, e);
                    return false;
                }
            },
            LayerValueType::Integer => match text.parse::<i32>() {
                Ok(v) => (OscValue::Int(v), OscArgType::Int),
                Err(e) => {
                    error!("Layer notice value '{}' is not an integer: {}", text, e);
                    return false;
                }
            },
            LayerValueType::Boolean => (OscValue::Bool(is_truthy_text(text)), OscArgType::Bool),
            LayerValueType::String => (OscValue::String(notice.value.clone()), OscArgType::String),
        };
        info!("Layer notice: {} {}", notice.address, payload);
        self.sink.queue(notice.address.trim(), payload, hint);
        true
    }

    pub fn flush(&mut self) {
        self.sink.flush();
    }
}

/// Resolve `value_content` into the value to send
fn variable_payload(osc: &VariableOscConfig, name: &str, value: f64, spec: &VariableSpec) -> OscValue {
    let content = osc.value_content.trim();
    match content.to_ascii_lowercase().as_str() {
        "" | "value" => OscValue::Float(value),
        "normalized_value" => match spec.bounds() {
            Some((lo, hi)) => OscValue::Float(((value - lo) / (hi - lo)).clamp(0.0, 1.0)),
            None => OscValue::Float(value),
        },
        _ => {
            let text = expand_tokens(content, name, value);
            let parsed = text.trim().parse::<f64>().ok().filter(|v| v.is_finite());
            match (osc.value_type, parsed) {
                (OscArgType::Float, Some(v)) => OscValue::Float(v),
                (OscArgType::Int, Some(v)) => OscValue::Int(v.trunc() as i32),
                (OscArgType::Bool, _) => OscValue::Bool(is_truthy_text(&text)),
                _ => OscValue::String(text),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::RecordingSink;

    fn spec(address: &str) -> ChannelSpec {
        ChannelSpec {
            min: 0.0,
            max: 1.0,
            default: 0.0,
            osc_address: Some(address.to_string()),
            osc_type: OscArgType::Float,
            osc_strings: Vec::new(),
        }
    }

    fn vars(name: &str) -> Option<f64> {
        (name == "Bank").then_some(3.0)
    }

    fn emitter() -> (OscEmitter, RecordingSink) {
        let sink = RecordingSink::default();
        (OscEmitter::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn test_channel_address_expansion() {
        let (mut emitter, sink) = emitter();
        let now = Instant::now();
        assert_eq!(emitter.emit_channel(&spec("/bank/{Bank}/fader"), 0.5, vars, now), EmitOutcome::Queued);
        emitter.flush();
        assert_eq!(sink.sent_to("/bank/3/fader"), vec![OscValue::Float(0.5)]);
    }

    #[test]
    fn test_suppression_only_hits_dependent_channels() {
        let (mut emitter, sink) = emitter();
        let now = Instant::now();
        emitter.suppress_variable_dependents(now, Duration::from_millis(100));

        assert_eq!(
            emitter.emit_channel(&spec("/bank/{Bank}"), 0.5, vars, now),
            EmitOutcome::Suppressed
        );
        assert_eq!(emitter.emit_channel(&spec("/plain"), 0.5, vars, now), EmitOutcome::Queued);
        let later = now + Duration::from_millis(100);
        assert_eq!(emitter.emit_channel(&spec("/bank/{Bank}"), 0.5, vars, later), EmitOutcome::Queued);

        emitter.flush();
        assert_eq!(sink.sent_to("/plain").len(), 1);
        assert_eq!(sink.sent_to("/bank/3").len(), 1);
    }

    #[test]
    fn test_suppression_window_only_grows() {
        let (mut emitter, _) = emitter();
        let now = Instant::now();
        emitter.suppress_variable_dependents(now, Duration::from_millis(500));
        emitter.suppress_variable_dependents(now, Duration::from_millis(100));
        assert!(emitter.is_suppressing(now + Duration::from_millis(300)));
    }

    #[test]
    fn test_string_channel() {
        let (mut emitter, sink) = emitter();
        let mut s = spec("/state");
        s.osc_type = OscArgType::String;
        s.osc_strings = vec!["off".to_string(), "on {Bank}".to_string()];
        let now = Instant::now();

        emitter.emit_channel(&s, 1.0, vars, now);
        emitter.emit_channel(&s, 0.2, vars, now);
        emitter.flush();
        assert_eq!(
            sink.sent_to("/state"),
            vec![OscValue::String("on 3".to_string()), OscValue::String("off".to_string())]
        );
    }

    #[test]
    fn test_channel_without_address() {
        let (mut emitter, _) = emitter();
        let mut s = spec("/x");
        s.osc_address = None;
        assert_eq!(emitter.emit_channel(&s, 1.0, vars, Instant::now()), EmitOutcome::Skipped);
    }

    #[test]
    fn test_variable_payloads() {
        let (mut emitter, sink) = emitter();
        let mut var = VariableSpec {
            min: Some(0.0),
            max: Some(4.0),
            step: None,
            on_change_osc: Some(VariableOscConfig {
                enabled: true,
                address: "/var/{var}".to_string(),
                value_type: OscArgType::Float,
                value_content: "normalized_value".to_string(),
            }),
        };
        assert!(emitter.emit_variable("Bank", 1.0, &var));

        if let Some(osc) = var.on_change_osc.as_mut() {
            osc.value_content = "{value}".to_string();
            osc.value_type = OscArgType::Int;
        }
        emitter.emit_variable("Bank", 3.0, &var);

        if let Some(osc) = var.on_change_osc.as_mut() {
            osc.value_content = "bank {value}".to_string();
        }
        emitter.emit_variable("Bank", 3.0, &var);

        emitter.flush();
        assert_eq!(
            sink.sent_to("/var/Bank"),
            vec![
                OscValue::Float(0.25),
                OscValue::Int(3),
                OscValue::String("bank 3".to_string())
            ]
        );

        assert!(!emitter.emit_variable("Bank", 1.0, &VariableSpec::default()));
    }

    #[test]
    fn test_layer_notice() {
        let (mut emitter, sink) = emitter();
        let mut notice = LayerOscConfig {
            enabled: true,
            address: "/layer".to_string(),
            value: "2".to_string(),
            value_type: LayerValueType::Integer,
        };
        assert!(emitter.emit_layer_notice(&notice));
        notice.value = "yes".to_string();
        notice.value_type = LayerValueType::Boolean;
        assert!(emitter.emit_layer_notice(&notice));
        notice.value = "abc".to_string();
        notice.value_type = LayerValueType::Float;
        assert!(!emitter.emit_layer_notice(&notice));

        emitter.flush();
        assert_eq!(sink.sent_to("/layer"), vec![OscValue::Int(2), OscValue::Bool(true)]);
    }
}
