//! Compiled mappings for the active layer
//!
//! Loose on-disk mapping rules are decoded once per rebuild into typed
//! [`Action`]s and split into two tables: continuous rules evaluated every
//! tick, and discrete rules looked up per input event. A rule that cannot be
//! decoded is logged and skipped without affecting the others.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AppConfig, LayerOscConfig, MappingConfig};
use crate::input::{classify, InputKind};
use crate::state::ChannelSpec;

#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("action '{0}' has no target")]
    MissingTarget(String),

    #[error("action '{action}' cannot target '{target_type}'")]
    UnsupportedTarget { action: String, target_type: String },

    #[error("action '{action}' requires parameter '{param}'")]
    MissingParam { action: String, param: &'static str },

    #[error("action '{0}' has no layer to switch to")]
    MissingLayer(String),
}

/// Decoded mapping action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Input position mapped onto the channel range
    Direct { invert: bool },
    /// Input integrated over time
    Rate { multiplier: f64, invert: bool },
    /// Fixed value (or the input itself) written to channels
    SetChannelFromInput { fixed: Option<f64> },
    /// Input value written to variables
    SetVariableFromInput { invert: bool },
    Toggle,
    Step { multiplier: f64 },
    ResetChannel,
    Increment { step: f64 },
    Decrement { step: f64 },
    SetVariable { value: f64 },
    ToggleVariable,
    SwitchLayer {
        layer: String,
        notify: Option<LayerOscConfig>,
    },
}

/// Channel numbers resolved at rebuild time for the per-tick path
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMeta {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub osc_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Channels(Vec<ChannelMeta>),
    Variables(Vec<String>),
    None,
}

/// One compiled input mapping
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub input: String,
    pub kind: InputKind,
    pub action: Action,
    pub targets: Targets,
}

impl MappingRule {
    /// Rules that fire on every event rather than on a press edge
    pub fn is_level_triggered(&self) -> bool {
        matches!(self.action, Action::SetVariableFromInput { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Channel,
    Variable,
}

/// Mapping tables for one layer
#[derive(Debug, Default)]
pub struct MappingCache {
    layer_id: String,
    continuous: Vec<MappingRule>,
    discrete: HashMap<String, MappingRule>,
}

impl MappingCache {
    /// Compile the mappings of `layer_id`.
    ///
    /// An unknown layer yields an empty cache.
    pub fn build(layer_id: &str, config: &AppConfig) -> Self {
        let mut cache = Self {
            layer_id: layer_id.to_string(),
            ..Self::default()
        };

        let Some(layer) = config.layers.get(layer_id) else {
            warn!("Layer '{}' not found in configuration, no mappings active", layer_id);
            return cache;
        };

        for (input, mapping) in &layer.input_mappings {
            match compile(input, mapping, config) {
                Ok(rule) => {
                    if is_continuous(&rule) {
                        cache.continuous.push(rule);
                    } else {
                        cache.discrete.insert(input.clone(), rule);
                    }
                }
                Err(e) => warn!("Skipping mapping for '{}' in layer '{}': {}", input, layer_id, e),
            }
        }

        // Stable order keeps per-tick evaluation deterministic
        cache.continuous.sort_by(|a, b| a.input.cmp(&b.input));

        debug!(
            "Mapping cache for layer '{}': {} continuous, {} discrete",
            layer_id,
            cache.continuous.len(),
            cache.discrete.len()
        );
        cache
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn continuous(&self) -> &[MappingRule] {
        &self.continuous
    }

    pub fn discrete(&self, input: &str) -> Option<&MappingRule> {
        self.discrete.get(input)
    }

    pub fn is_empty(&self) -> bool {
        self.continuous.is_empty() && self.discrete.is_empty()
    }
}

fn is_continuous(rule: &MappingRule) -> bool {
    match rule.action {
        Action::Direct { .. } | Action::Rate { .. } | Action::SetChannelFromInput { .. } => true,
        // Buttons feeding a variable update on each event, sticks every tick
        Action::SetVariableFromInput { .. } => rule.kind.is_analog(),
        _ => false,
    }
}

/// Decode one loose mapping into a typed rule
pub fn compile(input: &str, mapping: &MappingConfig, config: &AppConfig) -> Result<MappingRule, MappingError> {
    let action_name = mapping.action.trim().to_ascii_lowercase();
    let params = &mapping.params;
    let names = mapping.target_name.as_ref().map(|t| t.names()).unwrap_or_default();

    let target_kind = match mapping.target_type.as_deref().map(str::trim) {
        Some("osc_channel") => Some(TargetKind::Channel),
        Some("internal_variable") => Some(TargetKind::Variable),
        Some("") | None => None,
        Some(other) => {
            return Err(MappingError::UnsupportedTarget {
                action: action_name,
                target_type: other.to_string(),
            })
        }
    };

    let unsupported = |kind: TargetKind| MappingError::UnsupportedTarget {
        action: action_name.clone(),
        target_type: match kind {
            TargetKind::Channel => "osc_channel".to_string(),
            TargetKind::Variable => "internal_variable".to_string(),
        },
    };

    // (action, target kind it needs)
    let (action, kind) = match action_name.as_str() {
        "direct" => (Action::Direct { invert: params.invert }, TargetKind::Channel),
        "rate" => (
            Action::Rate {
                multiplier: params.rate_multiplier.unwrap_or(1.0),
                invert: params.invert,
            },
            TargetKind::Channel,
        ),
        "set_value_from_input" => match target_kind.unwrap_or(TargetKind::Channel) {
            TargetKind::Channel => (
                Action::SetChannelFromInput { fixed: params.value_to_set },
                TargetKind::Channel,
            ),
            TargetKind::Variable => (
                Action::SetVariableFromInput { invert: params.invert_input_value },
                TargetKind::Variable,
            ),
        },
        "toggle" => (Action::Toggle, TargetKind::Channel),
        "step_by_multiplier_on_trigger" => (
            Action::Step { multiplier: params.multiplier.unwrap_or(1.0) },
            target_kind.unwrap_or(TargetKind::Channel),
        ),
        "reset_channel_on_trigger" => (Action::ResetChannel, TargetKind::Channel),
        "increment" => (Action::Increment { step: params.step.unwrap_or(1.0) }, TargetKind::Variable),
        "decrement" => (Action::Decrement { step: params.step.unwrap_or(1.0) }, TargetKind::Variable),
        "set_variable" => match params.target_value {
            Some(value) => (Action::SetVariable { value }, TargetKind::Variable),
            None => {
                return Err(MappingError::MissingParam {
                    action: action_name.clone(),
                    param: "target_value",
                })
            }
        },
        "toggle_variable" => (Action::ToggleVariable, TargetKind::Variable),
        "change_layer" | "activate_layer" => {
            let layer = if action_name == "change_layer" {
                params.target_layer_id.as_deref().map(str::trim).unwrap_or_default().to_string()
            } else {
                names.first().cloned().unwrap_or_default()
            };
            if layer.is_empty() {
                return Err(MappingError::MissingLayer(action_name.clone()));
            }
            return Ok(MappingRule {
                input: input.to_string(),
                kind: classify(input),
                action: Action::SwitchLayer {
                    layer,
                    notify: params.on_change_osc.clone().filter(|osc| osc.enabled && !osc.address.trim().is_empty()),
                },
                targets: Targets::None,
            });
        }
        _ => return Err(MappingError::UnknownAction(mapping.action.clone())),
    };

    if let Some(declared) = target_kind {
        if declared != kind {
            return Err(unsupported(declared));
        }
    }
    if names.is_empty() {
        return Err(MappingError::MissingTarget(action_name));
    }

    let targets = match kind {
        TargetKind::Variable => Targets::Variables(names),
        TargetKind::Channel => {
            let metas: Vec<ChannelMeta> = names
                .into_iter()
                .filter_map(|name| match config.internal_channels.get(&name) {
                    Some(channel) => {
                        let spec = ChannelSpec::from_config(channel);
                        Some(ChannelMeta {
                            name,
                            min: spec.min,
                            max: spec.max,
                            osc_address: spec.osc_address,
                        })
                    }
                    None => {
                        warn!("Mapping for '{}' targets unknown channel '{}'", input, name);
                        None
                    }
                })
                .collect();
            if metas.is_empty() {
                return Err(MappingError::MissingTarget(action_name));
            }
            Targets::Channels(metas)
        }
    };

    Ok(MappingRule {
        input: input.to_string(),
        kind: classify(input),
        action,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
internal_channels:
  pan: { min_value: 0, max_value: 1, osc_address: /pan }
  zoom: { range: [0, 10] }
internal_variables:
  Bank: { initial_value: 1 }
layers:
  A:
    name: Main
    input_mappings:
      LEFT_STICK_X: { action: direct, target_type: osc_channel, target_name: pan }
      RIGHT_STICK_Y: { action: rate, target_name: [zoom, missing], params: { rate_multiplier: 2 } }
      A: { action: toggle, target_type: osc_channel, target_name: pan }
      B: { action: increment, target_type: internal_variable, target_name: Bank, params: { step: 2 } }
      X: { action: set_value_from_input, target_type: internal_variable, target_name: Bank }
      LEFT_TRIGGER: { action: set_value_from_input, target_type: internal_variable, target_name: Bank }
      Y: { action: change_layer, params: { target_layer_id: B } }
      START: { action: explode, target_name: pan }
      BACK: { action: toggle, target_type: internal_variable, target_name: Bank }
      GUIDE: { action: direct, target_name: nowhere }
  B:
    input_mappings: {}
active_layer: A
"#;

    fn cache() -> MappingCache {
        let config = AppConfig::parse(CONFIG).unwrap();
        MappingCache::build("A", &config)
    }

    #[test]
    fn test_tables_split_by_action() {
        let cache = cache();
        let continuous: Vec<&str> = cache.continuous().iter().map(|r| r.input.as_str()).collect();
        assert_eq!(continuous, vec!["LEFT_STICK_X", "LEFT_TRIGGER", "RIGHT_STICK_Y"]);

        assert!(matches!(cache.discrete("A").map(|r| &r.action), Some(Action::Toggle)));
        assert!(matches!(cache.discrete("B").map(|r| &r.action), Some(Action::Increment { step }) if *step == 2.0));
        assert!(matches!(
            cache.discrete("X").map(|r| &r.action),
            Some(Action::SetVariableFromInput { invert: false })
        ));
    }

    #[test]
    fn test_channel_meta_resolved_and_unknown_dropped() {
        let cache = cache();
        let rate = cache.continuous().iter().find(|r| r.input == "RIGHT_STICK_Y").unwrap();
        match &rate.targets {
            Targets::Channels(metas) => {
                assert_eq!(metas.len(), 1);
                assert_eq!((metas[0].min, metas[0].max), (0.0, 10.0));
            }
            other => panic!("unexpected targets {:?}", other),
        }
        let direct = cache.continuous().iter().find(|r| r.input == "LEFT_STICK_X").unwrap();
        assert!(matches!(&direct.targets, Targets::Channels(m) if m[0].osc_address.as_deref() == Some("/pan")));
    }

    #[test]
    fn test_bad_rules_skipped() {
        let cache = cache();
        assert!(cache.discrete("START").is_none());
        assert!(cache.discrete("BACK").is_none());
        assert!(cache.discrete("GUIDE").is_none());
        assert!(cache.continuous().iter().all(|r| r.input != "GUIDE"));
    }

    #[test]
    fn test_layer_rule() {
        let cache = cache();
        assert!(matches!(
            cache.discrete("Y").map(|r| &r.action),
            Some(Action::SwitchLayer { layer, notify: None }) if layer == "B"
        ));
    }

    #[test]
    fn test_unknown_layer_is_empty() {
        let config = AppConfig::parse(CONFIG).unwrap();
        let cache = MappingCache::build("Z", &config);
        assert!(cache.is_empty());
        assert_eq!(cache.layer_id(), "Z");
    }

    #[test]
    fn test_compile_errors() {
        let config = AppConfig::default();
        let mapping = MappingConfig {
            action: "toggle".to_string(),
            ..Default::default()
        };
        assert_eq!(
            compile("A", &mapping, &config),
            Err(MappingError::MissingTarget("toggle".to_string()))
        );

        let mapping = MappingConfig {
            action: "activate_layer".to_string(),
            ..Default::default()
        };
        assert_eq!(
            compile("A", &mapping, &config),
            Err(MappingError::MissingLayer("activate_layer".to_string()))
        );
    }
}
