//! Mapping action semantics
//!
//! Pure functions over the [`ChannelStore`]: they perform the writes a rule
//! asks for and report which values actually changed. Emission, suppression
//! and layer switching are left to the engine.

use tracing::trace;

use super::mapping_cache::{Action, MappingRule, Targets};
use crate::config::LayerOscConfig;
use crate::input::InputKind;
use crate::state::ChannelStore;

/// Distance from `min` under which a toggled channel counts as "off"
const TOGGLE_EPSILON: f64 = 1e-6;

/// Layer actions need the input strictly above this value
const LAYER_SWITCH_THRESHOLD: f64 = 0.5;

/// Outcome of applying a rule
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Channel(String),
    Variable(String),
    SwitchLayer {
        layer: String,
        notify: Option<LayerOscConfig>,
    },
}

/// Map an input reading onto [0, 1] by input kind
fn unit_position(value: f64, kind: InputKind) -> f64 {
    match kind {
        InputKind::BipolarAnalog | InputKind::Motion => (value + 1.0) / 2.0,
        InputKind::UnipolarAnalog | InputKind::Digital => value,
    }
}

/// Apply a continuous rule for one tick
///
/// # Arguments
/// * `rule` - Compiled continuous rule
/// * `input_value` - Merged value of the rule's input
/// * `elapsed_s` - Seconds since the previous tick (used by `rate`)
/// * `store` - Channel and variable values
/// * `effects` - Receives one entry per value that changed
pub fn apply_continuous(
    rule: &MappingRule,
    input_value: f64,
    elapsed_s: f64,
    store: &mut ChannelStore,
    effects: &mut Vec<Effect>,
) {
    match (&rule.action, &rule.targets) {
        (Action::Direct { invert }, Targets::Channels(metas)) => {
            let mut position = unit_position(input_value, rule.kind);
            if *invert {
                position = 1.0 - position;
            }
            for meta in metas {
                let scaled = meta.min + position * (meta.max - meta.min);
                if store.set_channel_continuous(&meta.name, scaled) {
                    effects.push(Effect::Channel(meta.name.clone()));
                }
            }
        }
        (Action::Rate { multiplier, invert }, Targets::Channels(metas)) => {
            let signed = if *invert { -input_value } else { input_value };
            let delta = signed * multiplier * elapsed_s;
            if delta == 0.0 {
                return;
            }
            for meta in metas {
                let Some(current) = store.channel_value(&meta.name) else {
                    trace!("Rate target '{}' no longer exists", meta.name);
                    continue;
                };
                if store.set_channel_continuous(&meta.name, current + delta) {
                    effects.push(Effect::Channel(meta.name.clone()));
                }
            }
        }
        (Action::SetChannelFromInput { fixed }, Targets::Channels(metas)) => {
            let value = fixed.unwrap_or(input_value);
            for meta in metas {
                if store.set_channel_continuous(&meta.name, value) {
                    effects.push(Effect::Channel(meta.name.clone()));
                }
            }
        }
        (Action::SetVariableFromInput { invert }, Targets::Variables(names)) => {
            let value = if *invert && (0.0..=1.0).contains(&input_value) {
                1.0 - input_value
            } else {
                input_value
            };
            for name in names {
                if store.set_variable(name, value) {
                    effects.push(Effect::Variable(name.clone()));
                }
            }
        }
        (action, _) => trace!("Action {:?} is not continuous, ignored on tick", action),
    }
}

/// Apply a discrete rule for one input event.
///
/// The caller decides whether the event counts as a press; this function
/// only checks the stricter layer-switch threshold.
pub fn apply_discrete(rule: &MappingRule, value: f64, store: &mut ChannelStore, effects: &mut Vec<Effect>) {
    match (&rule.action, &rule.targets) {
        (Action::SwitchLayer { layer, notify }, _) => {
            if value > LAYER_SWITCH_THRESHOLD {
                effects.push(Effect::SwitchLayer {
                    layer: layer.clone(),
                    notify: notify.clone(),
                });
            }
        }
        (action, Targets::Channels(metas)) => {
            for meta in metas {
                let name = meta.name.as_str();
                let (Some(current), Some(spec)) = (store.channel_value(name), store.channel(name)) else {
                    continue;
                };
                let next = match action {
                    Action::Toggle => {
                        if (current - spec.min).abs() < TOGGLE_EPSILON {
                            spec.max
                        } else {
                            spec.min
                        }
                    }
                    Action::Step { multiplier } => current + multiplier,
                    Action::ResetChannel => spec.default,
                    _ => continue,
                };
                if store.set_channel(name, next) {
                    effects.push(Effect::Channel(meta.name.clone()));
                }
            }
        }
        (action, Targets::Variables(names)) => {
            for name in names {
                let Some(current) = store.variable_value(name) else {
                    continue;
                };
                let next = match action {
                    Action::Step { multiplier } => current + multiplier,
                    Action::Increment { step } => current + step,
                    Action::Decrement { step } => current - step,
                    Action::SetVariable { value } => *value,
                    Action::ToggleVariable => {
                        if current != 0.0 {
                            0.0
                        } else {
                            1.0
                        }
                    }
                    Action::SetVariableFromInput { invert } => {
                        if !*invert {
                            value
                        } else if (0.0..=1.0).contains(&value) {
                            1.0 - value
                        } else {
                            -value
                        }
                    }
                    _ => continue,
                };
                if store.set_variable(name, next) {
                    effects.push(Effect::Variable(name.clone()));
                }
            }
        }
        (action, Targets::None) => trace!("Action {:?} has no targets", action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::mapping_cache::ChannelMeta;

    fn store() -> ChannelStore {
        let config = AppConfig::parse(
            r#"
internal_channels:
  pan: { min_value: 0, max_value: 1, default: 0.5 }
  zoom: { min_value: 0, max_value: 10 }
  gain: { min_value: -10, max_value: 10, default: 2 }
internal_variables:
  Bank: { initial_value: 1, min_value: 1, max_value: 4 }
  Flag: { initial_value: 0 }
"#,
        )
        .unwrap();
        ChannelStore::from_config(&config)
    }

    fn channel_rule(action: Action, kind: InputKind, name: &str, min: f64, max: f64) -> MappingRule {
        MappingRule {
            input: "IN".to_string(),
            kind,
            action,
            targets: Targets::Channels(vec![ChannelMeta {
                name: name.to_string(),
                min,
                max,
                osc_address: None,
            }]),
        }
    }

    fn variable_rule(action: Action, name: &str) -> MappingRule {
        MappingRule {
            input: "IN".to_string(),
            kind: InputKind::Digital,
            action,
            targets: Targets::Variables(vec![name.to_string()]),
        }
    }

    #[test]
    fn test_direct_bipolar_scaling() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = channel_rule(Action::Direct { invert: false }, InputKind::BipolarAnalog, "pan", 0.0, 1.0);

        apply_continuous(&rule, -1.0, 0.01, &mut store, &mut effects);
        assert_eq!(store.channel_value("pan"), Some(0.0));
        assert_eq!(effects, vec![Effect::Channel("pan".to_string())]);

        effects.clear();
        apply_continuous(&rule, -1.0, 0.01, &mut store, &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_direct_invert_and_trigger() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = channel_rule(Action::Direct { invert: true }, InputKind::UnipolarAnalog, "zoom", 0.0, 10.0);
        apply_continuous(&rule, 0.25, 0.01, &mut store, &mut effects);
        assert_eq!(store.channel_value("zoom"), Some(7.5));
    }

    #[test]
    fn test_rate_integrates() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = channel_rule(
            Action::Rate { multiplier: 2.0, invert: false },
            InputKind::BipolarAnalog,
            "zoom",
            0.0,
            10.0,
        );
        apply_continuous(&rule, 0.5, 0.1, &mut store, &mut effects);
        let value = store.channel_value("zoom").unwrap_or_default();
        assert!((value - 0.1).abs() < 1e-12);

        let inverted = channel_rule(
            Action::Rate { multiplier: 2.0, invert: true },
            InputKind::BipolarAnalog,
            "zoom",
            0.0,
            10.0,
        );
        apply_continuous(&inverted, 0.5, 1.0, &mut store, &mut effects);
        assert_eq!(store.channel_value("zoom"), Some(0.0));
    }

    #[test]
    fn test_set_channel_from_input_fixed() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = channel_rule(
            Action::SetChannelFromInput { fixed: Some(20.0) },
            InputKind::UnipolarAnalog,
            "gain",
            -10.0,
            10.0,
        );
        apply_continuous(&rule, 0.3, 0.01, &mut store, &mut effects);
        assert_eq!(store.channel_value("gain"), Some(10.0));
    }

    #[test]
    fn test_continuous_variable_invert_only_in_unit_range() {
        let mut store = store();
        let mut effects = Vec::new();
        let mut rule = variable_rule(Action::SetVariableFromInput { invert: true }, "Flag");
        rule.kind = InputKind::BipolarAnalog;
        apply_continuous(&rule, 0.25, 0.01, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(0.75));
        apply_continuous(&rule, -0.5, 0.01, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(-0.5));
    }

    #[test]
    fn test_toggle_step_reset() {
        let mut store = store();
        let mut effects = Vec::new();

        let toggle = channel_rule(Action::Toggle, InputKind::Digital, "zoom", 0.0, 10.0);
        apply_discrete(&toggle, 1.0, &mut store, &mut effects);
        assert_eq!(store.channel_value("zoom"), Some(10.0));
        apply_discrete(&toggle, 1.0, &mut store, &mut effects);
        assert_eq!(store.channel_value("zoom"), Some(0.0));

        let step = channel_rule(Action::Step { multiplier: 3.0 }, InputKind::Digital, "gain", -10.0, 10.0);
        apply_discrete(&step, 1.0, &mut store, &mut effects);
        assert_eq!(store.channel_value("gain"), Some(5.0));
        for _ in 0..5 {
            apply_discrete(&step, 1.0, &mut store, &mut effects);
        }
        assert_eq!(store.channel_value("gain"), Some(10.0));

        let reset = channel_rule(Action::ResetChannel, InputKind::Digital, "gain", -10.0, 10.0);
        apply_discrete(&reset, 1.0, &mut store, &mut effects);
        assert_eq!(store.channel_value("gain"), Some(2.0));
    }

    #[test]
    fn test_variable_actions() {
        let mut store = store();
        let mut effects = Vec::new();

        apply_discrete(&variable_rule(Action::Increment { step: 2.0 }, "Bank"), 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Bank"), Some(3.0));
        apply_discrete(&variable_rule(Action::Increment { step: 2.0 }, "Bank"), 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Bank"), Some(4.0));
        apply_discrete(&variable_rule(Action::Decrement { step: 1.0 }, "Bank"), 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Bank"), Some(3.0));
        apply_discrete(&variable_rule(Action::SetVariable { value: 2.0 }, "Bank"), 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Bank"), Some(2.0));
        apply_discrete(&variable_rule(Action::Step { multiplier: 1.0 }, "Bank"), 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Bank"), Some(3.0));

        let toggle = variable_rule(Action::ToggleVariable, "Flag");
        apply_discrete(&toggle, 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(1.0));
        apply_discrete(&toggle, 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(0.0));
    }

    #[test]
    fn test_discrete_set_from_input_invert() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = variable_rule(Action::SetVariableFromInput { invert: true }, "Flag");
        apply_discrete(&rule, 1.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(0.0));
        apply_discrete(&rule, 3.0, &mut store, &mut effects);
        assert_eq!(store.variable_value("Flag"), Some(-3.0));
    }

    #[test]
    fn test_layer_switch_needs_strict_threshold() {
        let mut store = store();
        let mut effects = Vec::new();
        let rule = MappingRule {
            input: "Y".to_string(),
            kind: InputKind::Digital,
            action: Action::SwitchLayer { layer: "B".to_string(), notify: None },
            targets: Targets::None,
        };
        apply_discrete(&rule, 0.5, &mut store, &mut effects);
        assert!(effects.is_empty());
        apply_discrete(&rule, 1.0, &mut store, &mut effects);
        assert_eq!(effects, vec![Effect::SwitchLayer { layer: "B".to_string(), notify: None }]);
    }
}
