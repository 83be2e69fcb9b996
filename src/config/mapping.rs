//! Layer and input-mapping configuration as it appears on disk.
//!
//! These types stay deliberately loose (action and target kind are plain
//! strings) so that one bad rule never prevents the rest of the file from
//! loading. They are decoded into typed rules when the mapping cache is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::lenient;

/// A named mapping context
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: String,
    /// Generic input id -> mapping rule
    #[serde(default)]
    pub input_mappings: HashMap<String, MappingConfig>,
}

/// One input mapping rule
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<TargetName>,
    #[serde(default)]
    pub params: MappingParams,
}

/// Target name (single or list)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TargetName {
    One(String),
    Many(Vec<String>),
}

impl TargetName {
    /// Non-empty target names in declaration order
    pub fn names(&self) -> Vec<String> {
        let all: Vec<&String> = match self {
            TargetName::One(name) => vec![name],
            TargetName::Many(names) => names.iter().collect(),
        };
        all.into_iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Action-specific parameters (all optional)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingParams {
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub rate_multiplier: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub value_to_set: Option<f64>,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub invert_input_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_layer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_change_osc: Option<LayerOscConfig>,
}

/// One-shot OSC message sent when a layer switch succeeds
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LayerOscConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_layer_osc_value")]
    pub value: String,
    #[serde(default)]
    pub value_type: LayerValueType,
}

/// Value type for layer notifications
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LayerValueType {
    #[default]
    Float,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "bool")]
    Boolean,
    String,
}

fn default_layer_osc_value() -> String {
    "1".to_string()
}

/// Layers created for a fresh or empty configuration
pub fn default_layers() -> HashMap<String, LayerConfig> {
    ["A", "B", "C", "D"]
        .into_iter()
        .map(|id| {
            (
                id.to_string(),
                LayerConfig {
                    name: format!("Layer {}", id),
                    input_mappings: HashMap::new(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_name_forms() {
        let one: TargetName = serde_yaml::from_str("pan").unwrap();
        assert_eq!(one.names(), vec!["pan".to_string()]);

        let many: TargetName = serde_yaml::from_str("[pan, '', tilt]").unwrap();
        assert_eq!(many.names(), vec!["pan".to_string(), "tilt".to_string()]);
    }

    #[test]
    fn test_mapping_params_are_lenient() {
        let yaml = r#"
action: rate
target_type: osc_channel
target_name: [pan]
params:
  rate_multiplier: "2.5"
  invert: true
"#;
        let mapping: MappingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(mapping.action, "rate");
        assert_eq!(mapping.params.rate_multiplier, Some(2.5));
        assert!(mapping.params.invert);
        assert_eq!(mapping.params.multiplier, None);
    }

    #[test]
    fn test_layer_osc_defaults_and_aliases() {
        let cfg: LayerOscConfig =
            serde_yaml::from_str("enabled: true\naddress: /layer/b\nvalue_type: int").unwrap();
        assert_eq!(cfg.value, "1");
        assert_eq!(cfg.value_type, LayerValueType::Integer);
    }
}
