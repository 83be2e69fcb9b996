//! Multi-controller state merging
//!
//! Every controller keeps its own slot of latest values per generic input.
//! The merged view is recomputed from all slots on every update, so a
//! controller's contribution disappears the moment its slot is removed.

use std::collections::HashMap;
use tracing::debug;

use super::names::{classify, InputKind};

/// Latest raw values per controller plus the merged view
#[derive(Debug, Default)]
pub struct StateMerger {
    slots: HashMap<String, HashMap<String, f64>>,
    merged: HashMap<String, f64>,
}

impl StateMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller with an empty slot
    pub fn connect(&mut self, controller_id: &str) {
        self.slots.entry(controller_id.to_string()).or_default();
    }

    /// Drop a controller's slot and recompute
    ///
    /// # Returns
    /// `true` if the controller was known
    pub fn disconnect(&mut self, controller_id: &str) -> bool {
        let known = self.slots.remove(controller_id).is_some();
        if known {
            debug!("Removed input slot for controller {}", controller_id);
            self.recompute();
        }
        known
    }

    /// Store one controller's value for a generic input and recompute
    pub fn update(&mut self, controller_id: &str, generic_name: &str, value: f64) {
        self.slots
            .entry(controller_id.to_string())
            .or_default()
            .insert(generic_name.to_string(), value);
        self.recompute();
    }

    /// Merged value (0.0 when no controller reports the input)
    pub fn value(&self, generic_name: &str) -> f64 {
        self.merged.get(generic_name).copied().unwrap_or(0.0)
    }

    pub fn controller_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn recompute(&mut self) {
        let mut merged: HashMap<String, f64> = HashMap::new();

        for inputs in self.slots.values() {
            for (name, &value) in inputs {
                let entry = merged.entry(name.clone()).or_insert(0.0);
                match classify(name) {
                    InputKind::BipolarAnalog | InputKind::Motion => *entry += value,
                    InputKind::UnipolarAnalog => *entry = entry.max(value),
                    InputKind::Digital => {
                        if value >= 1.0 {
                            *entry = 1.0;
                        }
                    }
                }
            }
        }

        for (name, value) in merged.iter_mut() {
            *value = match classify(name) {
                InputKind::BipolarAnalog | InputKind::Motion => value.clamp(-1.0, 1.0),
                InputKind::UnipolarAnalog => value.clamp(0.0, 1.0),
                InputKind::Digital => *value,
            };
        }

        self.merged = merged;
    }
}
