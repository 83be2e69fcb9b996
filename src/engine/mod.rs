//! Input-to-OSC processing engine
//!
//! The [`Engine`] owns everything on the hot path behind one lock: merged
//! input state, channel and variable values, the compiled mapping cache, the
//! emission scheduler and the OSC sink. Device threads call
//! [`Engine::on_raw_input`] (discrete path); the [`TickLoop`] calls
//! [`Engine::tick`] at a fixed rate (continuous path, bursts, one flush).
//!
//! Value-change notifications are dispatched to subscribers after the lock
//! is released, so a listener may call back into the engine.

pub mod actions;
pub mod emit;
pub mod layers;
pub mod mapping_cache;
pub mod scheduler;
pub mod ticker;


use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::{AppConfig, LayerOscConfig};
use crate::input::{classify, normalize_name, shape, InputEvent, ShapeParams, StateMerger};
use crate::osc::OscSink;
use crate::state::ChannelStore;

use actions::{apply_continuous, apply_discrete, Effect};
use emit::{EmitOutcome, OscEmitter};
use layers::LayerState;
use mapping_cache::MappingCache;
use scheduler::EmissionScheduler;

pub use layers::LayerSwitchError;
pub use mapping_cache::MappingError;
pub use ticker::TickLoop;

/// Change notification for external observers
#[derive(Debug, Clone, PartialEq)]
pub enum ValueUpdate {
    Channel { name: String, value: f64 },
    Variable { name: String, value: f64 },
    LayerChanged { layer: String },
}

/// Listener for [`ValueUpdate`]s
pub type ValueListener = Arc<dyn Fn(&ValueUpdate) + Send + Sync>;

/// Connected controller as announced by its device layer
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerInfo {
    pub device_type: String,
    pub details: String,
}

/// Thread-safe handle to the processing engine
#[derive(Clone)]
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    listeners: Arc<RwLock<Vec<ValueListener>>>,
}

impl Engine {
    /// Create an engine for a configuration snapshot and an OSC sink
    pub fn new(config: Arc<AppConfig>, sink: Box<dyn OscSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::new(config, sink))),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a value-change listener
    pub fn subscribe(&self, listener: ValueListener) {
        self.listeners.write().push(listener);
    }

    fn notify(&self, updates: Vec<ValueUpdate>) {
        if updates.is_empty() {
            return;
        }
        let listeners = self.listeners.read();
        for update in &updates {
            for listener in listeners.iter() {
                listener(update);
            }
        }
    }

    /// Raw input from a device layer (device-specific name, unshaped value)
    pub fn on_raw_input(&self, controller_id: &str, raw_name: &str, value: f64) {
        self.on_raw_input_at(controller_id, raw_name, value, Instant::now());
    }

    pub fn on_raw_input_at(&self, controller_id: &str, raw_name: &str, value: f64, now: Instant) {
        let updates = self.state.lock().handle_raw(controller_id, raw_name, value, now);
        self.notify(updates);
    }

    pub fn on_controller_connect(&self, controller_id: &str, device_type: &str, details: &str) {
        info!("🎮 Controller connected: {} ({}, {})", controller_id, device_type, details);
        let mut state = self.state.lock();
        state.merger.connect(controller_id);
        state.controllers.insert(
            controller_id.to_string(),
            ControllerInfo {
                device_type: device_type.to_string(),
                details: details.to_string(),
            },
        );
    }

    pub fn on_controller_disconnect(&self, controller_id: &str) {
        info!("Controller disconnected: {}", controller_id);
        let mut state = self.state.lock();
        state.merger.disconnect(controller_id);
        state.controllers.remove(controller_id);
        state.held.retain(|(controller, _)| controller != controller_id);
    }

    /// Dispatch an event from a device provider
    pub fn on_input_event(&self, event: &InputEvent) {
        match event {
            InputEvent::Connected {
                controller_id,
                device_type,
                details,
            } => self.on_controller_connect(controller_id, device_type, details),
            InputEvent::Disconnected { controller_id } => self.on_controller_disconnect(controller_id),
            InputEvent::Raw {
                controller_id,
                name,
                value,
            } => self.on_raw_input(controller_id, name, *value),
        }
    }

    /// Run one scheduler tick
    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&self, now: Instant) {
        let updates = self.state.lock().tick(now);
        self.notify(updates);
    }

    /// Swap in a new configuration snapshot.
    ///
    /// Surviving channels keep their (reclamped) values and the current layer
    /// stays active if it still exists.
    pub fn reload(&self, config: Arc<AppConfig>) {
        self.state.lock().reload(config);
    }

    pub fn replace_sink(&self, sink: Box<dyn OscSink>) {
        self.state.lock().emitter.replace_sink(sink);
    }

    /// Switch layers from outside the mapping system (no OSC notice)
    ///
    /// # Returns
    /// `Ok(true)` if the layer changed, `Ok(false)` if it was already active
    pub fn set_active_layer(&self, layer_id: &str) -> Result<bool, LayerSwitchError> {
        let mut updates = Vec::new();
        let result = self.state.lock().switch_layer(layer_id, None, &mut updates);
        self.notify(updates);
        result
    }

    /// External variable write (e.g. from a UI)
    ///
    /// # Returns
    /// `true` if the variable exists and its value changed
    pub fn set_variable_value(&self, name: &str, value: f64) -> bool {
        self.set_variable_value_at(name, value, Instant::now())
    }

    pub fn set_variable_value_at(&self, name: &str, value: f64, now: Instant) -> bool {
        let mut updates = Vec::new();
        let changed = {
            let mut state = self.state.lock();
            let changed = state.store.set_variable(name, value);
            if changed {
                state.apply_effects(vec![Effect::Variable(name.to_string())], now, true, &mut updates);
            }
            changed
        };
        self.notify(updates);
        changed
    }

    pub fn channel_value(&self, name: &str) -> Option<f64> {
        self.state.lock().store.channel_value(name)
    }

    pub fn variable_value(&self, name: &str) -> Option<f64> {
        self.state.lock().store.variable_value(name)
    }

    pub fn channel_values(&self) -> HashMap<String, f64> {
        self.state.lock().store.channel_values()
    }

    pub fn variable_values(&self) -> HashMap<String, f64> {
        self.state.lock().store.variable_values()
    }

    pub fn active_layer(&self) -> String {
        self.state.lock().layers.active().to_string()
    }

    /// Merged value of a generic input (0.0 when unreported)
    pub fn merged_input(&self, generic_name: &str) -> f64 {
        self.state.lock().merger.value(generic_name)
    }

    pub fn controllers(&self) -> HashMap<String, ControllerInfo> {
        self.state.lock().controllers.clone()
    }
}

/// Everything guarded by the engine lock
struct EngineState {
    config: Arc<AppConfig>,
    shape: ShapeParams,
    press_threshold: f64,
    variable_suppression: Duration,
    merger: StateMerger,
    store: ChannelStore,
    cache: Arc<MappingCache>,
    layers: LayerState,
    scheduler: EmissionScheduler,
    emitter: OscEmitter,
    controllers: HashMap<String, ControllerInfo>,
    /// (controller, generic input) pairs currently above the press threshold
    held: HashSet<(String, String)>,
    last_tick: Option<Instant>,
}

impl EngineState {
    fn new(config: Arc<AppConfig>, sink: Box<dyn OscSink>) -> Self {
        let layers = LayerState::new(&config);
        let cache = Arc::new(MappingCache::build(layers.active(), &config));
        Self {
            shape: ShapeParams::from(&config.input_settings),
            press_threshold: config.input_settings.button_press_threshold,
            variable_suppression: config.processing.variable_suppression(),
            merger: StateMerger::new(),
            store: ChannelStore::from_config(&config),
            cache,
            layers,
            scheduler: EmissionScheduler::new(
                config.osc_settings.emit_interval(),
                config.processing.activity_window(),
            ),
            emitter: OscEmitter::new(sink),
            controllers: HashMap::new(),
            held: HashSet::new(),
            last_tick: None,
            config,
        }
    }

    fn handle_raw(&mut self, controller_id: &str, raw_name: &str, value: f64, now: Instant) -> Vec<ValueUpdate> {
        let mut updates = Vec::new();
        if !value.is_finite() {
            debug!("Ignoring non-finite value for {} on {}", raw_name, controller_id);
            return updates;
        }

        let generic = normalize_name(raw_name);
        let kind = classify(&generic);
        let shaped = shape(value, kind, &self.shape);

        if !self.controllers.contains_key(controller_id) {
            self.controllers.insert(
                controller_id.to_string(),
                ControllerInfo {
                    device_type: "unknown".to_string(),
                    details: String::new(),
                },
            );
        }
        self.merger.update(controller_id, &generic, shaped);

        let key = (controller_id.to_string(), generic);
        let pressed = shaped >= self.press_threshold;
        let edge = if pressed {
            self.held.insert(key.clone())
        } else {
            self.held.remove(&key);
            false
        };

        let cache = Arc::clone(&self.cache);
        let Some(rule) = cache.discrete(&key.1) else {
            return updates;
        };
        if !edge && !rule.is_level_triggered() {
            return updates;
        }

        trace!("Discrete {} = {} on layer '{}'", key.1, shaped, cache.layer_id());
        let mut effects = Vec::new();
        apply_discrete(rule, shaped, &mut self.store, &mut effects);
        self.apply_effects(effects, now, true, &mut updates);
        updates
    }

    fn tick(&mut self, now: Instant) -> Vec<ValueUpdate> {
        let elapsed_s = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64());
        self.last_tick = Some(now);

        let mut updates = Vec::new();
        let cache = Arc::clone(&self.cache);
        let mut effects = Vec::new();
        for rule in cache.continuous() {
            let input_value = self.merger.value(&rule.input);
            apply_continuous(rule, input_value, elapsed_s, &mut self.store, &mut effects);
        }
        self.apply_effects(effects, now, false, &mut updates);

        for name in self.scheduler.due_bursts(now) {
            self.emit_channel(&name, now);
        }

        self.emitter.flush();
        updates
    }

    /// Publish, schedule and emit the consequences of applied actions
    ///
    /// `discrete` marks changes that happen at a single instant; only those
    /// open the variable suppression window.
    fn apply_effects(&mut self, effects: Vec<Effect>, now: Instant, discrete: bool, updates: &mut Vec<ValueUpdate>) {
        for effect in effects {
            match effect {
                Effect::Channel(name) => {
                    let Some(value) = self.store.channel_value(&name) else {
                        continue;
                    };
                    if self.scheduler.consider_change(&name, now) {
                        self.emit_channel(&name, now);
                    }
                    updates.push(ValueUpdate::Channel { name, value });
                }
                Effect::Variable(name) => {
                    let Some(value) = self.store.variable_value(&name) else {
                        continue;
                    };
                    debug!("Variable '{}' -> {}", name, value);
                    if discrete {
                        self.emitter.suppress_variable_dependents(now, self.variable_suppression);
                    }
                    if let Some(spec) = self.store.variable(&name) {
                        self.emitter.emit_variable(&name, value, spec);
                    }
                    updates.push(ValueUpdate::Variable { name, value });
                }
                Effect::SwitchLayer { layer, notify } => {
                    // Rejections are logged inside
                    let _ = self.switch_layer(&layer, notify.as_ref(), updates);
                }
            }
        }
    }

    /// Queue one channel; a suppressed channel is retried at its next slot
    fn emit_channel(&mut self, name: &str, now: Instant) {
        let (Some(spec), Some(value)) = (self.store.channel(name), self.store.channel_value(name)) else {
            return;
        };
        let store = &self.store;
        let outcome = self
            .emitter
            .emit_channel(spec, value, |var| store.variable_value(var), now);
        if outcome == EmitOutcome::Suppressed {
            self.scheduler.defer(name, now);
        }
    }

    fn switch_layer(
        &mut self,
        target: &str,
        notify: Option<&LayerOscConfig>,
        updates: &mut Vec<ValueUpdate>,
    ) -> Result<bool, LayerSwitchError> {
        let previous = self.layers.active().to_string();
        match self.layers.request_switch(target, &self.config) {
            Ok(true) => {
                self.cache = Arc::new(MappingCache::build(self.layers.active(), &self.config));
                info!("🔀 Active layer changed from '{}' to '{}'", previous, self.layers.active());
                if let Some(notice) = notify {
                    self.emitter.emit_layer_notice(notice);
                }
                updates.push(ValueUpdate::LayerChanged {
                    layer: self.layers.active().to_string(),
                });
                Ok(true)
            }
            Ok(false) => {
                debug!("Layer '{}' is already active", target);
                Ok(false)
            }
            Err(e) => {
                warn!("Layer switch rejected: {}", e);
                Err(e)
            }
        }
    }

    fn reload(&mut self, config: Arc<AppConfig>) {
        self.shape = ShapeParams::from(&config.input_settings);
        self.press_threshold = config.input_settings.button_press_threshold;
        self.variable_suppression = config.processing.variable_suppression();

        self.store.reinitialize(&config);
        let store = &self.store;
        self.scheduler.retain(|name| store.has_channel(name));
        self.scheduler.set_interval(config.osc_settings.emit_interval());
        self.scheduler.set_activity_window(config.processing.activity_window());

        self.layers.reconcile(&config);
        self.cache = Arc::new(MappingCache::build(self.layers.active(), &config));
        self.config = config;

        info!(
            "✅ Engine reloaded: layer '{}', {} continuous mapping(s)",
            self.layers.active(),
            self.cache.continuous().len()
        );
    }
}
