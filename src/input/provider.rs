//! gilrs-backed gamepad provider
//!
//! Polls gilrs on a dedicated thread at the configured polling rate and
//! forwards [`InputEvent`]s to async listeners. gilrs button and axis names
//! are translated to the XInput vocabulary so downstream normalization treats
//! every controller family alike.

use anyhow::Result;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::InputEvent;

/// Callback type for input events
pub type EventCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Running gilrs provider
pub struct GamepadProvider {
    event_listeners: Arc<RwLock<Vec<EventCallback>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl GamepadProvider {
    /// Start polling gilrs in a background thread
    ///
    /// # Arguments
    /// * `polling_rate_hz` - Poll loop frequency, clamped to [1, 1000]
    pub async fn start(polling_rate_hz: f64) -> Result<Self> {
        let event_listeners = Arc::new(RwLock::new(Vec::<EventCallback>::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<InputEvent>();

        let hz = if polling_rate_hz.is_finite() { polling_rate_hz.clamp(1.0, 1000.0) } else { 120.0 };
        let loop_interval = Duration::from_secs_f64(1.0 / hz);

        std::thread::Builder::new()
            .name("gilrs-poll".to_string())
            .spawn(move || Self::event_loop_blocking(loop_interval, event_tx, shutdown_rx))?;

        let listeners_clone = event_listeners.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let listeners = listeners_clone.read().await;
                for callback in listeners.iter() {
                    callback(event.clone());
                }
            }
        });

        Ok(Self {
            event_listeners,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Subscribe to input events
    pub async fn subscribe(&self, callback: EventCallback) {
        self.event_listeners.write().await.push(callback);
    }

    fn event_loop_blocking(
        loop_interval: Duration,
        event_tx: mpsc::UnboundedSender<InputEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                warn!("Failed to initialize gilrs: {:?}", e);
                return;
            },
        };
        let mut state = ProviderState::new(gilrs);

        for event in state.initial_scan() {
            if event_tx.send(event).is_err() {
                return;
            }
        }

        let mut last_loop = Instant::now();
        loop {
            match shutdown_rx.try_recv() {
                Ok(_) | Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("Gamepad provider shutting down");
                    break;
                },
                Err(mpsc::error::TryRecvError::Empty) => {},
            }

            for event in state.poll() {
                if event_tx.send(event).is_err() {
                    warn!("Event receiver dropped, shutting down gamepad loop");
                    return;
                }
            }

            let elapsed = last_loop.elapsed();
            if elapsed < loop_interval {
                std::thread::sleep(loop_interval - elapsed);
            }
            last_loop = Instant::now();
        }
    }

    /// Stop the polling thread
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
            debug!("Gamepad provider shutdown requested");
        }
    }
}

impl Drop for GamepadProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

/// State owned by the polling thread
struct ProviderState {
    gilrs: Gilrs,
    connected: HashMap<GamepadId, String>,
}

impl ProviderState {
    fn new(gilrs: Gilrs) -> Self {
        Self {
            gilrs,
            connected: HashMap::new(),
        }
    }

    fn controller_id(id: GamepadId) -> String {
        format!("gilrs_{}", usize::from(id))
    }

    /// Announce pads that were plugged in before startup
    fn initial_scan(&mut self) -> Vec<InputEvent> {
        let pads: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, pad)| (id, pad.name().to_string()))
            .collect();
        pads.into_iter().map(|(id, name)| self.on_connected(id, name)).collect()
    }

    fn on_connected(&mut self, id: GamepadId, name: String) -> InputEvent {
        let controller_id = Self::controller_id(id);
        info!("🎮 Gamepad connected: {} ({})", name, controller_id);
        self.connected.insert(id, controller_id.clone());
        InputEvent::Connected {
            controller_id,
            device_type: "gilrs".to_string(),
            details: name,
        }
    }

    fn poll(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    if !self.connected.contains_key(&id) {
                        let name = self.gilrs.gamepad(id).name().to_string();
                        events.push(self.on_connected(id, name));
                    }
                },
                EventType::Disconnected => {
                    if let Some(controller_id) = self.connected.remove(&id) {
                        info!("Gamepad disconnected: {}", controller_id);
                        events.push(InputEvent::Disconnected { controller_id });
                    }
                },
                other => events.extend(convert_event(&Self::controller_id(id), other)),
            }
        }
        events
    }
}

/// Translate one gilrs event into raw input events
fn convert_event(controller_id: &str, event: EventType) -> Vec<InputEvent> {
    match event {
        EventType::ButtonPressed(button, _) => {
            button_name(button).map(|n| InputEvent::raw(controller_id, n, 1.0)).into_iter().collect()
        },
        EventType::ButtonReleased(button, _) => {
            button_name(button).map(|n| InputEvent::raw(controller_id, n, 0.0)).into_iter().collect()
        },
        // Analog triggers arrive as button value changes on most backends
        EventType::ButtonChanged(button, value, _) => match analog_trigger_name(button) {
            Some(name) => vec![InputEvent::raw(controller_id, name, (value as f64).clamp(0.0, 1.0))],
            None => Vec::new(),
        },
        EventType::AxisChanged(axis, value, _) => match axis_name(axis) {
            Some((name, unipolar)) => {
                let v = value as f64;
                let v = if unipolar { ((v + 1.0) / 2.0).clamp(0.0, 1.0) } else { v.clamp(-1.0, 1.0) };
                vec![InputEvent::raw(controller_id, name, v)]
            },
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn button_name(button: Button) -> Option<&'static str> {
    Some(match button {
        Button::South => "A",
        Button::East => "B",
        Button::West => "X",
        Button::North => "Y",
        Button::LeftTrigger => "LEFT_SHOULDER",
        Button::RightTrigger => "RIGHT_SHOULDER",
        Button::LeftTrigger2 => "LEFT_TRIGGER_PRESS",
        Button::RightTrigger2 => "RIGHT_TRIGGER_PRESS",
        Button::Select => "BACK",
        Button::Start => "START",
        Button::Mode => "GUIDE",
        Button::LeftThumb => "LEFT_THUMB",
        Button::RightThumb => "RIGHT_THUMB",
        Button::DPadUp => "DPAD_UP",
        Button::DPadDown => "DPAD_DOWN",
        Button::DPadLeft => "DPAD_LEFT",
        Button::DPadRight => "DPAD_RIGHT",
        _ => return None,
    })
}

fn analog_trigger_name(button: Button) -> Option<&'static str> {
    match button {
        Button::LeftTrigger2 => Some("LEFT_TRIGGER"),
        Button::RightTrigger2 => Some("RIGHT_TRIGGER"),
        _ => None,
    }
}

/// Axis name and whether gilrs reports it in [-1, 1] for a [0, 1] input
fn axis_name(axis: Axis) -> Option<(&'static str, bool)> {
    match axis {
        Axis::LeftStickX => Some(("LEFT_STICK_X", false)),
        Axis::LeftStickY => Some(("LEFT_STICK_Y", false)),
        Axis::RightStickX => Some(("RIGHT_STICK_X", false)),
        Axis::RightStickY => Some(("RIGHT_STICK_Y", false)),
        Axis::LeftZ => Some(("LEFT_TRIGGER", true)),
        Axis::RightZ => Some(("RIGHT_TRIGGER", true)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_buttons_use_position() {
        assert_eq!(button_name(Button::South), Some("A"));
        assert_eq!(button_name(Button::North), Some("Y"));
        assert_eq!(button_name(Button::LeftTrigger), Some("LEFT_SHOULDER"));
        assert_eq!(button_name(Button::Unknown), None);
    }

    #[test]
    fn test_axis_names() {
        assert_eq!(axis_name(Axis::LeftZ), Some(("LEFT_TRIGGER", true)));
        assert_eq!(axis_name(Axis::RightStickY), Some(("RIGHT_STICK_Y", false)));
        assert_eq!(axis_name(Axis::DPadX), None);
        assert_eq!(analog_trigger_name(Button::RightTrigger2), Some("RIGHT_TRIGGER"));
        assert_eq!(analog_trigger_name(Button::South), None);
    }
}
