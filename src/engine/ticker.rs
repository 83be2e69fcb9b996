//! Fixed-rate driver for [`Engine::tick`]

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::Engine;

const STOP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Shortest accepted tick spacing
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Background task ticking the engine at the configured rate
pub struct TickLoop {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl TickLoop {
    /// Spawn the tick task
    ///
    /// # Arguments
    /// * `engine` - Engine to drive
    /// * `period` - Tick spacing, normally `ProcessingConfig::tick_interval()`;
    ///   never shorter than [`MIN_PERIOD`]
    pub fn start(engine: Engine, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => engine.tick(),
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Tick loop exited");
        });

        info!("⏱️ Tick loop started at {:.1} Hz", 1.0 / period.as_secs_f64());
        Self {
            stop_tx,
            handle: Some(handle),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the task and wait for it briefly
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("Tick loop did not stop within {:?}", STOP_TIMEOUT);
            }
        }
    }
}

impl Drop for TickLoop {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::osc::RecordingSink;
    use std::sync::Arc;

    fn engine(yaml: &str) -> (Engine, Arc<AppConfig>) {
        let config = Arc::new(AppConfig::parse(yaml).unwrap());
        (Engine::new(Arc::clone(&config), Box::new(RecordingSink::default())), config)
    }

    #[tokio::test]
    async fn test_absurd_rate_keeps_ticking() {
        let (engine, config) = engine("processing:\n  rate_hz: 1e300\n");
        let ticker = TickLoop::start(engine, config.processing.tick_interval());
        assert_eq!(ticker.period(), MIN_PERIOD);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ticker.handle.as_ref().is_some_and(|h| !h.is_finished()));
        ticker.stop().await;
    }

    #[tokio::test]
    async fn test_zero_period_is_raised() {
        let (engine, _) = engine("");
        let ticker = TickLoop::start(engine, Duration::ZERO);
        assert_eq!(ticker.period(), MIN_PERIOD);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ticker.handle.as_ref().is_some_and(|h| !h.is_finished()));
        ticker.stop().await;
    }

    #[tokio::test]
    async fn test_ticks_flush_the_sink() {
        let config = Arc::new(AppConfig::default());
        let sink = RecordingSink::default();
        let engine = Engine::new(config, Box::new(sink.clone()));
        let ticker = TickLoop::start(engine, Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(60)).await;
        ticker.stop().await;
        assert!(sink.flush_count() >= 2);
    }
}
