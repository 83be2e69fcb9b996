//! Per-channel emission cadence
//!
//! A changed value is sent right away when the channel has been quiet for a
//! full interval, otherwise it waits for the next cadence slot. After every
//! change the channel stays "active" for a short window during which its
//! current value is re-sent at a fixed cadence, even without new changes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct EmissionRecord {
    last_emit: Option<Instant>,
    activity_until: Option<Instant>,
    next_emit: Option<Instant>,
    /// A change is waiting for its slot
    pending: bool,
}

/// Rate gate plus burst cadence for every emitting channel
#[derive(Debug)]
pub struct EmissionScheduler {
    interval: Duration,
    activity_window: Duration,
    records: HashMap<String, EmissionRecord>,
}

impl EmissionScheduler {
    pub fn new(interval: Duration, activity_window: Duration) -> Self {
        Self {
            interval,
            activity_window,
            records: HashMap::new(),
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn set_activity_window(&mut self, window: Duration) {
        self.activity_window = window;
    }

    /// Register a value change
    ///
    /// # Returns
    /// `true` if the value should be emitted now; otherwise it is held as
    /// pending and released by [`due_bursts`](Self::due_bursts)
    pub fn consider_change(&mut self, name: &str, now: Instant) -> bool {
        let interval = self.interval;
        let record = self.records.entry(name.to_string()).or_default();
        record.activity_until = Some(now + self.activity_window);
        record.next_emit = Some(now + interval);

        let due = record
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= interval);
        if due {
            record.last_emit = Some(now);
            record.pending = false;
        } else {
            record.pending = true;
        }
        due
    }

    /// Hold an emission that could not go out now (e.g. suppressed)
    pub fn defer(&mut self, name: &str, now: Instant) {
        let interval = self.interval;
        let record = self.records.entry(name.to_string()).or_default();
        record.pending = true;
        if record.next_emit.map_or(true, |next| next <= now) {
            record.next_emit = Some(now + interval);
        }
    }

    /// Channels whose cadence slot has come, in name order.
    ///
    /// A channel is due while its activity window is open or a change is
    /// pending. The next slot advances by exactly one interval, and restarts
    /// from `now` only after falling a full interval behind.
    pub fn due_bursts(&mut self, now: Instant) -> Vec<String> {
        let interval = self.interval;
        let mut due = Vec::new();

        for (name, record) in self.records.iter_mut() {
            let active = record.activity_until.is_some_and(|until| until > now);
            if !active && !record.pending {
                continue;
            }
            let Some(next) = record.next_emit else {
                continue;
            };
            if now < next {
                continue;
            }

            let mut following = next + interval;
            if following <= now {
                following = now + interval;
            }
            record.next_emit = Some(following);
            record.last_emit = Some(now);
            record.pending = false;
            due.push(name.clone());
        }

        due.sort();
        due
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.records.get(name).is_some_and(|r| r.pending)
    }

    /// Drop records of channels that no longer exist
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.records.retain(|name, _| keep(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_change_emits_immediately() {
        let mut scheduler = EmissionScheduler::new(ms(100), ms(100));
        let t0 = Instant::now();
        assert!(scheduler.consider_change("pan", t0));
        assert!(!scheduler.consider_change("pan", t0 + ms(50)));
        assert!(scheduler.is_pending("pan"));
        assert!(scheduler.consider_change("pan", t0 + ms(100)));
        assert!(!scheduler.is_pending("pan"));
    }

    #[test]
    fn test_pending_released_after_window() {
        let mut scheduler = EmissionScheduler::new(ms(100), ms(20));
        let t0 = Instant::now();
        scheduler.consider_change("pan", t0);
        scheduler.consider_change("pan", t0 + ms(10));

        // Window closed at 30ms but the held change still goes out at 110ms
        assert!(scheduler.due_bursts(t0 + ms(60)).is_empty());
        assert_eq!(scheduler.due_bursts(t0 + ms(110)), vec!["pan".to_string()]);
        assert!(scheduler.due_bursts(t0 + ms(300)).is_empty());
    }

    #[test]
    fn test_burst_cadence_then_stop() {
        let mut scheduler = EmissionScheduler::new(ms(10), ms(50));
        let t0 = Instant::now();
        scheduler.consider_change("pan", t0);

        let mut bursts = 0;
        let mut t = t0;
        for _ in 0..100 {
            t += ms(1);
            bursts += scheduler.due_bursts(t).len();
        }
        // Slots at 10, 20, 30, 40ms; the window closes at 50ms
        assert_eq!(bursts, 4);
    }

    #[test]
    fn test_cadence_does_not_drift() {
        let mut scheduler = EmissionScheduler::new(ms(10), ms(1000));
        let t0 = Instant::now();
        scheduler.consider_change("pan", t0);
        // Late tick at 13ms: next slot stays at 20ms, not 23ms
        assert_eq!(scheduler.due_bursts(t0 + ms(13)).len(), 1);
        assert!(scheduler.due_bursts(t0 + ms(19)).is_empty());
        assert_eq!(scheduler.due_bursts(t0 + ms(20)).len(), 1);
    }

    #[test]
    fn test_defer_and_retain() {
        let mut scheduler = EmissionScheduler::new(ms(10), ms(0));
        let t0 = Instant::now();
        scheduler.defer("pan", t0);
        assert_eq!(scheduler.due_bursts(t0 + ms(10)), vec!["pan".to_string()]);

        scheduler.defer("gone", t0);
        scheduler.retain(|name| name != "gone");
        assert!(!scheduler.is_pending("gone"));
    }
}
