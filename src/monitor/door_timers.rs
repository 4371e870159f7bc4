use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// When each currently-open door was opened, keyed by fridge id.
///
/// Lives only in memory: it is filled by door transitions seen by this
/// process and is not rebuilt from `door_events` on restart, so a door that
/// was already open at startup never triggers a door-open alert.
#[derive(Debug, Clone, Default)]
pub struct DoorTimers {
    opened_at: HashMap<i64, DateTime<Utc>>,
}

impl DoorTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer for `fridge_id`.
    pub fn opened(&mut self, fridge_id: i64, at: DateTime<Utc>) {
        self.opened_at.insert(fridge_id, at);
    }

    pub fn closed(&mut self, fridge_id: i64) {
        self.opened_at.remove(&fridge_id);
    }

    pub fn open_since(&self, fridge_id: i64) -> Option<DateTime<Utc>> {
        self.opened_at.get(&fridge_id).copied()
    }

    pub fn len(&self) -> usize {
        self.opened_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opened_at.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn empty_timers_track_nothing() {
        let timers = DoorTimers::new();
        assert!(timers.is_empty());
        assert!(timers.open_since(1).is_none());
    }

    #[test]
    fn open_then_close_clears_timer() {
        let mut timers = DoorTimers::new();
        let t0 = Utc::now();
        timers.opened(1, t0);
        assert_eq!(timers.open_since(1), Some(t0));

        timers.closed(1);
        assert!(timers.open_since(1).is_none());
    }

    #[test]
    fn reopening_restarts_the_timer() {
        let mut timers = DoorTimers::new();
        let t0 = Utc::now();
        timers.opened(1, t0);
        timers.opened(1, t0 + Duration::seconds(5));
        assert_eq!(timers.open_since(1), Some(t0 + Duration::seconds(5)));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn fridges_are_tracked_separately() {
        let mut timers = DoorTimers::new();
        let t0 = Utc::now();
        timers.opened(1, t0);
        timers.opened(2, t0);
        timers.closed(1);
        assert!(timers.open_since(1).is_none());
        assert_eq!(timers.open_since(2), Some(t0));
    }

    #[test]
    fn closing_an_untracked_door_is_a_no_op() {
        let mut timers = DoorTimers::new();
        timers.closed(42);
        assert!(timers.is_empty());
    }
}
