//! Tracked deadlines. Every timer the coordinator, capture, or player sets
//! lives in one slot table so interrupts can clear it and a session teardown
//! leaves nothing armed.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Quiet period elapsed; finalize the buffered utterance.
    UtteranceFinalize,
    /// No assistant audio arrived after a voice-originated send.
    ResponseTimeout,
    /// Device-release grace after the last snippet of a message.
    ReleaseGrace,
    /// Gentle nudge after the session sat idle in voice mode.
    IdleReminder,
}

const TIMER_SLOTS: usize = 4;

impl TimerKind {
    const ALL: [TimerKind; TIMER_SLOTS] = [
        TimerKind::UtteranceFinalize,
        TimerKind::ResponseTimeout,
        TimerKind::ReleaseGrace,
        TimerKind::IdleReminder,
    ];

    fn slot(self) -> usize {
        match self {
            TimerKind::UtteranceFinalize => 0,
            TimerKind::ResponseTimeout => 1,
            TimerKind::ReleaseGrace => 2,
            TimerKind::IdleReminder => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimerKind::UtteranceFinalize => "utterance-finalize",
            TimerKind::ResponseTimeout => "response-timeout",
            TimerKind::ReleaseGrace => "release-grace",
            TimerKind::IdleReminder => "idle-reminder",
        }
    }
}

#[derive(Debug, Default)]
pub struct DeadlineSet {
    slots: [Option<Instant>; TIMER_SLOTS],
}

impl DeadlineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a deadline.
    pub fn set(&mut self, kind: TimerKind, at: Instant) {
        self.slots[kind.slot()] = Some(at);
    }

    pub fn clear(&mut self, kind: TimerKind) {
        self.slots[kind.slot()] = None;
    }

    pub fn clear_all(&mut self) {
        self.slots = [None; TIMER_SLOTS];
    }

    pub fn is_set(&self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.slots[kind.slot()]
    }

    /// Remove and return every deadline due at `now`, earliest first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerKind)> = Vec::new();
        for kind in TimerKind::ALL {
            if let Some(at) = self.slots[kind.slot()] {
                if at <= now {
                    self.slots[kind.slot()] = None;
                    due.push((at, kind));
                }
            }
        }
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn drain_due_returns_earliest_first_and_disarms() {
        let mut timers = DeadlineSet::new();
        let now = Instant::now();
        timers.set(TimerKind::ResponseTimeout, now + Duration::from_millis(5));
        timers.set(TimerKind::UtteranceFinalize, now + Duration::from_millis(1));
        timers.set(TimerKind::IdleReminder, now + Duration::from_secs(60));

        let fired = timers.drain_due(now + Duration::from_millis(10));
        assert_eq!(
            fired,
            vec![TimerKind::UtteranceFinalize, TimerKind::ResponseTimeout]
        );
        assert!(!timers.is_set(TimerKind::UtteranceFinalize));
        assert!(timers.is_set(TimerKind::IdleReminder));
    }

    #[test]
    fn clear_all_leaves_nothing_armed() {
        let mut timers = DeadlineSet::new();
        let now = Instant::now();
        for kind in TimerKind::ALL {
            timers.set(kind, now);
        }
        timers.clear_all();
        assert!(timers.drain_due(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn re_arming_replaces_the_previous_deadline() {
        let mut timers = DeadlineSet::new();
        let now = Instant::now();
        timers.set(TimerKind::ReleaseGrace, now + Duration::from_millis(1));
        timers.set(TimerKind::ReleaseGrace, now + Duration::from_secs(5));
        assert!(timers.drain_due(now + Duration::from_millis(2)).is_empty());
    }
}
