//! Deadline-based cancellable timers for the match state machine.
//!
//! Countdown and reveal phases are modeled as values polled from `tick(now)`
//! rather than detached callbacks, so cancellation can never observe a
//! disposed match. `cancel` is idempotent and a no-op after firing.

use std::time::{Duration, Instant};

/// A single pending delayed action.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    deadline: Option<Instant>,
}

impl ScheduledTask {
    pub fn idle() -> Self {
        Self { deadline: None }
    }

    /// Arm the task to fire `after` from `now`. Re-scheduling replaces any
    /// pending deadline.
    pub fn schedule(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    /// Disarm the task. Safe to call repeatedly or after the task has fired.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, `None` when not pending. Saturates at
    /// zero once the deadline has passed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Returns true exactly once, when polled at or after the deadline.
    /// Firing disarms the task.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_at_deadline() {
        let t0 = Instant::now();
        let mut task = ScheduledTask::idle();
        task.schedule(t0, Duration::from_secs(3));

        assert!(!task.fire(t0 + Duration::from_secs(2)));
        assert!(task.is_pending());
        assert!(task.fire(t0 + Duration::from_secs(3)));
        // Already fired; stays quiet.
        assert!(!task.fire(t0 + Duration::from_secs(10)));
        assert!(!task.is_pending());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut task = ScheduledTask::idle();
        task.schedule(t0, Duration::from_secs(1));

        task.cancel();
        task.cancel();
        assert!(!task.fire(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let t0 = Instant::now();
        let mut task = ScheduledTask::idle();
        task.schedule(t0, Duration::from_millis(10));
        assert!(task.fire(t0 + Duration::from_millis(10)));
        task.cancel();
        assert!(!task.is_pending());
    }

    #[test]
    fn test_remaining() {
        let t0 = Instant::now();
        let mut task = ScheduledTask::idle();
        assert_eq!(task.remaining(t0), None);

        task.schedule(t0, Duration::from_secs(3));
        assert_eq!(task.remaining(t0 + Duration::from_secs(1)), Some(Duration::from_secs(2)));
        // Past the deadline the remaining time saturates at zero.
        assert_eq!(task.remaining(t0 + Duration::from_secs(9)), Some(Duration::ZERO));
    }

    #[test]
    fn test_reschedule_replaces_deadline() {
        let t0 = Instant::now();
        let mut task = ScheduledTask::idle();
        task.schedule(t0, Duration::from_secs(1));
        task.schedule(t0, Duration::from_secs(5));
        assert!(!task.fire(t0 + Duration::from_secs(2)));
        assert!(task.fire(t0 + Duration::from_secs(5)));
    }
}
