//! Slot-keyed scheduling of transitions.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::transition::{ScheduleError, Transition};

/// Drives all active [`Transition`]s, one per logical slot.
///
/// Starting a slot that already holds an active transition cancels the
/// previous instance cooperatively: it simply stops being ticked, its end
/// callback never fires, and any partially-applied progress effect is left
/// at its last value. Callers that need monotonic accumulation (stun
/// re-trigger) read [`remaining`](Self::remaining) before rescheduling and
/// fold it into the new duration themselves.
pub struct TransitionScheduler<K> {
    active: HashMap<K, Transition>,
}

impl<K: Eq + Hash + Clone> TransitionScheduler<K> {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
        }
    }

    /// Starts a transition in `slot`, cancelling any active instance there.
    ///
    /// The start callback and the initial progress report fire immediately.
    /// Fails with [`ScheduleError::NoCallbacks`] (and starts nothing) when
    /// the transition has neither a progress nor an end callback.
    pub fn start(&mut self, slot: K, mut transition: Transition) -> Result<(), ScheduleError> {
        if !transition.has_observable_effect() {
            return Err(ScheduleError::NoCallbacks);
        }
        transition.begin();
        if self.active.insert(slot, transition).is_some() {
            tracing::trace!("transition slot restarted, previous instance cancelled");
        }
        Ok(())
    }

    /// Cancels the transition in `slot`, if any. The end callback of a
    /// cancelled transition never fires.
    pub fn cancel(&mut self, slot: &K) -> bool {
        self.active.remove(slot).is_some()
    }

    /// Advances every active transition by the real elapsed time `dt`.
    /// Completed transitions fire their final callbacks and are removed.
    /// Relative order of callbacks across different slots within one tick
    /// is unspecified.
    pub fn tick(&mut self, dt: Duration) {
        let mut completed = Vec::new();
        for (slot, transition) in self.active.iter_mut() {
            if transition.advance(dt) {
                completed.push(slot.clone());
            }
        }
        for slot in completed {
            self.active.remove(&slot);
        }
    }

    /// Returns `true` while `slot` holds an unfinished transition.
    pub fn is_active(&self, slot: &K) -> bool {
        self.active.contains_key(slot)
    }

    /// Completion ratio of the transition in `slot`, in `[0, 1]`.
    pub fn progress(&self, slot: &K) -> Option<f32> {
        self.active.get(slot).map(Transition::ratio)
    }

    /// Time left on the transition in `slot`.
    pub fn remaining(&self, slot: &K) -> Option<Duration> {
        self.active.get(slot).map(Transition::remaining)
    }

    /// Number of active transitions.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl<K: Eq + Hash + Clone> Default for TransitionScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_end_only_transition_fires_exactly_once_after_duration() {
        let mut scheduler = TransitionScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let start_probe = Rc::clone(&log);
        let end_probe = Rc::clone(&log);

        scheduler
            .start(
                "cooldown",
                Transition::new(Duration::from_millis(300))
                    .starting_at(false)
                    .on_start(move |v| start_probe.borrow_mut().push(("start", v)))
                    .on_end(move |v| end_probe.borrow_mut().push(("end", v))),
            )
            .unwrap();

        // Ticks summing to less than the duration: end must not fire.
        scheduler.tick(Duration::from_millis(100));
        scheduler.tick(Duration::from_millis(100));
        assert_eq!(*log.borrow(), vec![("start", false)]);
        assert!(scheduler.is_active(&"cooldown"));

        // Crossing the duration fires end(!initial) once, then the slot is
        // free and further ticks do nothing.
        scheduler.tick(Duration::from_millis(150));
        scheduler.tick(Duration::from_millis(150));
        assert_eq!(*log.borrow(), vec![("start", false), ("end", true)]);
        assert!(!scheduler.is_active(&"cooldown"));
    }

    #[test]
    fn test_restarting_a_slot_cancels_the_first_instance() {
        let mut scheduler = TransitionScheduler::new();
        let ends = Rc::new(RefCell::new(Vec::new()));

        let first_probe = Rc::clone(&ends);
        scheduler
            .start(
                "stun",
                Transition::new(Duration::from_millis(100))
                    .on_end(move |_| first_probe.borrow_mut().push("first")),
            )
            .unwrap();
        scheduler.tick(Duration::from_millis(60));

        let second_probe = Rc::clone(&ends);
        scheduler
            .start(
                "stun",
                Transition::new(Duration::from_millis(100))
                    .on_end(move |_| second_probe.borrow_mut().push("second")),
            )
            .unwrap();

        // 60 ms in, the first instance would have completed here, but it
        // was cancelled, so only the second end ever fires.
        scheduler.tick(Duration::from_millis(60));
        scheduler.tick(Duration::from_millis(60));
        assert_eq!(*ends.borrow(), vec!["second"]);
    }

    #[test]
    fn test_no_callbacks_is_rejected() {
        let mut scheduler: TransitionScheduler<&str> = TransitionScheduler::new();
        let result = scheduler.start(
            "broken",
            Transition::new(Duration::from_secs(1)).on_start(|_| {}),
        );
        assert_eq!(result, Err(ScheduleError::NoCallbacks));
        assert!(!scheduler.is_active(&"broken"));
    }

    #[test]
    fn test_cancel_leaves_partial_progress_in_place() {
        let mut scheduler = TransitionScheduler::new();
        let last = Rc::new(RefCell::new(0.0f32));
        let last_probe = Rc::clone(&last);
        scheduler
            .start(
                "dash",
                Transition::new(Duration::from_secs(1))
                    .on_progress(move |t| *last_probe.borrow_mut() = t),
            )
            .unwrap();
        scheduler.tick(Duration::from_millis(400));

        assert!(scheduler.cancel(&"dash"));
        let frozen = *last.borrow();
        assert!(frozen > 0.3 && frozen < 0.5);

        // No rollback and no further reports.
        scheduler.tick(Duration::from_secs(2));
        assert_eq!(*last.borrow(), frozen);
    }

    #[test]
    fn test_remaining_supports_accumulating_reschedule() {
        let mut scheduler = TransitionScheduler::new();
        scheduler
            .start(
                "stun",
                Transition::new(Duration::from_millis(600)).on_end(|_| {}),
            )
            .unwrap();
        scheduler.tick(Duration::from_millis(200));

        // A second stun while one is active: remaining + fresh duration.
        let remaining = scheduler.remaining(&"stun").unwrap();
        assert_eq!(remaining, Duration::from_millis(400));
        scheduler
            .start(
                "stun",
                Transition::new(remaining + Duration::from_millis(600)).on_end(|_| {}),
            )
            .unwrap();
        assert_eq!(
            scheduler.remaining(&"stun"),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_progress_read_matches_elapsed_ratio() {
        let mut scheduler = TransitionScheduler::new();
        scheduler
            .start(
                "icon",
                Transition::new(Duration::from_secs(10)).on_progress(|_| {}),
            )
            .unwrap();
        scheduler.tick(Duration::from_secs(4));
        let progress = scheduler.progress(&"icon").unwrap();
        assert!((progress - 0.4).abs() < 1e-3);
    }
}
