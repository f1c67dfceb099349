//! The single wait-then-flip abstraction.

use std::time::Duration;

// ---------------------------------------------------------------------------
// ScheduleError
// ---------------------------------------------------------------------------

/// Misuse reported when a transition is scheduled with no observable effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Neither a progress nor an end callback was supplied, so the
    /// transition could never be observed. Reported immediately; the
    /// transition does not start.
    #[error("transition scheduled without a progress or end callback")]
    NoCallbacks,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

type EdgeCallback = Box<dyn FnMut(bool)>;
type ProgressCallback = Box<dyn FnMut(f32)>;

/// A timed process interpolating a progress value from 0 to 1 over a
/// duration.
///
/// On start the start callback receives the initial boolean and the progress
/// callback receives 0. Each tick the progress callback receives
/// `elapsed / duration` clamped to `[0, 1)`, advanced by the tick's real
/// elapsed time. Total run length depends on actual wall-clock ticking and
/// is intentionally coarse. On completion the progress callback receives
/// exactly 1.0, then the end callback receives the negation of the initial
/// boolean. A zero-duration transition completes on its first tick.
pub struct Transition {
    duration: Duration,
    elapsed: Duration,
    initial: bool,
    invert_progress: bool,
    start: Option<EdgeCallback>,
    progress: Option<ProgressCallback>,
    end: Option<EdgeCallback>,
}

impl Transition {
    /// Creates a transition with the given duration and an initial boolean
    /// of `false` (so the end callback receives `true`).
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            elapsed: Duration::ZERO,
            initial: false,
            invert_progress: false,
            start: None,
            progress: None,
            end: None,
        }
    }

    /// Sets the boolean handed to the start callback; the end callback
    /// receives its negation.
    pub fn starting_at(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }

    /// Reports progress as `1 - t` instead of `t` (draining fills, e.g. a
    /// respawn icon emptying).
    pub fn inverted(mut self) -> Self {
        self.invert_progress = true;
        self
    }

    /// Callback invoked once when the transition starts, with the initial
    /// boolean.
    pub fn on_start<F: FnMut(bool) + 'static>(mut self, callback: F) -> Self {
        self.start = Some(Box::new(callback));
        self
    }

    /// Callback invoked every tick with the clamped progress ratio.
    pub fn on_progress<F: FnMut(f32) + 'static>(mut self, callback: F) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Callback invoked once on completion, with the negated initial
    /// boolean. Never invoked if the transition is cancelled first.
    pub fn on_end<F: FnMut(bool) + 'static>(mut self, callback: F) -> Self {
        self.end = Some(Box::new(callback));
        self
    }

    /// A transition with no progress and no end callback can never be
    /// observed; scheduling one is a misuse.
    pub(crate) fn has_observable_effect(&self) -> bool {
        self.progress.is_some() || self.end.is_some()
    }

    /// Fires the start-edge callbacks. Called once by the scheduler.
    pub(crate) fn begin(&mut self) {
        if let Some(start) = &mut self.start {
            start(self.initial);
        }
        self.report(0.0);
    }

    /// Advances by `dt`. Returns `true` when the transition completed (its
    /// final callbacks have fired and it must not be ticked again).
    pub(crate) fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.report(1.0);
            if let Some(end) = &mut self.end {
                end(!self.initial);
            }
            return true;
        }
        // elapsed < duration, so the ratio stays below 1.
        let ratio = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.report(ratio);
        false
    }

    /// Raw completion ratio in `[0, 1]`, independent of inversion.
    pub(crate) fn ratio(&self) -> f32 {
        if self.elapsed >= self.duration {
            1.0
        } else {
            self.elapsed.as_secs_f32() / self.duration.as_secs_f32()
        }
    }

    /// Time left until completion.
    pub(crate) fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }

    fn report(&mut self, t: f32) {
        if let Some(progress) = &mut self.progress {
            let value = if self.invert_progress { 1.0 - t } else { t };
            progress(value);
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("duration", &self.duration)
            .field("elapsed", &self.elapsed)
            .field("initial", &self.initial)
            .finish()
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
    fn test_edges_toggle_start_value() {
        let edges = Rc::new(RefCell::new(Vec::new()));
        let start_probe = Rc::clone(&edges);
        let end_probe = Rc::clone(&edges);
        let mut tr = Transition::new(Duration::from_millis(100))
            .starting_at(true)
            .on_start(move |v| start_probe.borrow_mut().push(("start", v)))
            .on_end(move |v| end_probe.borrow_mut().push(("end", v)));

        tr.begin();
        assert!(!tr.advance(Duration::from_millis(60)));
        assert!(tr.advance(Duration::from_millis(60)));

        assert_eq!(*edges.borrow(), vec![("start", true), ("end", false)]);
    }

    #[test]
    fn test_progress_reports_zero_then_clamped_then_one() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_probe = Rc::clone(&seen);
        let mut tr = Transition::new(Duration::from_secs(1))
            .on_progress(move |t| seen_probe.borrow_mut().push(t));

        tr.begin();
        tr.advance(Duration::from_millis(250));
        tr.advance(Duration::from_millis(250));
        tr.advance(Duration::from_millis(600));

        let seen = seen.borrow();
        assert_eq!(seen[0], 0.0);
        assert!(seen[1] > 0.2 && seen[1] < 0.3);
        assert!(seen[2] > 0.45 && seen[2] < 0.55);
        assert_eq!(*seen.last().unwrap(), 1.0);
        // Never reaches 1.0 before completion.
        assert!(seen[..seen.len() - 1].iter().all(|t| *t < 1.0));
    }

    #[test]
    fn test_inverted_progress_drains() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_probe = Rc::clone(&seen);
        let mut tr = Transition::new(Duration::from_secs(1))
            .inverted()
            .on_progress(move |t| seen_probe.borrow_mut().push(t));

        tr.begin();
        tr.advance(Duration::from_millis(500));
        tr.advance(Duration::from_millis(600));

        let seen = seen.borrow();
        assert_eq!(seen[0], 1.0);
        assert!(seen[1] < 0.55);
        assert_eq!(*seen.last().unwrap(), 0.0);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let ended = Rc::new(RefCell::new(0));
        let ended_probe = Rc::clone(&ended);
        let mut tr =
            Transition::new(Duration::ZERO).on_end(move |_| *ended_probe.borrow_mut() += 1);
        tr.begin();
        assert!(tr.advance(Duration::ZERO));
        assert_eq!(*ended.borrow(), 1);
    }
}
