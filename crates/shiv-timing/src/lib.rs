//! Timed state transitions on a cooperative tick.
//!
//! Every cooldown, debuff, and animation-timing behavior in the session is
//! one [`Transition`]: a restartable, cancellable timed process that walks a
//! progress value from 0 to 1 over a duration, firing a start callback, a
//! per-tick progress callback, and an end callback. Transitions run inside a
//! [`TransitionScheduler`] keyed by logical slot; starting a slot that is
//! already active cancels the previous instance. [`TickSchedule`] provides
//! the fixed-rate accumulator that drives the host loop.

pub mod scheduler;
pub mod tick;
pub mod transition;

pub use scheduler::TransitionScheduler;
pub use tick::{TICK_RATE, TickSchedule};
pub use transition::{ScheduleError, Transition};
