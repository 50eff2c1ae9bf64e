//! Coordination primitives for racing connection attempts.
//!
//! - [`WaitSlot`]: re-armable gate a task can suspend on
//! - [`CancelSignal`]: cooperative cancellation broadcast
//! - [`RaceCoordinator`]: first-success-or-all-failed tracking over
//!   [`ParticipantLock`]s

mod race;
mod signal;
mod waitslot;

pub use race::{ParticipantLock, RaceCoordinator};
pub use signal::{CancelSignal, FireTimer, Subscription};
pub use waitslot::WaitSlot;
