//! Event and timer core.
//!
//! Weak-coupled signal/slot events, a process-wide timer sweep and
//! deferred calls. Everything is single-threaded cooperative: mutation,
//! dispatch and timer fires all happen on the thread that owns the
//! figures.

pub mod event;
pub mod keys;
pub mod timer;

pub use event::{EventArgs, EventSource, HandlerId, ObjectEvents};
pub use keys::{key, Modifiers, MouseButton};
pub use timer::{call_later, sweep, Timer, TimerId};
