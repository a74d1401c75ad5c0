//! The controlling execution context.
//!
//! Background threads never touch presentation state. They post closures to
//! the [`ControlLoop`] queue through a [`ControlHandle`]; whoever owns the loop
//! drains it, either inside [`ControlLoop::pump_until`] while a blocking
//! operation is in flight or from its own frame loop via
//! [`ControlLoop::run_pending`].

mod queue;

pub use queue::{ControlHandle, ControlLoop, Deferred};
