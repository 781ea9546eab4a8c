//! Reactive Primitives
//!
//! This module implements the core reactive system: signals and reactors.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal wraps an object. When one of its properties is read while a
//! reactor computation runs, the reactor is subscribed to that property.
//! When the property's value changes, every subscribed reactor re-runs.
//!
//! ## Reactors
//!
//! A Reactor is a computation returning an object. It runs once when
//! registered and again whenever a property it read on its latest run
//! changes. Its result is merged into an output signal, which other
//! reactors may read in turn.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to detect
//! dependencies automatically. When a signal is read, we check whether a
//! reactor of the same runtime is on top of the stack and, if so, record
//! the edge in the runtime's listener graph.
//!
//! Propagation is fully synchronous: a write returns only after every
//! reactor it triggered, and everything those reactors triggered, has run.

mod context;
mod reactor;
mod runtime;
mod signal;
mod subscriber;

pub use context::{untrack, ReactiveContext};
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::{ReactorFn, ReactorId, SignalId};
