//! Dependency Graph
//!
//! This module holds the listener graph that records which reactors read
//! which signal properties.
//!
//! # Overview
//!
//! An edge connects one `(signal, property)` pair to one reactor. Edges are
//! indexed both ways:
//!
//! - by property, to find the reactors to re-run when that property changes
//! - by reactor, to drop every stale edge before the reactor re-runs
//!
//! The graph stores only ids. It never owns a signal or a reactor, so
//! neither is kept alive by being subscribed to.
//!
//! The graph has no control flow of its own; the runtime drives it.

mod listener;

pub use listener::{ListenerGraph, Listeners};
