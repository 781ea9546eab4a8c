//! Reactor Implementation
//!
//! A Reactor is a re-runnable computation that writes its result into an
//! output signal it owns.
//!
//! # How Reactors Work
//!
//! 1. When registered, the reactor runs its function immediately to
//!    establish initial dependencies and fill its output.
//!
//! 2. When any property it read on its latest run changes, it re-runs
//!    synchronously, inside the write that changed the property.
//!
//! 3. Each run first drops all of its old dependency edges, then records
//!    new ones while the function executes. Properties no longer read stop
//!    triggering it.
//!
//! 4. Every key of the function's result is written into the output signal
//!    with ordinary `set` calls, so readers of the output are notified in
//!    turn. Keys the result omits keep their previous values.
//!
//! # Differences from a plain effect
//!
//! - A reactor's result is data, merged into an output signal other
//!   reactors can depend on.
//! - A reactor never runs while it is already running further up the same
//!   call chain; that attempt fails with `RecursiveInvocation`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use super::context::{ReactiveContext, RunGuard};
use super::runtime::RuntimeInner;
use super::signal::Signal;
use super::subscriber::{ReactorFn, ReactorId};
use crate::error::Result;

/// A registered reactor function together with its output signal.
pub(crate) struct Reactor {
    /// Identifier used on the reactor side of dependency edges.
    id: ReactorId,

    /// The user computation.
    func: ReactorFn,

    /// The signal results are merged into.
    output: Signal,

    /// Whether the reactor has been disposed.
    disposed: AtomicBool,

    /// Number of completed computations.
    run_count: AtomicUsize,
}

impl Reactor {
    pub(crate) fn new(func: ReactorFn, output: Signal) -> Self {
        Self {
            id: ReactorId::new(),
            func,
            output,
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn id(&self) -> ReactorId {
        self.id
    }

    pub(crate) fn output(&self) -> &Signal {
        &self.output
    }

    /// Run the computation and merge its result into the output signal.
    ///
    /// A disposed reactor does nothing.
    pub(crate) fn run(&self, runtime: &RuntimeInner) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }

        let _running = RunGuard::enter(
            self.func.key(),
            self.id,
            runtime.config().max_propagation_depth,
        )?;

        // Clear old dependencies
        runtime.clear_dependencies(self.id);

        debug!(reactor = %self.id, depth = RunGuard::depth(), "running reactor");

        // Track reads only while the computation itself executes
        let result = {
            let _ctx = ReactiveContext::enter(runtime.id(), self.id);
            self.func.call()
        }?;

        self.run_count.fetch_add(1, Ordering::Relaxed);

        for (property, value) in result {
            self.output.set(property, value)?;
        }

        Ok(())
    }

    /// Stop the reactor from running again.
    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn run_count(&self) -> usize {
        self.run_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
