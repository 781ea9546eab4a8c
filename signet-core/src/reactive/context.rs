//! Reactive Context
//!
//! Two per-thread stacks describe the synchronous call chain that is
//! currently running:
//!
//! - The *tracking* stack holds the reactor whose computation is executing.
//!   Signal reads consult its top frame to decide whether to record a
//!   dependency edge.
//! - The *run* stack holds every reactor function that is somewhere in the
//!   middle of a run, including the propagation its writes trigger. It
//!   rejects a reactor re-entering itself and bounds how deep mutually
//!   triggering reactors may nest.
//!
//! # Implementation
//!
//! Both stacks are thread-local, one logical call chain per thread. Entries
//! are pushed by guard constructors and popped in `Drop`, so the stacks are
//! restored on every exit path, including errors and panics inside user
//! computations.

use std::cell::RefCell;

use tracing::warn;

use super::runtime::RuntimeId;
use super::subscriber::{FnKey, ReactorId};
use crate::error::{ReactiveError, Result};

thread_local! {
    static TRACKING_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static RUN_STACK: RefCell<Vec<FnKey>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the tracking stack.
///
/// `reactor` is `None` for an [`untrack`] frame, which hides the frames
/// below it.
#[derive(Debug, Clone, Copy)]
struct Frame {
    runtime: RuntimeId,
    reactor: Option<ReactorId>,
}

/// Guard that pops the tracking frame when dropped.
pub struct ReactiveContext {
    reactor: Option<ReactorId>,
}

impl ReactiveContext {
    /// Enter a tracking frame for `reactor` of `runtime`.
    ///
    /// While the guard is alive, reads of signals belonging to `runtime`
    /// register `reactor` as a listener.
    pub(crate) fn enter(runtime: RuntimeId, reactor: ReactorId) -> Self {
        Self::push(Frame {
            runtime,
            reactor: Some(reactor),
        })
    }

    fn suspend() -> Self {
        Self::push(Frame {
            runtime: RuntimeId::NONE,
            reactor: None,
        })
    }

    fn push(frame: Frame) -> Self {
        TRACKING_STACK.with(|stack| stack.borrow_mut().push(frame));
        Self {
            reactor: frame.reactor,
        }
    }

    /// The reactor a read of a `runtime` signal should be attributed to.
    ///
    /// Returns `None` outside any reactor, inside [`untrack`], and when the
    /// running reactor belongs to another runtime.
    pub(crate) fn current(runtime: RuntimeId) -> Option<ReactorId> {
        TRACKING_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|frame| frame.runtime == runtime)
                .and_then(|frame| frame.reactor)
        })
    }

    /// Whether a reactor computation is running on this thread.
    pub fn is_active() -> bool {
        TRACKING_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|frame| frame.reactor.is_some())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        TRACKING_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.reactor, self.reactor,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.reactor, frame.reactor
                );
            }
        });
    }
}

/// Run `f` without recording any dependencies.
///
/// Signal reads inside `f` behave as if no reactor were running, even when
/// `untrack` itself is called from a reactor computation.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::suspend();
    f()
}

/// Guard marking a reactor function as running on this thread.
pub(crate) struct RunGuard {
    key: FnKey,
}

impl RunGuard {
    /// Mark `key` as running.
    ///
    /// Fails if it is already running further up this thread's call chain,
    /// or if the chain is already `max_depth` runs deep.
    pub(crate) fn enter(key: FnKey, reactor: ReactorId, max_depth: usize) -> Result<Self> {
        RUN_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.contains(&key) {
                warn!(reactor = %reactor, "rejected recursive reactor invocation");
                return Err(ReactiveError::RecursiveInvocation { reactor });
            }
            if stack.len() >= max_depth {
                warn!(reactor = %reactor, depth = max_depth, "propagation depth limit reached");
                return Err(ReactiveError::PropagationDepthExceeded { depth: max_depth });
            }

            stack.push(key);
            Ok(Self { key })
        })
    }

    /// Number of reactor runs currently nested on this thread.
    pub(crate) fn depth() -> usize {
        RUN_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUN_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.key), "RunGuard popped out of order");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> FnKey {
        FnKey::from_raw(n)
    }

    #[test]
    fn context_tracks_reactor() {
        let runtime = RuntimeId::new();
        let id = ReactorId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current(runtime).is_none());

        {
            let _ctx = ReactiveContext::enter(runtime, id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current(runtime), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current(runtime).is_none());
    }

    #[test]
    fn nested_contexts() {
        let runtime = RuntimeId::new();
        let id1 = ReactorId::new();
        let id2 = ReactorId::new();

        {
            let _ctx1 = ReactiveContext::enter(runtime, id1);
            assert_eq!(ReactiveContext::current(runtime), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(runtime, id2);
                assert_eq!(ReactiveContext::current(runtime), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current(runtime), Some(id1));
        }

        assert!(ReactiveContext::current(runtime).is_none());
    }

    #[test]
    fn other_runtime_is_not_tracked() {
        let mine = RuntimeId::new();
        let theirs = RuntimeId::new();
        let _ctx = ReactiveContext::enter(theirs, ReactorId::new());

        assert!(ReactiveContext::current(mine).is_none());
    }

    #[test]
    fn untrack_hides_running_reactor() {
        let runtime = RuntimeId::new();
        let id = ReactorId::new();
        let _ctx = ReactiveContext::enter(runtime, id);

        let inside = untrack(|| ReactiveContext::current(runtime));
        assert!(inside.is_none());
        assert_eq!(ReactiveContext::current(runtime), Some(id));
    }

    #[test]
    fn context_pops_on_panic() {
        let runtime = RuntimeId::new();
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(runtime, ReactorId::new());
            panic!("computation failed");
        });

        assert!(result.is_err());
        assert!(ReactiveContext::current(runtime).is_none());
    }

    #[test]
    fn run_guard_rejects_reentry() {
        let reactor = ReactorId::new();
        let outer = RunGuard::enter(key(1), reactor, 16).unwrap();

        let err = RunGuard::enter(key(1), reactor, 16).err().unwrap();
        assert_eq!(err, ReactiveError::RecursiveInvocation { reactor });

        // A different function may nest
        let inner = RunGuard::enter(key(2), ReactorId::new(), 16).unwrap();
        assert_eq!(RunGuard::depth(), 2);

        drop(inner);
        drop(outer);
        assert_eq!(RunGuard::depth(), 0);
    }

    #[test]
    fn run_guard_enforces_depth() {
        let first = RunGuard::enter(key(10), ReactorId::new(), 2).unwrap();
        let second = RunGuard::enter(key(11), ReactorId::new(), 2).unwrap();

        let err = RunGuard::enter(key(12), ReactorId::new(), 2).err().unwrap();
        assert_eq!(err, ReactiveError::PropagationDepthExceeded { depth: 2 });

        drop(second);
        drop(first);
    }
}
