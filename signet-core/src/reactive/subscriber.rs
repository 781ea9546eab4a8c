//! Identities and reactor functions.
//!
//! Signals and reactors are referred to by small copyable ids everywhere
//! in the listener graph, so the graph never owns either of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::Object;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

/// Unique identifier for a reactor.
///
/// Each reactor gets a fresh ID when it is created. The ID is what the
/// listener graph stores on both sides of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactorId(u64);

impl ReactorId {
    /// Generate a new unique reactor ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ReactorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reactor#{}", self.0)
    }
}

/// Identity of a [`ReactorFn`]: the address of its shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FnKey(usize);

#[cfg(test)]
impl FnKey {
    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

type Computation = dyn Fn() -> Result<Object> + Send + Sync;

/// A zero-argument computation that produces an object.
///
/// Clones share identity: registering any clone with
/// [`Runtime::update`](super::Runtime::update) finds the same reactor and
/// the same output signal. Two separately constructed `ReactorFn`s are
/// always distinct, even when built from identical closures.
///
/// # Example
///
/// ```rust,ignore
/// let counter = signal(object! { "n": 0 });
/// let c = counter.clone();
/// let doubled = ReactorFn::new(move || {
///     let n = c.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
///     Ok(object! { "d": n * 2 })
/// });
/// ```
#[derive(Clone)]
pub struct ReactorFn {
    func: Arc<Computation>,
}

impl ReactorFn {
    /// Wrap a computation.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Result<Object> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Invoke the computation.
    pub fn call(&self) -> Result<Object> {
        (self.func)()
    }

    /// Whether two handles refer to the same computation.
    pub fn ptr_eq(&self, other: &ReactorFn) -> bool {
        self.key() == other.key()
    }

    pub(crate) fn key(&self) -> FnKey {
        FnKey(Arc::as_ptr(&self.func) as *const () as usize)
    }

    pub(crate) fn downgrade(&self) -> WeakReactorFn {
        WeakReactorFn {
            func: Arc::downgrade(&self.func),
        }
    }
}

impl fmt::Debug for ReactorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactorFn").field(&self.key().0).finish()
    }
}

/// Non-owning handle to a [`ReactorFn`], held by the memo table.
#[derive(Clone)]
pub(crate) struct WeakReactorFn {
    func: Weak<Computation>,
}

impl WeakReactorFn {
    pub(crate) fn is_alive(&self) -> bool {
        self.func.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let r1 = ReactorId::new();
        let r2 = ReactorId::new();
        let s1 = SignalId::new();
        let s2 = SignalId::new();

        assert_ne!(r1, r2);
        assert_ne!(s1, s2);
    }

    #[test]
    fn reactor_fn_clones_share_identity() {
        let f = ReactorFn::new(|| Ok(Object::new()));
        let g = f.clone();
        let h = ReactorFn::new(|| Ok(Object::new()));

        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&h));
    }

    #[test]
    fn weak_handle_tracks_liveness() {
        let f = ReactorFn::new(|| Ok(Object::new()));
        let weak = f.downgrade();
        assert!(weak.is_alive());

        drop(f);
        assert!(!weak.is_alive());
    }

    #[test]
    fn call_runs_computation() {
        let f = ReactorFn::new(|| {
            let mut out = Object::new();
            out.insert("x".into(), 1.into());
            Ok(out)
        });

        let out = f.call().unwrap();
        assert_eq!(out.get("x"), Some(&1.into()));
    }
}
