//! Signal Implementation
//!
//! A Signal wraps an object and routes every property access through the
//! runtime's dependency tracking.
//!
//! # How Signals Work
//!
//! 1. Reading a property (`get` or `has`) inside a running reactor records
//!    an edge from that property to the reactor.
//!
//! 2. Writing a property compares the new value with the stored one. Only
//!    an actual change is stored and announced.
//!
//! 3. The announcement re-runs every reactor listening to that property
//!    before the write returns.
//!
//! # Thread Safety
//!
//! The property map sits behind a `RwLock`. The lock is released before
//! any listener runs, so reactors may freely read and write the signal
//! that triggered them. Writes and deletes hold the runtime's propagation
//! lock, so writes from different threads propagate one after another.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;

use super::runtime::RuntimeInner;
use super::subscriber::SignalId;
use crate::error::Result;
use crate::Object;

/// A reactive object.
///
/// Cloning a `Signal` yields another handle to the same object. Identity
/// is the handle's shared allocation, never the wrapped map.
///
/// # Example
///
/// ```rust,ignore
/// let counter = signal(object! { "n": 0 });
///
/// // Read a property (tracked inside reactors)
/// let n = counter.get("n");
///
/// // Write a property (notifies listeners if the value changed)
/// counter.set("n", 5)?;
/// ```
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

pub(crate) struct SignalInner {
    /// Unique identifier for this signal.
    id: SignalId,

    /// The runtime that tracks this signal. Non-owning: a signal that
    /// outlives its runtime keeps working as a plain container.
    runtime: Weak<RuntimeInner>,

    /// The wrapped object.
    props: RwLock<Object>,
}

impl Signal {
    pub(crate) fn new(runtime: Weak<RuntimeInner>, props: Object) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::new(),
                runtime,
                props: RwLock::new(props),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Read a property.
    ///
    /// Inside a reactor computation this subscribes the reactor to
    /// `property`, whether or not the property currently exists.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.track(property);
        self.inner.props.read().get(property).cloned()
    }

    /// Test whether a property exists. Tracked like [`get`](Self::get).
    pub fn has(&self, property: &str) -> bool {
        self.track(property);
        self.inner.props.read().contains_key(property)
    }

    /// Write a property.
    ///
    /// If `value` equals the stored value nothing happens. Otherwise the
    /// value is stored and every reactor listening to `property` re-runs
    /// before this call returns.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while re-running listeners, such as
    /// [`ReactiveError::RecursiveInvocation`](crate::ReactiveError::RecursiveInvocation).
    /// The value is stored either way.
    pub fn set(&self, property: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let property = property.into();
        let value = value.into();

        let runtime = self.inner.runtime.upgrade();
        let _propagating = runtime.as_deref().map(RuntimeInner::propagate);

        {
            let mut props = self.inner.props.write();
            if props
                .get(&property)
                .is_some_and(|current| same_value(current, &value))
            {
                return Ok(());
            }
            props.insert(property.clone(), value);
        }

        if let Some(runtime) = &runtime {
            runtime.notify(self.inner.id, &property)?;
        }
        Ok(())
    }

    /// Delete a property.
    ///
    /// Returns `Ok(false)` without notifying anyone if the property did not
    /// exist.
    pub fn delete(&self, property: &str) -> Result<bool> {
        let runtime = self.inner.runtime.upgrade();
        let _propagating = runtime.as_deref().map(RuntimeInner::propagate);

        let removed = self.inner.props.write().shift_remove(property).is_some();
        if removed {
            if let Some(runtime) = &runtime {
                runtime.notify(self.inner.id, property)?;
            }
        }
        Ok(removed)
    }

    /// Read a property without subscribing to it.
    pub fn get_untracked(&self, property: &str) -> Option<Value> {
        self.inner.props.read().get(property).cloned()
    }

    /// Copy of the whole object. Not tracked.
    pub fn snapshot(&self) -> Object {
        self.inner.props.read().clone()
    }

    /// The whole object as a JSON value. Not tracked.
    pub fn to_json(&self) -> Value {
        Value::Object(self.snapshot())
    }

    /// Number of properties. Not tracked.
    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    /// Whether the object has no properties. Not tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.props.read().is_empty()
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal(Arc::downgrade(&self.inner))
    }

    fn track(&self, property: &str) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(self.inner.id, property);
        }
    }
}

impl Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.props.read())
            .finish()
    }
}

/// Equality used for change detection.
///
/// Numbers compare by value, so `1` and `1.0` are the same; everything else
/// uses `Value` equality.
fn same_value(current: &Value, new: &Value) -> bool {
    match (current, new) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        _ => current == new,
    }
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.forget_signal(self.id);
        }
    }
}

/// Non-owning handle to a [`Signal`].
#[derive(Clone)]
pub(crate) struct WeakSignal(Weak<SignalInner>);

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<Signal> {
        self.0.upgrade().map(|inner| Signal { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
