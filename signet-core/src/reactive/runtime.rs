//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! reactors. It owns the listener graph, the registry of live reactors and
//! the table memoizing one reactor per function.
//!
//! # How It Works
//!
//! 1. When a reactor computation reads a signal property, the runtime
//!    records an edge between that property and the reactor.
//!
//! 2. When a signal property changes, the runtime:
//!    a. Takes a snapshot of the reactors listening to that property
//!    b. Re-runs each of them, in registration order, before returning
//!
//! 3. After every run, the runtime keeps the reactor registered only if it
//!    still depends on something. A reactor that read nothing can never be
//!    triggered again and is released.
//!
//! # Ownership
//!
//! The graph stores ids only. The registry owns subscribed reactors, each
//! reactor owns its output signal, and signals hold a weak handle back to
//! the runtime. Dropping the last handle to a signal removes its edges and
//! releases reactors left with nothing to listen to.
//!
//! # Thread Safety
//!
//! Shared state is behind `parking_lot` locks that are never held while a
//! user computation runs. The tracking and run stacks are thread-local, so
//! each thread carries its own propagation chain.
//!
//! Propagation itself is serialized per runtime: a write or `update` holds
//! a reentrant lock for its whole synchronous call tree. A write from
//! another thread waits until the running tree completes, so a reactor
//! never runs on two threads at once. Nested writes on the same thread
//! re-enter the lock. Code that writes into two runtimes from several
//! threads must take them in a consistent order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use serde_json::Value;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::reactor::Reactor;
use super::signal::{Signal, WeakSignal};
use super::subscriber::{FnKey, ReactorFn, ReactorId, SignalId, WeakReactorFn};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::ListenerGraph;
use crate::Object;

/// Identifier distinguishing runtimes from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RuntimeId(u64);

impl RuntimeId {
    /// Never assigned to a runtime.
    pub(crate) const NONE: RuntimeId = RuntimeId(u64::MAX);

    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Memo table entry for one reactor function.
///
/// All handles are weak: the entry never keeps the function, the reactor
/// or the output alive.
struct MemoEntry {
    func: WeakReactorFn,
    reactor: Weak<Reactor>,
    output: WeakSignal,
}

impl MemoEntry {
    fn new(func: &ReactorFn, reactor: &Arc<Reactor>) -> Self {
        Self {
            func: func.downgrade(),
            reactor: Arc::downgrade(reactor),
            output: reactor.output().downgrade(),
        }
    }

    /// A dead function means the address may have been reused.
    fn is_live(&self) -> bool {
        self.func.is_alive() && (self.reactor.strong_count() > 0 || self.output.is_alive())
    }
}

/// A handle to a reactive runtime.
///
/// Cloning the handle shares the runtime. Signals and reactors created by
/// different runtimes never track each other.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let counter = rt.signal(object! { "n": 0 });
///
/// let c = counter.clone();
/// let doubled = rt.update(&ReactorFn::new(move || {
///     let n = c.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
///     Ok(object! { "d": n * 2 })
/// }))?;
///
/// counter.set("n", 5)?;
/// assert_eq!(doubled.get("d"), Some(Value::from(10)));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    id: RuntimeId,

    /// Weak handle to this runtime, given to every signal it creates.
    this: Weak<RuntimeInner>,

    config: RuntimeConfig,

    graph: Mutex<ListenerGraph>,

    /// Reactors that currently depend on at least one property.
    reactors: Mutex<HashMap<ReactorId, Arc<Reactor>>>,

    /// One reactor per function identity.
    memo: Mutex<HashMap<FnKey, MemoEntry>>,

    /// Held for the duration of each propagation tree.
    propagation: ReentrantMutex<()>,
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let inner = Arc::new_cyclic(|this| RuntimeInner {
            id: RuntimeId::new(),
            this: this.clone(),
            config,
            graph: Mutex::new(ListenerGraph::new()),
            reactors: Mutex::new(HashMap::new()),
            memo: Mutex::new(HashMap::new()),
            propagation: ReentrantMutex::new(()),
        });
        Self { inner }
    }

    /// The process-wide runtime used by [`signal`](crate::signal) and
    /// [`update`](crate::update).
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(Runtime::new)
    }

    /// This runtime's configuration.
    pub fn config(&self) -> &RuntimeConfig {
        self.inner.config()
    }

    /// Wrap an object in a signal tracked by this runtime.
    pub fn signal(&self, props: Object) -> Signal {
        self.inner.new_signal(props)
    }

    /// Wrap a JSON object in a signal.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::NotAnObject`] if `value` is not a JSON object.
    pub fn signal_from_json(&self, value: Value) -> Result<Signal> {
        match value {
            Value::Object(props) => Ok(self.signal(props)),
            other => Err(ReactiveError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// Register `func` as a reactor and run it once.
    ///
    /// Returns the signal the reactor merges its results into. Every clone
    /// of the same [`ReactorFn`] maps to one reactor and one output signal;
    /// registering it again re-runs that reactor instead of adding a second
    /// subscription.
    ///
    /// After this returns, the reactor re-runs whenever a property it read
    /// on its latest run changes.
    ///
    /// # Errors
    ///
    /// - [`ReactiveError::RecursiveInvocation`] if `func` is already running
    ///   on this thread, or if its run triggers itself again.
    /// - [`ReactiveError::PropagationDepthExceeded`] if reactor runs nest
    ///   deeper than the configured limit.
    /// - Any error returned by `func` itself.
    pub fn update(&self, func: &ReactorFn) -> Result<Signal> {
        let _propagating = self.inner.propagate();
        let reactor = self.inner.reactor_for(func);

        // Registered up front so a write inside the first run that loops
        // back to this reactor reaches the recursion guard.
        self.inner
            .reactors
            .lock()
            .entry(reactor.id())
            .or_insert_with(|| Arc::clone(&reactor));

        self.inner.run_reactor(&reactor)?;
        Ok(reactor.output().clone())
    }

    /// Unregister `func`.
    ///
    /// Its reactor stops listening and will not run again. The output
    /// signal keeps its last values. Returns `false` if `func` had no live
    /// reactor.
    pub fn dispose(&self, func: &ReactorFn) -> bool {
        let _propagating = self.inner.propagate();
        let Some(reactor) = self.inner.take_reactor(func) else {
            return false;
        };

        reactor.dispose();
        self.inner.clear_dependencies(reactor.id());
        let released = self.inner.reactors.lock().remove(&reactor.id());
        drop(released);

        debug!(reactor = %reactor.id(), "disposed reactor");
        true
    }

    /// Number of reactors listening to `property` of `signal`.
    pub fn listener_count(&self, signal: &Signal, property: &str) -> usize {
        self.inner.graph.lock().listener_count(signal.id(), property)
    }

    /// The `(signal, property)` pairs `func` read on its latest run.
    pub fn dependencies(&self, func: &ReactorFn) -> Vec<(SignalId, String)> {
        match self.inner.lookup(func) {
            Some(reactor) => self.inner.dependencies_of(reactor.id()),
            None => Vec::new(),
        }
    }

    /// How many times `func`'s computation has completed.
    pub fn run_count(&self, func: &ReactorFn) -> usize {
        self.inner.lookup(func).map_or(0, |reactor| reactor.run_count())
    }

    /// Whether a reactor computation is running on this thread.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("reactors", &self.inner.reactors.lock().len())
            .finish()
    }
}

impl RuntimeInner {
    pub(crate) fn id(&self) -> RuntimeId {
        self.id
    }

    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Enter this runtime's propagation section.
    ///
    /// Blocks while another thread is propagating; re-enters if this thread
    /// already is.
    pub(crate) fn propagate(&self) -> ReentrantMutexGuard<'_, ()> {
        self.propagation.lock()
    }

    fn new_signal(&self, props: Object) -> Signal {
        Signal::new(self.this.clone(), props)
    }

    /// Record that the running reactor, if any, read `property`.
    ///
    /// Called by signals on every read.
    pub(crate) fn track(&self, signal: SignalId, property: &str) {
        let Some(reactor) = ReactiveContext::current(self.id) else {
            return;
        };

        if self.graph.lock().register(signal, property, reactor) {
            trace!(signal = %signal, property, reactor = %reactor, "registered dependency");
        }
    }

    /// Re-run every reactor listening to `property` of `signal`.
    ///
    /// This is the core update propagation mechanism. The first error stops
    /// propagation and is returned to the writer.
    pub(crate) fn notify(&self, signal: SignalId, property: &str) -> Result<()> {
        let listeners = self.graph.lock().listeners(signal, property);
        if listeners.is_empty() {
            return Ok(());
        }

        debug!(signal = %signal, property, listeners = listeners.len(), "property changed");

        for id in listeners {
            let reactor = self.reactors.lock().get(&id).cloned();
            if let Some(reactor) = reactor {
                self.run_reactor(&reactor)?;
            }
        }

        Ok(())
    }

    /// Remove all dependency edges of `reactor`.
    pub(crate) fn clear_dependencies(&self, reactor: ReactorId) {
        let removed = self.graph.lock().clear(reactor);
        if removed > 0 {
            trace!(reactor = %reactor, removed, "cleared dependencies");
        }
    }

    pub(crate) fn dependencies_of(&self, reactor: ReactorId) -> Vec<(SignalId, String)> {
        self.graph.lock().dependencies(reactor)
    }

    /// Drop the edges of a signal that no longer exists.
    pub(crate) fn forget_signal(&self, signal: SignalId) {
        let orphaned = self.graph.lock().forget_signal(signal);
        if orphaned.is_empty() {
            return;
        }

        let released: Vec<Arc<Reactor>> = {
            let mut reactors = self.reactors.lock();
            orphaned.iter().filter_map(|id| reactors.remove(id)).collect()
        };
        trace!(signal = %signal, released = released.len(), "released orphaned reactors");

        // Dropping a reactor may drop its output signal, which re-enters
        // this method, so no lock may be held here.
        drop(released);
    }

    /// Run `reactor`, then keep it registered only if it has dependencies.
    fn run_reactor(&self, reactor: &Arc<Reactor>) -> Result<()> {
        let result = reactor.run(self);
        self.settle(reactor);
        result
    }

    fn settle(&self, reactor: &Arc<Reactor>) {
        let id = reactor.id();

        // Disposed during its own run: edges recorded after the dispose
        // must not outlive it.
        if reactor.is_disposed() {
            self.clear_dependencies(id);
        }

        let subscribed = !reactor.is_disposed() && self.graph.lock().has_edges(id);

        let released = {
            let mut reactors = self.reactors.lock();
            if subscribed {
                reactors.entry(id).or_insert_with(|| Arc::clone(reactor));
                None
            } else {
                reactors.remove(&id)
            }
        };
        drop(released);
    }

    /// The live reactor for `func`, if any.
    fn lookup(&self, func: &ReactorFn) -> Option<Arc<Reactor>> {
        let memo = self.memo.lock();
        memo.get(&func.key())
            .filter(|entry| entry.func.is_alive())
            .and_then(|entry| entry.reactor.upgrade())
    }

    /// Find the reactor memoized for `func`, or create one.
    ///
    /// A released reactor whose output signal is still held is replaced by
    /// a new reactor writing into that same output.
    fn reactor_for(&self, func: &ReactorFn) -> Arc<Reactor> {
        let key = func.key();
        let mut memo = self.memo.lock();

        let existing = memo.get(&key).filter(|entry| entry.func.is_alive());
        if let Some(reactor) = existing.and_then(|entry| entry.reactor.upgrade()) {
            return reactor;
        }

        let output = existing
            .and_then(|entry| entry.output.upgrade())
            .unwrap_or_else(|| self.new_signal(Object::new()));
        let reactor = Arc::new(Reactor::new(func.clone(), output));

        memo.retain(|_, entry| entry.is_live());
        memo.insert(key, MemoEntry::new(func, &reactor));

        debug!(reactor = %reactor.id(), "created reactor");
        reactor
    }

    /// Remove `func` from the memo table, returning its live reactor.
    fn take_reactor(&self, func: &ReactorFn) -> Option<Arc<Reactor>> {
        let mut memo = self.memo.lock();
        let entry = memo.remove(&func.key())?;
        if !entry.func.is_alive() {
            return None;
        }
        entry.reactor.upgrade()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
