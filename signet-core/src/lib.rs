//! Signet Core
//!
//! A minimal fine-grained reactive runtime. Plain objects wrapped as
//! signals notify the computations ("reactors") that read them whenever a
//! property they read changes, without any manual subscription wiring.
//!
//! It implements:
//!
//! - Signals with tracked property reads and change-detecting writes
//! - A bidirectional listener graph between signal properties and reactors
//! - Reactors that re-subscribe on every run and merge their results into
//!   an output signal
//! - A per-thread recursion guard and propagation depth limit
//!
//! # Architecture
//!
//! - `reactive`: signals, reactors, dependency tracking and the runtime
//! - `graph`: the listener graph storing dependency edges
//! - `config`: runtime settings
//! - `error`: the error type
//!
//! # Example
//!
//! ```rust
//! use signet_core::{object, signal, update, ReactorFn, Value};
//!
//! # fn main() -> signet_core::Result<()> {
//! let counter = signal(object! { "n": 0 });
//!
//! let c = counter.clone();
//! let doubled = update(&ReactorFn::new(move || {
//!     let n = c.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(object! { "d": n * 2 })
//! }))?;
//! assert_eq!(doubled.get("d"), Some(Value::from(0)));
//!
//! // The reactor re-runs inside this write
//! counter.set("n", 5)?;
//! assert_eq!(doubled.get("d"), Some(Value::from(10)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{untrack, ReactorFn, ReactorId, Runtime, Signal, SignalId};
pub use serde_json::Value;

/// The contents of a signal: property names to values, in insertion order.
pub type Object = serde_json::Map<String, Value>;

/// Wrap an object in a signal tracked by the global runtime.
pub fn signal(props: Object) -> Signal {
    Runtime::global().signal(props)
}

/// Register `func` as a reactor on the global runtime and run it once.
///
/// See [`Runtime::update`].
pub fn update(func: &ReactorFn) -> Result<Signal> {
    Runtime::global().update(func)
}

/// Build an [`Object`] with JSON-like syntax.
///
/// ```rust
/// use signet_core::object;
///
/// let props = object! { "name": "ada", "tags": ["x", "y"] };
/// assert_eq!(props.len(), 2);
/// ```
#[macro_export]
macro_rules! object {
    ($($body:tt)*) => {
        match $crate::__private::json!({ $($body)* }) {
            $crate::Value::Object(props) => props,
            _ => $crate::Object::new(),
        }
    };
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json::json;
}
