//! Error Types
//!
//! The reactive runtime has a single failure that callers are expected to
//! hit in normal use: a reactor re-entering itself. The remaining variants
//! cover the Rust-side conversions and the propagation depth limit.

use thiserror::Error;

use crate::reactive::ReactorId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors raised by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A reactor was asked to run while it was already running further up
    /// the same synchronous call chain.
    #[error("reactor {reactor} was invoked recursively while already running")]
    RecursiveInvocation {
        /// The reactor that tried to re-enter itself.
        reactor: ReactorId,
    },

    /// A chain of reactors triggering each other nested deeper than the
    /// configured limit.
    #[error("propagation exceeded the maximum depth of {depth} nested reactor runs")]
    PropagationDepthExceeded {
        /// The configured limit that was hit.
        depth: usize,
    },

    /// A signal can only wrap an object.
    #[error("signals wrap objects, found {found}")]
    NotAnObject {
        /// Kind of the rejected JSON value.
        found: &'static str,
    },
}

impl ReactiveError {
    /// Whether this error came from the recursion guard.
    pub fn is_recursive_invocation(&self) -> bool {
        matches!(self, ReactiveError::RecursiveInvocation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_invocation_names_the_reactor() {
        let reactor = ReactorId::new();
        let err = ReactiveError::RecursiveInvocation { reactor };

        assert!(err.is_recursive_invocation());
        assert!(err.to_string().contains(&reactor.to_string()));
    }

    #[test]
    fn depth_error_reports_limit() {
        let err = ReactiveError::PropagationDepthExceeded { depth: 8 };
        assert!(!err.is_recursive_invocation());
        assert_eq!(
            err.to_string(),
            "propagation exceeded the maximum depth of 8 nested reactor runs"
        );
    }
}
