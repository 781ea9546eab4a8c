//! Runtime Configuration
//!
//! Settings are plain serde data so they can be loaded from whatever format
//! the host application already uses for its configuration.

use serde::{Deserialize, Serialize};

/// Default limit on nested reactor runs within one propagation.
pub const DEFAULT_MAX_PROPAGATION_DEPTH: usize = 256;

/// Configuration for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of reactor runs that may be nested inside one
    /// another on a single thread. Mutually triggering reactors hit this
    /// limit and fail with
    /// [`ReactiveError::PropagationDepthExceeded`](crate::ReactiveError::PropagationDepthExceeded).
    pub max_propagation_depth: usize,
}

impl RuntimeConfig {
    /// Set the propagation depth limit.
    pub fn with_max_propagation_depth(mut self, depth: usize) -> Self {
        self.max_propagation_depth = depth;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: DEFAULT_MAX_PROPAGATION_DEPTH,
        }
    }
}
