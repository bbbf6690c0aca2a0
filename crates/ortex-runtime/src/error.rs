//! Error types for the runtime crate.

use crate::provider::ProviderId;
use thiserror::Error;

/// Session and execution errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Graph validation, opset checks or node resolution failed.
    #[error("Failed to load model: {0}")]
    Load(#[from] ortex_core::Error),

    /// A node reads a value no earlier node produced. This is a loader bug
    /// and is never retried.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// A kernel raised a numeric or shape fault. The run's outputs are
    /// discarded.
    #[error("Node '{node}' failed on {provider}: {source}")]
    KernelExecution {
        node: String,
        provider: ProviderId,
        #[source]
        source: ortex_core::Error,
    },

    /// A cancellation flag was observed between nodes.
    #[error("Run cancelled after {completed} of {total} nodes")]
    Cancelled { completed: usize, total: usize },

    /// Caller-supplied inputs don't match the plan.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Tensor not found.
    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    /// Provider configuration or data transfer failed.
    #[error("Placement failed: {0}")]
    Placement(String),
}

impl RuntimeError {
    /// Kind of the underlying core error, for load and kernel failures.
    pub fn core_kind(&self) -> Option<ortex_core::ErrorKind> {
        match self {
            RuntimeError::Load(e) | RuntimeError::KernelExecution { source: e, .. } => Some(e.kind()),
            _ => None,
        }
    }
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
