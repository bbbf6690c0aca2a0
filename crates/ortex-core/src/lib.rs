//! Operator-extension core for ortex.
//!
//! This crate provides the pieces a runtime needs to host operators from
//! several namespaces side by side:
//! - Domains and opset version ranges (`Domain`, `VersionRange`)
//! - Immutable operator metadata (`OperatorDescriptor`)
//! - The kernel seam (`Kernel`, `KernelFactory`, `KernelCtx`)
//! - Tensors and the borrowed views kernels operate on
//! - The `OperatorRegistry` keyed by (domain, type, version range)
//! - The `Resolver` that binds graph nodes to kernels, and the
//!   `ExecutionPlan` it produces

pub mod broadcast;
pub mod descriptor;
pub mod domain;
pub mod kernel;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod tensor;

// Re-export commonly used types
pub use broadcast::{broadcast_shape, broadcast_source_index};
pub use descriptor::{DescriptorBuilder, FormalParam, OperatorDescriptor, OperatorKey};
pub use domain::{Domain, VersionRange};
pub use kernel::{Kernel, KernelCtx, KernelFactory};
pub use ortex_graph::DataType;
pub use plan::{DependencyViolation, ExecutionPlan, SlotInfo};
pub use registry::{OperatorRegistry, Registration};
pub use resolver::{ResolvedNode, Resolver, TensorSlot};
pub use tensor::{Element, Tensor, TensorData, TensorMeta, TensorSlice, TensorSliceMut, TensorView, TensorViewMut};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for registration, resolution and kernel execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Operator {key} is already registered for opsets {existing}; cannot register {requested}")]
    Conflict {
        key: OperatorKey,
        existing: VersionRange,
        requested: VersionRange,
    },

    #[error("Operator {key} declares the empty opset range {versions}")]
    EmptyVersionRange { key: OperatorKey, versions: VersionRange },

    #[error("No operator '{op_type}' is registered in domain '{domain}'")]
    NotFound { domain: Domain, op_type: String },

    #[error(
        "Operator '{op_type}' in domain '{domain}' has no kernel for opset {version} (registered: {})",
        display_ranges(.registered)
    )]
    VersionUnsupported {
        domain: Domain,
        op_type: String,
        version: u32,
        registered: Vec<VersionRange>,
    },

    #[error("Model imports opset {version} of domain '{domain}' but this runtime supports {supported}")]
    DomainVersionUnsupported {
        domain: Domain,
        version: u32,
        supported: VersionRange,
    },

    #[error("Failed to resolve node '{node}': {source}")]
    Resolution {
        node: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Kernel error: {0}")]
    Kernel(String),

    #[error(transparent)]
    Graph(#[from] ortex_graph::GraphError),
}

/// Coarse classification of an [`Error`], looking through resolution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    InvalidDescriptor,
    NotFound,
    VersionUnsupported,
    TypeMismatch,
    Shape,
    Kernel,
    Graph,
}

impl Error {
    /// Wrap `source` with the identity of the node being resolved.
    pub fn resolution(node: impl Into<String>, source: Error) -> Self {
        Error::Resolution {
            node: node.into(),
            source: Box::new(source),
        }
    }

    /// What went wrong, independent of where it was annotated.
    ///
    /// A `Resolution` error reports the kind of the failure it wraps, so a
    /// caller can tell "upgrade the operator set" (`VersionUnsupported`)
    /// apart from "this operator never existed" (`NotFound`).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::EmptyVersionRange { .. } => ErrorKind::InvalidDescriptor,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::VersionUnsupported { .. } | Error::DomainVersionUnsupported { .. } => {
                ErrorKind::VersionUnsupported
            }
            Error::Resolution { source, .. } => source.kind(),
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Shape(_) => ErrorKind::Shape,
            Error::Kernel(_) => ErrorKind::Kernel,
            Error::Graph(_) => ErrorKind::Graph,
        }
    }
}

fn display_ranges(ranges: &[VersionRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_resolution() {
        let inner = Error::VersionUnsupported {
            domain: Domain::new("com.my_virtual_npu"),
            op_type: "FastGelu".to_string(),
            version: 2,
            registered: vec![VersionRange::single(1)],
        };
        let wrapped = Error::resolution("gelu", inner);
        assert_eq!(wrapped.kind(), ErrorKind::VersionUnsupported);

        let message = wrapped.to_string();
        assert!(message.contains("gelu"), "{message}");
        assert!(message.contains("opset 2"), "{message}");
        assert!(message.contains("registered: 1"), "{message}");
    }

    #[test]
    fn test_not_found_kind() {
        let err = Error::resolution(
            "mystery",
            Error::NotFound {
                domain: Domain::new("com.example"),
                op_type: "Mystery".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
