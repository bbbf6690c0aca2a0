//! Loader-facing graph model for ortex.
//!
//! A model loader turns a model file into a [`Graph`]: nodes carrying a
//! domain, an operator type and an opset version, plus the tensors they
//! read and write. Parsing model files is not part of this crate; it only
//! defines the structure the rest of the runtime consumes and the checks
//! every loader output must pass.
//!
//! # Example
//!
//! ```
//! use ortex_graph::{DataType, Graph, Node, TensorInfo, TensorKind, TensorShape};
//!
//! let mut graph = Graph::new();
//! graph.add_tensor(TensorInfo::new("x", DataType::F32, TensorShape::Static(vec![4]), TensorKind::Input));
//! graph.add_tensor(TensorInfo::new("y", DataType::F32, TensorShape::Static(vec![4]), TensorKind::Output));
//! graph.add_node(
//!     Node::new("FastGelu")
//!         .with_domain("com.my_virtual_npu")
//!         .with_inputs(["x"])
//!         .with_outputs(["y"]),
//! );
//! graph.import_opset("com.my_virtual_npu", 1);
//! graph.inputs = vec!["x".to_string()];
//! graph.outputs = vec!["y".to_string()];
//! graph.validate()?;
//! # Ok::<(), ortex_graph::GraphError>(())
//! ```

use thiserror::Error;

pub mod graph;

pub use graph::{
    AttributeValue, DataType, Graph, GraphMetadata, Node, NodeId, TensorId, TensorInfo,
    TensorKind, TensorShape,
};

/// Domain string ONNX uses as a synonym for the built-in domain.
pub const ONNX_DOMAIN_ALIAS: &str = "ai.onnx";

/// Map the `ai.onnx` alias onto the built-in domain `""`.
///
/// Every other domain string is returned untouched: custom domains are
/// never folded into the built-in namespace.
pub fn canonical_domain(domain: &str) -> &str {
    if domain == ONNX_DOMAIN_ALIAS { "" } else { domain }
}

/// Errors raised while validating or ordering a loaded graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Missing tensor: {0}")]
    MissingTensor(String),

    #[error("Graph contains a cycle through node '{0}'")]
    Cycle(String),

    #[error(
        "Node '{node}' declares opset {declared} for domain '{domain}' but the model imports {imported}"
    )]
    OpsetMismatch {
        node: String,
        domain: String,
        declared: u32,
        imported: u32,
    },
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
