//! Common test utilities for operator tests.
//!
//! Graph builders plus a single-node runner that resolves a node against a
//! registry and invokes its kernel directly.

#![allow(dead_code)]

use ortex_core::{OperatorRegistry, Resolver, Result, Tensor};
use ortex_graph::{AttributeValue, DataType, Graph, Node, TensorInfo, TensorKind, TensorShape};

/// Create a single-input, single-output graph for unary operations.
///
/// Graph structure:
/// - Input: input:[dtype;shape]
/// - Operation: domain::OpType(input) -> output
/// - Output: output:[dtype;shape]
pub fn make_unary_graph(
    domain: &str,
    op_type: &str,
    opset: u32,
    dtype: DataType,
    shape: &[usize],
) -> Graph {
    let mut graph = Graph::new();
    add_tensor(&mut graph, "input", dtype, shape, TensorKind::Input);
    add_tensor(&mut graph, "output", dtype, shape, TensorKind::Output);

    graph.add_node(
        Node::new(op_type)
            .with_name(format!("{}_op", op_type.to_lowercase()))
            .with_domain(domain)
            .with_opset(opset)
            .with_inputs(["input"])
            .with_outputs(["output"]),
    );

    graph.inputs = vec!["input".to_string()];
    graph.outputs = vec!["output".to_string()];
    graph.import_opset(domain, opset);
    graph.metadata.name = format!("test_{}_graph", op_type.to_lowercase());
    graph.metadata.producer_name = "ortex_test".to_string();
    graph
}

/// Unary graph with an extra `bias` input of shape `bias_shape`.
pub fn make_bias_graph(
    domain: &str,
    op_type: &str,
    dtype: DataType,
    shape: &[usize],
    bias_shape: &[usize],
) -> Graph {
    let mut graph = make_unary_graph(domain, op_type, 1, dtype, shape);
    add_tensor(&mut graph, "bias", dtype, bias_shape, TensorKind::Input);
    graph.nodes[0].inputs.push("bias".to_string());
    graph.inputs.push("bias".to_string());
    graph
}

/// Create a two-input, one-output graph for binary operations.
pub fn make_binary_graph(
    op_type: &str,
    opset: u32,
    dtype: DataType,
    a_shape: &[usize],
    b_shape: &[usize],
    out_shape: &[usize],
) -> Graph {
    let mut graph = Graph::new();
    add_tensor(&mut graph, "a", dtype, a_shape, TensorKind::Input);
    add_tensor(&mut graph, "b", dtype, b_shape, TensorKind::Input);
    add_tensor(&mut graph, "c", dtype, out_shape, TensorKind::Output);

    graph.add_node(
        Node::new(op_type)
            .with_name(format!("{}_op", op_type.to_lowercase()))
            .with_opset(opset)
            .with_inputs(["a", "b"])
            .with_outputs(["c"]),
    );

    graph.inputs = vec!["a".to_string(), "b".to_string()];
    graph.outputs = vec!["c".to_string()];
    graph.import_opset("", opset);
    graph
}

pub fn add_tensor(graph: &mut Graph, name: &str, dtype: DataType, shape: &[usize], kind: TensorKind) {
    graph.add_tensor(TensorInfo::new(
        name,
        dtype,
        TensorShape::Static(shape.to_vec()),
        kind,
    ));
}

/// Set a string attribute on the graph's only node.
pub fn with_string_attr(mut graph: Graph, name: &str, value: &str) -> Graph {
    graph.nodes[0]
        .attributes
        .insert(name.to_string(), AttributeValue::String(value.to_string()));
    graph
}

/// Resolve node 0 of `graph` and run its kernel on `inputs`.
pub fn run_single_node(graph: &Graph, registry: &OperatorRegistry, inputs: &[Tensor]) -> Result<Tensor> {
    let resolved = Resolver::new(registry).resolve(graph, 0)?;
    let metas: Vec<_> = inputs.iter().map(Tensor::meta).collect();
    let out_metas = resolved.kernel.infer_outputs(&metas)?;
    let mut output = Tensor::zeros(&out_metas[0]);
    let views: Vec<_> = inputs.iter().map(Tensor::view).collect();
    resolved.kernel.compute(&views, &mut [output.view_mut()])?;
    Ok(output)
}
