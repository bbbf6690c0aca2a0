//! Common test utilities for runtime tests.
//!
//! Graph builders for the mixed-domain model and a recording operator whose
//! kernel counts invocations, can fail, or can raise a cancellation flag.

#![allow(dead_code)]

use ortex_core::{
    DataType, Error, Kernel, KernelCtx, OperatorDescriptor, OperatorRegistry, Result, Tensor, TensorMeta,
    TensorView, TensorViewMut,
};
use ortex_graph::{Graph, Node, TensorInfo, TensorKind, TensorShape};
use ortex_runtime::CancellationFlag;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CUSTOM_DOMAIN: &str = "com.my_virtual_npu";
pub const RECORD_DOMAIN: &str = "com.example";

pub const MIXED_BIAS: [f32; 4] = [0.1, -0.2, 0.3, 0.0];

pub fn add_tensor(graph: &mut Graph, name: &str, shape: &[usize], kind: TensorKind) {
    graph.add_tensor(TensorInfo::new(
        name,
        DataType::F32,
        TensorShape::Static(shape.to_vec()),
        kind,
    ));
}

pub fn add_initializer(graph: &mut Graph, name: &str, shape: &[usize], values: Vec<f32>) {
    let mut info = TensorInfo::new(
        name,
        DataType::F32,
        TensorShape::Static(shape.to_vec()),
        TensorKind::Weight,
    );
    info.initializer = Some(Tensor::from_vec(values, shape).as_bytes().to_vec());
    graph.add_tensor(info);
}

/// Built-in Add, custom-domain FastGelu and built-in MatMul in one chain.
///
/// Graph structure:
/// - Input: input:[f32;1,4]
/// - Weights: bias:[f32;4] = MIXED_BIAS, weight:[f32;4,4] = identity
/// - add: Add(input, bias) -> added
/// - fast_gelu: com.my_virtual_npu::FastGelu(added) -> activated
/// - matmul: MatMul(activated, weight) -> output
///
/// Nodes are listed consumer-first; `custom_opset` is the version both the
/// FastGelu node and the custom-domain import declare.
pub fn make_mixed_graph_unsorted(custom_opset: u32) -> Graph {
    let mut graph = Graph::new();
    graph.metadata.name = "mixed_domain".to_string();
    graph.metadata.producer_name = "ortex_test".to_string();

    add_tensor(&mut graph, "input", &[1, 4], TensorKind::Input);
    add_initializer(&mut graph, "bias", &[4], MIXED_BIAS.to_vec());
    let mut identity = vec![0.0f32; 16];
    for i in 0..4 {
        identity[i * 4 + i] = 1.0;
    }
    add_initializer(&mut graph, "weight", &[4, 4], identity);
    add_tensor(&mut graph, "added", &[1, 4], TensorKind::Intermediate);
    add_tensor(&mut graph, "activated", &[1, 4], TensorKind::Intermediate);
    add_tensor(&mut graph, "output", &[1, 4], TensorKind::Output);

    graph.add_node(
        Node::new("MatMul")
            .with_name("matmul")
            .with_opset(13)
            .with_inputs(["activated", "weight"])
            .with_outputs(["output"]),
    );
    graph.add_node(
        Node::new("FastGelu")
            .with_name("fast_gelu")
            .with_domain(CUSTOM_DOMAIN)
            .with_opset(custom_opset)
            .with_inputs(["added"])
            .with_outputs(["activated"]),
    );
    graph.add_node(
        Node::new("Add")
            .with_name("add")
            .with_opset(13)
            .with_inputs(["input", "bias"])
            .with_outputs(["added"]),
    );

    graph.inputs = vec!["input".to_string()];
    graph.outputs = vec!["output".to_string()];
    graph.import_opset("", 13);
    graph.import_opset(CUSTOM_DOMAIN, custom_opset);
    graph
}

/// The mixed graph in dependency order.
pub fn make_mixed_graph() -> Graph {
    let mut graph = make_mixed_graph_unsorted(1);
    graph.sort_nodes().expect("mixed graph is acyclic");
    graph
}

/// One input read by two custom FastGelu nodes, and one built-in node
/// reading the same value twice.
///
/// Graph structure:
/// - Input: x:[f32;4]
/// - gelu_a: com.my_virtual_npu::FastGelu(x) -> y1
/// - gelu_b: com.my_virtual_npu::FastGelu(x) -> y2
/// - double: Add(y1, y1) -> z
/// - Outputs: y1, y2, z
pub fn make_fan_out_graph() -> Graph {
    let mut graph = Graph::new();
    graph.metadata.name = "fan_out".to_string();

    add_tensor(&mut graph, "x", &[4], TensorKind::Input);
    for name in ["y1", "y2", "z"] {
        add_tensor(&mut graph, name, &[4], TensorKind::Output);
    }
    for (name, output) in [("gelu_a", "y1"), ("gelu_b", "y2")] {
        graph.add_node(
            Node::new("FastGelu")
                .with_name(name)
                .with_domain(CUSTOM_DOMAIN)
                .with_inputs(["x"])
                .with_outputs([output]),
        );
    }
    graph.add_node(
        Node::new("Add")
            .with_name("double")
            .with_opset(13)
            .with_inputs(["y1", "y1"])
            .with_outputs(["z"]),
    );

    graph.inputs = vec!["x".to_string()];
    graph.outputs = vec!["y1".to_string(), "y2".to_string(), "z".to_string()];
    graph.import_opset("", 13);
    graph.import_opset(CUSTOM_DOMAIN, 1);
    graph
}

/// `x -> FastGelu(x, bias) -> y` where no length is known until run time.
pub fn make_dynamic_bias_graph() -> Graph {
    let mut graph = Graph::new();
    graph.metadata.name = "dynamic_bias".to_string();

    for (name, kind) in [
        ("x", TensorKind::Input),
        ("bias", TensorKind::Input),
        ("y", TensorKind::Output),
    ] {
        graph.add_tensor(TensorInfo::new(
            name,
            DataType::F32,
            TensorShape::Dynamic(vec![None]),
            kind,
        ));
    }
    graph.add_node(
        Node::new("FastGelu")
            .with_name("biased_gelu")
            .with_domain(CUSTOM_DOMAIN)
            .with_inputs(["x", "bias"])
            .with_outputs(["y"]),
    );

    graph.inputs = vec!["x".to_string(), "bias".to_string()];
    graph.outputs = vec!["y".to_string()];
    graph.import_opset(CUSTOM_DOMAIN, 1);
    graph
}

/// `len` recording nodes in a chain: x -> record_0 -> t0 -> ... -> y.
pub fn make_record_chain(len: usize, shape: &[usize]) -> Graph {
    let mut graph = Graph::new();
    graph.metadata.name = "record_chain".to_string();

    add_tensor(&mut graph, "x", shape, TensorKind::Input);
    let mut previous = "x".to_string();
    for i in 0..len {
        let (output, kind) = if i + 1 == len {
            ("y".to_string(), TensorKind::Output)
        } else {
            (format!("t{i}"), TensorKind::Intermediate)
        };
        add_tensor(&mut graph, &output, shape, kind);
        graph.add_node(
            Node::new("Record")
                .with_name(format!("record_{i}"))
                .with_domain(RECORD_DOMAIN)
                .with_inputs([previous.as_str()])
                .with_outputs([output.as_str()]),
        );
        previous = output;
    }

    graph.inputs = vec!["x".to_string()];
    graph.outputs = vec!["y".to_string()];
    graph.import_opset(RECORD_DOMAIN, 1);
    graph
}

/// Behavior shared by every recording kernel created from one registry.
#[derive(Debug, Clone, Default)]
pub struct RecordBehavior {
    pub calls: Arc<AtomicUsize>,
    /// Raise this flag from inside the n-th call (1-based).
    pub cancel_on: Option<(usize, CancellationFlag)>,
    /// Fail the n-th call (1-based).
    pub fail_on: Option<usize>,
}

impl RecordBehavior {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Copies its input and records the call.
#[derive(Debug)]
struct RecordKernel {
    behavior: RecordBehavior,
}

impl Kernel for RecordKernel {
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
        Ok(vec![inputs[0].clone()])
    }

    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
        let call = self.behavior.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, flag)) = &self.behavior.cancel_on
            && *at == call
        {
            flag.cancel();
        }
        if self.behavior.fail_on == Some(call) {
            return Err(Error::Kernel(format!("record failed on call {call}")));
        }
        outputs[0]
            .as_mut_slice::<f32>()?
            .copy_from_slice(inputs[0].as_slice::<f32>()?);
        Ok(())
    }
}

/// A registry holding only `com.example::Record` v1.
pub fn recording_registry(behavior: RecordBehavior) -> Arc<OperatorRegistry> {
    let descriptor = OperatorDescriptor::builder(RECORD_DOMAIN, "Record")
        .since(1)
        .input("X")
        .output("Y")
        .types([DataType::F32])
        .doc("Identity that records its invocations.")
        .build();

    let mut registry = OperatorRegistry::new();
    registry
        .register(descriptor, move |_ctx: &KernelCtx<'_>| -> Result<Box<dyn Kernel>> {
            Ok(Box::new(RecordKernel {
                behavior: behavior.clone(),
            }))
        })
        .expect("empty registry accepts the recorder");
    registry.freeze()
}

pub fn registry() -> Arc<OperatorRegistry> {
    ortex_operators::default_operator_registry().expect("default registry builds")
}

/// What the mixed graph computes for `input`, evaluated by hand.
pub fn mixed_expected(input: &[f32]) -> Vec<f32> {
    input
        .iter()
        .zip(MIXED_BIAS.iter().cycle())
        .map(|(&x, &b)| ortex_operators::math::fast_gelu_f32(x + b))
        .collect()
}
