//! Graph representation handed over by the model loader.
//!
//! The resolver and the dispatcher consume this structure. It carries no
//! file format; producing a `Graph` from a model file is the loader's job.

use crate::{GraphError, Result, canonical_domain};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

/// Index of a node in `Graph::nodes`.
pub type NodeId = usize;

/// Index of a tensor in `Graph::tensor_info`.
pub type TensorId = usize;

/// Loader-produced graph of a model.
#[derive(Debug, Clone)]
pub struct Graph {
    /// All nodes (operations) in the graph, in loader order.
    pub nodes: Vec<Node>,

    /// Tensor name -> index into `tensor_info`.
    pub tensors: HashMap<String, TensorId>,

    /// Tensor metadata.
    pub tensor_info: Vec<TensorInfo>,

    /// Tensors the caller supplies on every run.
    pub inputs: Vec<String>,

    /// Tensors returned to the caller.
    pub outputs: Vec<String>,

    /// Opset version imported for each domain (`""` is the built-in domain).
    pub opset_imports: BTreeMap<String, u32>,

    /// Graph metadata.
    pub metadata: GraphMetadata,
}

/// Descriptive fields copied from the model file.
#[derive(Debug, Clone, Default)]
pub struct GraphMetadata {
    /// Graph name.
    pub name: String,

    /// Producer name.
    pub producer_name: String,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            tensors: HashMap::new(),
            tensor_info: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            opset_imports: BTreeMap::new(),
            metadata: GraphMetadata::default(),
        }
    }

    /// Index of the tensor called `name`.
    pub fn tensor_id(&self, name: &str) -> Result<TensorId> {
        self.tensors
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::MissingTensor(name.to_string()))
    }

    pub fn tensor(&self, id: TensorId) -> Result<&TensorInfo> {
        self.tensor_info
            .get(id)
            .ok_or_else(|| GraphError::InvalidGraph(format!("Invalid tensor ID: {id}")))
    }

    /// Register a tensor; its index is its `TensorId`.
    pub fn add_tensor(&mut self, info: TensorInfo) -> TensorId {
        let id = self.tensor_info.len();
        let name = info.name.clone();
        self.tensor_info.push(info);
        self.tensors.insert(name, id);
        id
    }

    /// Append a node after every existing one.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Record the opset version the model imports for `domain`.
    pub fn import_opset(&mut self, domain: &str, version: u32) {
        self.opset_imports
            .insert(canonical_domain(domain).to_string(), version);
    }

    /// Opset version imported for `domain`, if any.
    pub fn opset_version(&self, domain: &str) -> Option<u32> {
        self.opset_imports.get(canonical_domain(domain)).copied()
    }

    /// Structural checks a loaded graph must pass before resolution.
    ///
    /// Checks that every referenced tensor exists, that each tensor has at
    /// most one producing node, and that each node's declared opset version
    /// agrees with the model's import for its domain.
    pub fn validate(&self) -> Result<()> {
        for input in &self.inputs {
            self.tensor_id(input)?;
        }

        for output in &self.outputs {
            self.tensor_id(output)?;
        }

        let mut producers: HashMap<&str, &str> = HashMap::new();
        for node in &self.nodes {
            for input in &node.inputs {
                // ONNX uses "" for an absent optional input
                if !input.is_empty() {
                    self.tensor_id(input)?;
                }
            }
            for output in &node.outputs {
                if output.is_empty() {
                    continue;
                }
                self.tensor_id(output)?;
                if let Some(previous) = producers.insert(output, &node.name) {
                    return Err(GraphError::InvalidGraph(format!(
                        "Tensor '{output}' is produced by both '{previous}' and '{}'",
                        node.name
                    )));
                }
            }

            if let Some(imported) = self.opset_version(&node.domain)
                && imported != node.opset_version
            {
                return Err(GraphError::OpsetMismatch {
                    node: node.label(),
                    domain: node.domain.clone(),
                    declared: node.opset_version,
                    imported,
                });
            }
        }

        Ok(())
    }

    /// Compute a topological order of the nodes.
    ///
    /// Nodes are connected producer -> consumer through the tensors they
    /// share. Returns `GraphError::Cycle` if the data dependencies loop.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut dep_graph: DiGraph<NodeId, ()> = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..self.nodes.len())
            .map(|node_id| dep_graph.add_node(node_id))
            .collect();

        let mut tensor_producers: HashMap<&str, NodeId> = HashMap::new();
        for (node_id, node) in self.nodes.iter().enumerate() {
            for output in node.outputs.iter().filter(|o| !o.is_empty()) {
                tensor_producers.insert(output, node_id);
            }
        }

        for (consumer_id, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                if let Some(&producer_id) = tensor_producers.get(input.as_str()) {
                    dep_graph.add_edge(indices[producer_id], indices[consumer_id], ());
                }
            }
        }

        petgraph::algo::toposort(&dep_graph, None)
            .map(|order| order.into_iter().map(|idx| dep_graph[idx]).collect())
            .map_err(|cycle| GraphError::Cycle(self.nodes[dep_graph[cycle.node_id()]].label()))
    }

    /// Reorder `nodes` into a topological order.
    pub fn sort_nodes(&mut self) -> Result<()> {
        let order = self.topological_order()?;
        let mut slots: Vec<Option<Node>> = self.nodes.drain(..).map(Some).collect();
        self.nodes = order
            .into_iter()
            .filter_map(|node_id| slots[node_id].take())
            .collect();
        tracing::trace!(nodes = self.nodes.len(), "sorted graph nodes");
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// One operator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node name (may be empty).
    pub name: String,

    /// Operation type (e.g., "MatMul", "Add", "FastGelu").
    pub op_type: String,

    /// Domain the operation type lives in (`""` is the built-in domain).
    pub domain: String,

    /// Opset version the node was authored against.
    pub opset_version: u32,

    /// Input tensor names.
    pub inputs: Vec<String>,

    /// Output tensor names.
    pub outputs: Vec<String>,

    /// Node attributes.
    pub attributes: HashMap<String, AttributeValue>,
}

impl Node {
    /// Create a new node in the built-in domain.
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            op_type: op_type.into(),
            domain: String::new(),
            opset_version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_opset(mut self, version: u32) -> Self {
        self.opset_version = version;
        self
    }

    pub fn with_inputs<S: Into<String>>(mut self, inputs: impl IntoIterator<Item = S>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<S: Into<String>>(mut self, outputs: impl IntoIterator<Item = S>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Human-readable identity used in diagnostics: the node name, or
    /// `domain::op_type` when the loader left the name empty.
    pub fn label(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if self.domain.is_empty() {
            self.op_type.clone()
        } else {
            format!("{}::{}", self.domain, self.op_type)
        }
    }
}

/// Node attribute payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    String(String),
}

/// Declared type and shape of a named tensor.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    /// Tensor name.
    pub name: String,

    /// Element type.
    pub dtype: DataType,

    /// Tensor shape.
    pub shape: TensorShape,

    pub kind: TensorKind,

    /// Initializer data for weights, little-endian.
    pub initializer: Option<Vec<u8>>,
}

impl TensorInfo {
    pub fn new(name: impl Into<String>, dtype: DataType, shape: TensorShape, kind: TensorKind) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
            kind,
            initializer: None,
        }
    }
}

/// Tensor element types understood by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    F32,
    F16,
    F64,
    I64,
}

impl DataType {
    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            DataType::F16 => 2,
            DataType::F32 => 4,
            DataType::F64 | DataType::I64 => 8,
        }
    }

    /// ONNX-style type string, e.g. `tensor(float)`.
    pub fn type_str(&self) -> &'static str {
        match self {
            DataType::F32 => "tensor(float)",
            DataType::F16 => "tensor(float16)",
            DataType::F64 => "tensor(double)",
            DataType::I64 => "tensor(int64)",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_str())
    }
}

/// Declared tensor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorShape {
    /// Every dimension known.
    Static(Vec<usize>),

    /// Known rank; `None` marks a symbolic dimension.
    Dynamic(Vec<Option<usize>>),

    /// Unknown/unspecified shape.
    Unknown,
}

impl TensorShape {
    /// Dimensions, when all of them are known.
    pub fn as_static(&self) -> Option<&[usize]> {
        match self {
            TensorShape::Static(dims) => Some(dims),
            _ => None,
        }
    }
}

/// Role a tensor plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorKind {
    /// Model input (provided by the caller).
    Input,

    /// Model output (returned to the caller).
    Output,

    /// Static weight stored with the model.
    Weight,

    /// Produced by one node and consumed by others.
    Intermediate,
}
