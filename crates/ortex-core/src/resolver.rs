//! Binding graph nodes to registered kernels.

use crate::{DataType, Domain, Error, Kernel, KernelCtx, OperatorDescriptor, OperatorRegistry, Result, TensorMeta};
use ortex_graph::{Graph, Node, NodeId};
use std::fmt;
use std::sync::Arc;

/// Index of a value in a plan's register file (the graph's tensor id).
pub type TensorSlot = usize;

/// A graph node bound to exactly one descriptor and kernel instance.
#[derive(Clone)]
pub struct ResolvedNode {
    pub node_id: NodeId,
    /// Diagnostic label of the node.
    pub name: String,
    pub descriptor: Arc<OperatorDescriptor>,
    pub kernel: Arc<dyn Kernel>,
    /// Present inputs in declaration order.
    pub inputs: Vec<TensorSlot>,
    pub outputs: Vec<TensorSlot>,
}

impl fmt::Debug for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNode")
            .field("node_id", &self.node_id)
            .field("name", &self.name)
            .field("operator", self.descriptor.key())
            .field("versions", &self.descriptor.versions())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Two resolutions are equal when they bind the same node to the same
/// registered descriptor (by identity) with the same wiring.
impl PartialEq for ResolvedNode {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
            && Arc::ptr_eq(&self.descriptor, &other.descriptor)
            && self.inputs == other.inputs
            && self.outputs == other.outputs
    }
}

/// Resolves graph nodes against a registry.
///
/// Resolution is a pure function of the node and the registry contents:
/// resolving the same node twice yields equal results.
pub struct Resolver<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Resolve one node.
    ///
    /// Performs exactly one registry lookup for the node's
    /// (domain, op_type, opset_version), then checks arity, element types
    /// and, where input shapes are static, shape compatibility. Any failure
    /// is reported as `Error::Resolution` carrying the node's label.
    #[tracing::instrument(level = "debug", skip(self, graph))]
    pub fn resolve(&self, graph: &Graph, node_id: NodeId) -> Result<ResolvedNode> {
        let node = graph.nodes.get(node_id).ok_or_else(|| {
            Error::Graph(ortex_graph::GraphError::InvalidGraph(format!(
                "Invalid node ID: {node_id}"
            )))
        })?;
        self.resolve_node(graph, node_id, node)
            .map_err(|e| Error::resolution(node.label(), e))
    }

    /// Resolve every node in graph order.
    pub fn resolve_all(&self, graph: &Graph) -> Result<Vec<ResolvedNode>> {
        (0..graph.nodes.len())
            .map(|node_id| self.resolve(graph, node_id))
            .collect()
    }

    fn resolve_node(&self, graph: &Graph, node_id: NodeId, node: &Node) -> Result<ResolvedNode> {
        let domain = Domain::new(&node.domain);
        let registration = self.registry.lookup(&domain, &node.op_type, node.opset_version)?;
        let descriptor = &registration.descriptor;

        let input_names = present_inputs(node)?;
        descriptor.check_arity(input_names.len(), node.outputs.len())?;

        let mut inputs = Vec::with_capacity(input_names.len());
        let mut input_types = Vec::with_capacity(input_names.len());
        let mut static_metas = Vec::with_capacity(input_names.len());
        for name in &input_names {
            let id = graph.tensor_id(name)?;
            let info = graph.tensor(id)?;
            descriptor.check_type(info.dtype)?;
            inputs.push(id);
            input_types.push(info.dtype);
            if let Some(shape) = info.shape.as_static() {
                static_metas.push(TensorMeta::new(shape, info.dtype));
            }
        }
        check_uniform_type(&input_types)?;

        let outputs = node
            .outputs
            .iter()
            .map(|name| graph.tensor_id(name))
            .collect::<ortex_graph::Result<Vec<_>>>()?;
        for &id in &outputs {
            descriptor.check_type(graph.tensor(id)?.dtype)?;
        }

        let ctx = KernelCtx::new(node, descriptor, &input_types);
        let kernel: Arc<dyn Kernel> = Arc::from(registration.factory.create_kernel(&ctx)?);

        if static_metas.len() == input_names.len() {
            let inferred = kernel.infer_outputs(&static_metas)?;
            check_declared_outputs(graph, &outputs, &inferred)?;
        }

        tracing::trace!(
            operator = %descriptor.key(),
            versions = %descriptor.versions(),
            "resolved node"
        );

        Ok(ResolvedNode {
            node_id,
            name: node.label(),
            descriptor: Arc::clone(descriptor),
            kernel,
            inputs,
            outputs,
        })
    }
}

/// Input names with absent optional inputs dropped.
///
/// Only trailing inputs may be absent; a gap in the middle would shift the
/// positions the kernel sees.
fn present_inputs(node: &Node) -> Result<Vec<&str>> {
    let present = node
        .inputs
        .iter()
        .rposition(|name| !name.is_empty())
        .map_or(0, |last| last + 1);

    node.inputs[..present]
        .iter()
        .map(|name| {
            if name.is_empty() {
                Err(Error::Shape(
                    "only trailing optional inputs may be omitted".to_string(),
                ))
            } else {
                Ok(name.as_str())
            }
        })
        .collect()
}

fn check_uniform_type(types: &[DataType]) -> Result<()> {
    if let Some((first, rest)) = types.split_first()
        && let Some(other) = rest.iter().find(|t| *t != first)
    {
        return Err(Error::TypeMismatch {
            expected: first.type_str().to_string(),
            actual: other.type_str().to_string(),
        });
    }
    Ok(())
}

fn check_declared_outputs(graph: &Graph, outputs: &[usize], inferred: &[TensorMeta]) -> Result<()> {
    for (&id, meta) in outputs.iter().zip(inferred) {
        let info = graph.tensor(id)?;
        if info.dtype != meta.dtype {
            return Err(Error::TypeMismatch {
                expected: meta.dtype.type_str().to_string(),
                actual: info.dtype.type_str().to_string(),
            });
        }
        if let Some(declared) = info.shape.as_static()
            && declared != meta.shape.as_slice()
        {
            return Err(Error::Shape(format!(
                "output '{}' is declared {declared:?} but computes to {:?}",
                info.name, meta.shape
            )));
        }
    }
    Ok(())
}
