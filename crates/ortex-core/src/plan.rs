//! Resolved execution plans.
//!
//! An [`ExecutionPlan`] is the output of resolving a whole graph: the nodes
//! in the loader's order, each bound to its kernel, plus the register-file
//! layout the dispatcher executes against.

use crate::{Domain, Error, OperatorRegistry, ResolvedNode, Resolver, Result, Tensor, TensorSlot};
use ortex_graph::{DataType, Graph, TensorKind, TensorShape};
use std::collections::HashSet;
use std::fmt;

/// Static description of one register-file slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub name: String,
    pub dtype: DataType,
    pub shape: TensorShape,
    pub kind: TensorKind,
}

/// A node reads a tensor nothing earlier in the plan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyViolation {
    pub node: String,
    pub tensor: String,
}

impl fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node '{}' reads '{}' before any earlier node or input provides it",
            self.node, self.tensor
        )
    }
}

/// A graph fully resolved against a registry, ready to dispatch.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub name: String,
    /// Resolved nodes in execution order.
    pub nodes: Vec<ResolvedNode>,
    /// One entry per tensor slot, indexed by [`TensorSlot`].
    pub slots: Vec<SlotInfo>,
    pub inputs: Vec<TensorSlot>,
    pub outputs: Vec<TensorSlot>,
    /// Constant tensors loaded into their slots before every run.
    pub initializers: Vec<(TensorSlot, Tensor)>,
}

impl ExecutionPlan {
    /// Resolve `graph` against `registry`.
    ///
    /// Validates the graph, checks every opset import against the versions
    /// the registry supports for that domain, then resolves each node in
    /// the graph's order. The node order is kept as given; see
    /// [`ExecutionPlan::validate_order`].
    #[tracing::instrument(skip_all, fields(graph = %graph.metadata.name, nodes = graph.nodes.len()))]
    pub fn build(graph: &Graph, registry: &OperatorRegistry) -> Result<Self> {
        graph.validate()?;
        check_opset_imports(graph, registry)?;

        let nodes = Resolver::new(registry).resolve_all(graph)?;

        let slots = graph
            .tensor_info
            .iter()
            .map(|info| SlotInfo {
                name: info.name.clone(),
                dtype: info.dtype,
                shape: info.shape.clone(),
                kind: info.kind,
            })
            .collect();

        let inputs = graph
            .inputs
            .iter()
            .map(|name| graph.tensor_id(name))
            .collect::<ortex_graph::Result<Vec<_>>>()?;
        let outputs = graph
            .outputs
            .iter()
            .map(|name| graph.tensor_id(name))
            .collect::<ortex_graph::Result<Vec<_>>>()?;

        let mut initializers = Vec::new();
        for (slot, info) in graph.tensor_info.iter().enumerate() {
            if let Some(bytes) = &info.initializer {
                let shape = info.shape.as_static().ok_or_else(|| {
                    Error::Shape(format!("initializer '{}' must have a static shape", info.name))
                })?;
                initializers.push((slot, Tensor::from_le_bytes(bytes, info.dtype, shape)?));
            }
        }

        tracing::debug!(
            nodes = nodes.len(),
            slots = graph.tensor_info.len(),
            initializers = initializers.len(),
            "execution plan built"
        );

        Ok(Self {
            name: graph.metadata.name.clone(),
            nodes,
            slots,
            inputs,
            outputs,
            initializers,
        })
    }

    /// Check that every node only reads tensors produced by an earlier node,
    /// supplied as a plan input, or held by an initializer.
    pub fn validate_order(&self) -> std::result::Result<(), DependencyViolation> {
        let mut available: HashSet<TensorSlot> = self.inputs.iter().copied().collect();
        available.extend(self.initializers.iter().map(|(slot, _)| *slot));

        for node in &self.nodes {
            if let Some(&missing) = node.inputs.iter().find(|slot| !available.contains(slot)) {
                return Err(DependencyViolation {
                    node: node.name.clone(),
                    tensor: self.slot_name(missing).to_string(),
                });
            }
            available.extend(node.outputs.iter().copied());
        }

        Ok(())
    }

    /// Slot of the tensor called `name`.
    pub fn slot(&self, name: &str) -> Option<TensorSlot> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn slot_name(&self, slot: TensorSlot) -> &str {
        self.slots.get(slot).map_or("<unknown>", |s| s.name.as_str())
    }

    /// Names of the plan inputs, in order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|&slot| self.slot_name(slot))
    }

    /// Names of the plan outputs, in order.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|&slot| self.slot_name(slot))
    }
}

fn check_opset_imports(graph: &Graph, registry: &OperatorRegistry) -> Result<()> {
    for (domain, &version) in &graph.opset_imports {
        let domain = Domain::new(domain);
        match registry.domain_versions(&domain) {
            Some(supported) if !supported.contains(version) => {
                return Err(Error::DomainVersionUnsupported {
                    domain,
                    version,
                    supported,
                });
            }
            Some(_) => {}
            // Nodes from an unknown domain fail resolution with NotFound.
            None => tracing::debug!(%domain, version, "opset import for unregistered domain"),
        }
    }
    Ok(())
}
