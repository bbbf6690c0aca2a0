//! Plan dispatcher.
//!
//! Executes an [`ExecutionPlan`] node by node against a per-run register
//! file. The plan itself is never mutated by a run, so one dispatcher can
//! serve any number of concurrent `run` calls.

use crate::error::{Result, RuntimeError};
use crate::provider::{PlacementPolicy, ProviderId};
use ortex_core::{ExecutionPlan, Tensor, TensorSlot, TensorView};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag that stops a run before its next node.
///
/// Cancellation is observed only between node invocations; a kernel that
/// has started always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancellation: Option<CancellationFlag>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub nodes_executed: usize,
    /// Tensors copied across a provider boundary, including final outputs
    /// brought back to the host provider.
    pub transfers: usize,
    pub elapsed: Duration,
}

/// A value in the register file and the provider whose memory holds it.
#[derive(Debug)]
struct Resident {
    tensor: Tensor,
    location: ProviderId,
}

/// Executes a resolved plan using register-based tensor routing.
///
/// Each node's provider is assigned once, when the dispatcher is built.
#[derive(Debug)]
pub struct Dispatcher {
    plan: ExecutionPlan,
    assignments: Vec<ProviderId>,
    placement: Arc<dyn PlacementPolicy>,
    validate_plan: bool,
}

impl Dispatcher {
    /// Assign a provider to every node of `plan`.
    pub fn new(plan: ExecutionPlan, placement: Arc<dyn PlacementPolicy>, validate_plan: bool) -> Result<Self> {
        let assignments = plan
            .nodes
            .iter()
            .map(|node| placement.assign_provider(node))
            .collect::<Result<Vec<_>>>()?;

        for (node, provider) in plan.nodes.iter().zip(&assignments) {
            tracing::debug!(node = %node.name, operator = %node.descriptor.key(), %provider, "node placed");
        }

        Ok(Self {
            plan,
            assignments,
            placement,
            validate_plan,
        })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Node labels paired with their assigned provider, in plan order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &ProviderId)> {
        self.plan
            .nodes
            .iter()
            .map(|node| node.name.as_str())
            .zip(&self.assignments)
    }

    /// Execute the plan with named inputs, returning named outputs.
    ///
    /// Either every node runs and all outputs are returned, or the run
    /// fails and nothing it computed is observable.
    #[tracing::instrument(skip_all, fields(plan = %self.plan.name))]
    pub fn run(&self, inputs: &[(&str, Tensor)], options: &RunOptions) -> Result<(HashMap<String, Tensor>, RunStats)> {
        let started = Instant::now();

        if self.validate_plan {
            self.plan
                .validate_order()
                .map_err(|violation| RuntimeError::InvalidPlan(violation.to_string()))?;
        }

        let host = ProviderId::cpu();
        let mut registers: Vec<Option<Resident>> = Vec::with_capacity(self.plan.slots.len());
        registers.resize_with(self.plan.slots.len(), || None);

        for (slot, tensor) in &self.plan.initializers {
            registers[*slot] = Some(Resident {
                tensor: tensor.clone(),
                location: host.clone(),
            });
        }
        self.bind_inputs(inputs, &mut registers, &host)?;

        let mut stats = RunStats::default();
        let total = self.plan.nodes.len();
        // Values already copied onto a provider during this run
        let mut copies: HashMap<(TensorSlot, ProviderId), Tensor> = HashMap::new();

        for (node, provider) in self.plan.nodes.iter().zip(&self.assignments) {
            if options.cancellation.as_ref().is_some_and(CancellationFlag::is_cancelled) {
                tracing::debug!(completed = stats.nodes_executed, total, "run cancelled");
                return Err(RuntimeError::Cancelled {
                    completed: stats.nodes_executed,
                    total,
                });
            }

            // Bring inputs onto this node's provider
            for &slot in &node.inputs {
                let key = (slot, provider.clone());
                if copies.contains_key(&key) {
                    continue;
                }
                let resident = resident(&registers, slot, &node.name, &self.plan)?;
                if let Some(copy) = self
                    .placement
                    .copy_if_needed(&resident.tensor, &resident.location, provider)?
                {
                    copies.insert(key, copy);
                    stats.transfers += 1;
                }
            }

            let input_tensors = node
                .inputs
                .iter()
                .map(|&slot| match copies.get(&(slot, provider.clone())) {
                    Some(copy) => Ok(copy),
                    None => resident(&registers, slot, &node.name, &self.plan).map(|r| &r.tensor),
                })
                .collect::<Result<Vec<&Tensor>>>()?;

            let outputs = self.invoke(node, provider, &input_tensors)?;
            drop(input_tensors);

            for (slot, tensor) in node.outputs.iter().zip(outputs) {
                registers[*slot] = Some(Resident {
                    tensor,
                    location: provider.clone(),
                });
            }
            stats.nodes_executed += 1;
        }

        let mut results = HashMap::with_capacity(self.plan.outputs.len());
        for &slot in &self.plan.outputs {
            let name = self.plan.slot_name(slot);
            let resident = registers[slot]
                .take()
                .ok_or_else(|| RuntimeError::TensorNotFound(format!("Output '{name}' was never produced")))?;
            let tensor = if let Some(copy) = copies.remove(&(slot, host.clone())) {
                copy
            } else if let Some(copy) = self
                .placement
                .copy_if_needed(&resident.tensor, &resident.location, &host)?
            {
                stats.transfers += 1;
                copy
            } else {
                resident.tensor
            };
            results.insert(name.to_string(), tensor);
        }

        stats.elapsed = started.elapsed();
        tracing::debug!(
            nodes = stats.nodes_executed,
            transfers = stats.transfers,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "run complete"
        );
        Ok((results, stats))
    }

    /// Write caller inputs into their registers after checking them
    /// against the plan's declared types and static shapes.
    fn bind_inputs(&self, inputs: &[(&str, Tensor)], registers: &mut [Option<Resident>], host: &ProviderId) -> Result<()> {
        for (name, tensor) in inputs {
            let slot = self
                .plan
                .inputs
                .iter()
                .copied()
                .find(|&slot| self.plan.slot_name(slot) == *name)
                .ok_or_else(|| RuntimeError::Input(format!("Input '{name}' not found in model")))?;

            let info = &self.plan.slots[slot];
            if tensor.dtype() != info.dtype {
                return Err(RuntimeError::Input(format!(
                    "Input '{name}' must be {}, got {}",
                    info.dtype,
                    tensor.dtype()
                )));
            }
            if let Some(shape) = info.shape.as_static()
                && shape != tensor.shape()
            {
                return Err(RuntimeError::Input(format!(
                    "Input '{name}' must have shape {shape:?}, got {:?}",
                    tensor.shape()
                )));
            }

            registers[slot] = Some(Resident {
                tensor: tensor.clone(),
                location: host.clone(),
            });
        }

        if let Some(&missing) = self.plan.inputs.iter().find(|&&slot| registers[slot].is_none()) {
            return Err(RuntimeError::Input(format!(
                "Input '{}' was not provided",
                self.plan.slot_name(missing)
            )));
        }
        Ok(())
    }

    /// Allocate outputs and call the node's kernel once.
    fn invoke(&self, node: &ortex_core::ResolvedNode, provider: &ProviderId, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let fail = |source: ortex_core::Error| {
            tracing::warn!(node = %node.name, %provider, error = %source, "kernel failed");
            RuntimeError::KernelExecution {
                node: node.name.clone(),
                provider: provider.clone(),
                source,
            }
        };

        let metas: Vec<_> = inputs.iter().map(|t| t.meta()).collect();
        let output_metas = node.kernel.infer_outputs(&metas).map_err(fail)?;
        if output_metas.len() != node.outputs.len() {
            return Err(fail(ortex_core::Error::Kernel(format!(
                "kernel returned {} output shapes but the node has {} outputs",
                output_metas.len(),
                node.outputs.len()
            ))));
        }

        let mut outputs: Vec<Tensor> = output_metas.iter().map(Tensor::zeros).collect();
        let views: Vec<TensorView<'_>> = inputs.iter().map(|t| t.view()).collect();
        let mut output_views: Vec<_> = outputs.iter_mut().map(Tensor::view_mut).collect();

        tracing::trace!(node = %node.name, %provider, "invoking kernel");
        node.kernel.compute(&views, &mut output_views).map_err(fail)?;
        drop(output_views);

        Ok(outputs)
    }
}

fn resident<'r>(
    registers: &'r [Option<Resident>],
    slot: TensorSlot,
    node: &str,
    plan: &ExecutionPlan,
) -> Result<&'r Resident> {
    registers[slot].as_ref().ok_or_else(|| {
        RuntimeError::InvalidPlan(format!(
            "register for '{}' is empty when dispatching '{node}'; \
             no earlier node or input provides it",
            plan.slot_name(slot)
        ))
    })
}
