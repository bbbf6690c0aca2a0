//! Execution providers and node placement.
//!
//! Every provider in this runtime executes on the host, so a "transfer"
//! between providers is a copy into memory owned by the target. The
//! dispatcher never decides where a node runs or when data moves; it asks
//! a [`PlacementPolicy`].

use crate::error::{Result, RuntimeError};
use ortex_core::{OperatorKey, ResolvedNode, Tensor};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Name of an execution provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    /// The default host provider; claims every operator.
    pub const CPU: &'static str = "CPUExecutionProvider";
    /// The project's custom host provider; claims custom-domain operators.
    pub const MY_CPU: &'static str = "MyCpuExecutionProvider";

    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn cpu() -> Self {
        Self::new(Self::CPU)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which operators a provider is able to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Every operator.
    All,
    /// Exactly these `(domain, op_type)` pairs.
    Operators(HashSet<OperatorKey>),
}

/// An execution provider and its capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionProvider {
    pub id: ProviderId,
    pub capability: Capability,
}

impl ExecutionProvider {
    pub fn cpu() -> Self {
        Self {
            id: ProviderId::cpu(),
            capability: Capability::All,
        }
    }

    /// `MyCpuExecutionProvider`: the custom-domain FastGelu.
    pub fn my_cpu() -> Self {
        let claims = [OperatorKey::new("com.my_virtual_npu", "FastGelu")];
        Self {
            id: ProviderId::new(ProviderId::MY_CPU),
            capability: Capability::Operators(claims.into_iter().collect()),
        }
    }

    /// Look up one of the providers this runtime ships.
    pub fn by_id(id: &ProviderId) -> Result<Self> {
        match id.as_str() {
            ProviderId::CPU => Ok(Self::cpu()),
            ProviderId::MY_CPU => Ok(Self::my_cpu()),
            other => Err(RuntimeError::Placement(format!(
                "unknown execution provider '{other}' (available: {}, {})",
                ProviderId::CPU,
                ProviderId::MY_CPU
            ))),
        }
    }

    pub fn claims(&self, key: &OperatorKey) -> bool {
        match &self.capability {
            Capability::All => true,
            Capability::Operators(keys) => keys.contains(key),
        }
    }
}

/// Decides where nodes run and moves data between providers.
pub trait PlacementPolicy: Send + Sync + fmt::Debug {
    /// The single provider a node executes on.
    fn assign_provider(&self, node: &ResolvedNode) -> Result<ProviderId>;

    /// Make `tensor`, currently resident on `location`, available on
    /// `target`. Returns `None` when no transfer is needed.
    fn copy_if_needed(&self, tensor: &Tensor, location: &ProviderId, target: &ProviderId) -> Result<Option<Tensor>>;
}

/// Assigns each node to the first provider in priority order that claims
/// its operator. The CPU provider is always the last resort.
#[derive(Debug, Clone)]
pub struct PriorityPlacement {
    providers: Vec<ExecutionProvider>,
}

impl PriorityPlacement {
    pub fn new(mut providers: Vec<ExecutionProvider>) -> Self {
        if !providers.iter().any(|p| p.id.as_str() == ProviderId::CPU) {
            providers.push(ExecutionProvider::cpu());
        }
        Self { providers }
    }

    /// Build from a priority list of provider names.
    pub fn from_ids(ids: &[ProviderId]) -> Result<Self> {
        let mut providers = Vec::with_capacity(ids.len());
        for id in ids {
            if providers.iter().any(|p: &ExecutionProvider| &p.id == id) {
                continue;
            }
            providers.push(ExecutionProvider::by_id(id)?);
        }
        Ok(Self::new(providers))
    }

    pub fn providers(&self) -> &[ExecutionProvider] {
        &self.providers
    }
}

impl PlacementPolicy for PriorityPlacement {
    fn assign_provider(&self, node: &ResolvedNode) -> Result<ProviderId> {
        let key = node.descriptor.key();
        self.providers
            .iter()
            .find(|p| p.claims(key))
            .map(|p| p.id.clone())
            .ok_or_else(|| RuntimeError::Placement(format!("no provider claims {key}")))
    }

    fn copy_if_needed(&self, tensor: &Tensor, location: &ProviderId, target: &ProviderId) -> Result<Option<Tensor>> {
        if location == target {
            return Ok(None);
        }
        tracing::debug!(
            from = %location,
            to = %target,
            bytes = tensor.as_bytes().len(),
            "copying tensor between providers"
        );
        Ok(Some(tensor.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_is_implicit_last_resort() {
        let placement = PriorityPlacement::from_ids(&[ProviderId::new(ProviderId::MY_CPU)]).unwrap();
        let ids: Vec<&str> = placement.providers().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![ProviderId::MY_CPU, ProviderId::CPU]);

        let placement = PriorityPlacement::from_ids(&[]).unwrap();
        assert_eq!(placement.providers().len(), 1);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = PriorityPlacement::from_ids(&["CUDAExecutionProvider".into()]).unwrap_err();
        assert!(matches!(err, RuntimeError::Placement(_)));
    }

    #[test]
    fn test_claims() {
        let custom = OperatorKey::new("com.my_virtual_npu", "FastGelu");
        let vendor = OperatorKey::new("com.microsoft", "FastGelu");
        assert!(ExecutionProvider::my_cpu().claims(&custom));
        assert!(!ExecutionProvider::my_cpu().claims(&vendor));
        assert!(ExecutionProvider::cpu().claims(&vendor));
    }

    #[test]
    fn test_copy_if_needed() {
        let placement = PriorityPlacement::new(vec![]);
        let tensor = Tensor::from_vec(vec![1.0f32, 2.0], &[2]);
        let cpu = ProviderId::cpu();
        let my_cpu = ProviderId::new(ProviderId::MY_CPU);

        assert!(placement.copy_if_needed(&tensor, &cpu, &cpu).unwrap().is_none());
        let copied = placement.copy_if_needed(&tensor, &cpu, &my_cpu).unwrap().unwrap();
        assert_eq!(copied, tensor);
    }
}
