//! Dispatcher behavior: cancellation, kernel failures and placement hooks.

mod common;

use common::{RecordBehavior, make_record_chain, recording_registry};
use ortex_core::{ErrorKind, ExecutionPlan, ResolvedNode, Tensor};
use ortex_runtime::{
    CancellationFlag, Dispatcher, PlacementPolicy, PriorityPlacement, ProviderId, Result, RunOptions, RuntimeError,
    Session, SessionConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn input() -> Tensor {
    Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[3])
}

#[test]
fn test_record_chain_runs_every_node_once() {
    let behavior = RecordBehavior::default();
    let registry = recording_registry(behavior.clone());
    let session = Session::load(&make_record_chain(4, &[3]), registry, SessionConfig::default()).unwrap();

    let (outputs, stats) = session.run_with_stats(&[("x", input())]).unwrap();
    assert_eq!(outputs["y"], input());
    assert_eq!(stats.nodes_executed, 4);
    assert_eq!(behavior.calls(), 4);
}

#[test]
fn test_cancelled_before_first_node() {
    let behavior = RecordBehavior::default();
    let session = Session::load(&make_record_chain(3, &[3]), recording_registry(behavior.clone()), SessionConfig::default())
        .unwrap();

    let flag = CancellationFlag::new();
    flag.cancel();
    let err = session
        .run_with_options(&[("x", input())], &RunOptions::new().with_cancellation(flag))
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Cancelled { completed: 0, total: 3 }), "{err}");
    assert_eq!(behavior.calls(), 0);
}

#[test]
fn test_cancellation_observed_between_nodes() {
    let flag = CancellationFlag::new();
    let behavior = RecordBehavior {
        cancel_on: Some((2, flag.clone())),
        ..RecordBehavior::default()
    };
    let session = Session::load(&make_record_chain(4, &[3]), recording_registry(behavior.clone()), SessionConfig::default())
        .unwrap();

    let err = session
        .run_with_options(&[("x", input())], &RunOptions::new().with_cancellation(flag))
        .unwrap_err();

    // The node that raised the flag finishes; the next one never starts
    assert!(matches!(err, RuntimeError::Cancelled { completed: 2, total: 4 }), "{err}");
    assert_eq!(behavior.calls(), 2);
}

#[test]
fn test_kernel_failure_names_node_and_provider() {
    let behavior = RecordBehavior {
        fail_on: Some(2),
        ..RecordBehavior::default()
    };
    let session = Session::load(&make_record_chain(3, &[3]), recording_registry(behavior.clone()), SessionConfig::default())
        .unwrap();

    let err = session.run(&[("x", input())]).unwrap_err();
    match &err {
        RuntimeError::KernelExecution { node, provider, .. } => {
            assert_eq!(node, "record_1");
            assert_eq!(provider.as_str(), ProviderId::CPU);
        }
        other => panic!("expected KernelExecution, got {other}"),
    }
    assert_eq!(err.core_kind(), Some(ErrorKind::Kernel));
    assert_eq!(behavior.calls(), 2);

    // A failed run leaves the session usable
    let outputs = session.run(&[("x", input())]).unwrap();
    assert_eq!(outputs["y"], input());
}

/// Puts every node on its own provider and counts copies.
#[derive(Debug, Default)]
struct RoundRobin {
    copies: AtomicUsize,
}

impl PlacementPolicy for RoundRobin {
    fn assign_provider(&self, node: &ResolvedNode) -> Result<ProviderId> {
        Ok(ProviderId::new(&format!("provider_{}", node.node_id)))
    }

    fn copy_if_needed(&self, tensor: &Tensor, location: &ProviderId, target: &ProviderId) -> Result<Option<Tensor>> {
        if location == target {
            return Ok(None);
        }
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(Some(tensor.clone()))
    }
}

#[test]
fn test_dispatcher_uses_custom_placement() {
    let registry = recording_registry(RecordBehavior::default());
    let plan = ExecutionPlan::build(&make_record_chain(3, &[3]), &registry).unwrap();
    let placement = Arc::new(RoundRobin::default());
    let dispatcher = Dispatcher::new(plan, placement.clone(), true).unwrap();

    let (outputs, stats) = dispatcher.run(&[("x", input())], &RunOptions::default()).unwrap();
    assert_eq!(outputs["y"], input());
    // One copy into each node plus the output back to the host
    assert_eq!(stats.transfers, 4);
    assert_eq!(placement.copies.load(Ordering::SeqCst), 4);
}

#[test]
fn test_priority_placement_matches_session_assignments() {
    let registry = recording_registry(RecordBehavior::default());
    let plan = ExecutionPlan::build(&make_record_chain(2, &[3]), &registry).unwrap();
    let placement = PriorityPlacement::from_ids(&[ProviderId::new(ProviderId::MY_CPU)]).unwrap();
    let dispatcher = Dispatcher::new(plan, Arc::new(placement), false).unwrap();

    // MyCpu only claims FastGelu, so the recorders fall through to CPU
    assert!(dispatcher.assignments().all(|(_, provider)| provider.as_str() == ProviderId::CPU));
}
