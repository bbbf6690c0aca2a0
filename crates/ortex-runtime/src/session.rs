//! Sessions: a graph loaded against a registry, ready to run.

use crate::dispatcher::{Dispatcher, RunOptions, RunStats};
use crate::error::Result;
use crate::provider::{PlacementPolicy, PriorityPlacement, ProviderId};
use ortex_core::{ExecutionPlan, OperatorRegistry, Tensor};
use ortex_graph::Graph;
use std::collections::HashMap;
use std::sync::Arc;

/// Session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Level the embedding application should install its subscriber at.
    pub log_level: tracing::Level,
    /// Execution providers in priority order.
    pub providers: Vec<ProviderId>,
    /// Check plan dependency order before every run.
    pub validate_plan: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            providers: vec![ProviderId::cpu()],
            validate_plan: cfg!(debug_assertions),
        }
    }
}

impl SessionConfig {
    /// # Example
    /// ```
    /// # use ortex_runtime::{ProviderId, SessionConfig};
    /// let config = SessionConfig::builder()
    ///     .provider(ProviderId::MY_CPU)
    ///     .provider(ProviderId::CPU)
    ///     .validate_plan(true)
    ///     .build();
    /// assert_eq!(config.providers.len(), 2);
    /// ```
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    log_level: Option<tracing::Level>,
    providers: Vec<ProviderId>,
    validate_plan: Option<bool>,
}

impl SessionConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Append a provider to the priority list.
    pub fn provider(mut self, id: impl Into<ProviderId>) -> Self {
        self.providers.push(id.into());
        self
    }

    pub fn providers(mut self, ids: impl IntoIterator<Item = ProviderId>) -> Self {
        self.providers.extend(ids);
        self
    }

    pub fn validate_plan(mut self, validate: bool) -> Self {
        self.validate_plan = Some(validate);
        self
    }

    /// An empty provider list falls back to the default.
    pub fn build(self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            log_level: self.log_level.unwrap_or(defaults.log_level),
            providers: if self.providers.is_empty() {
                defaults.providers
            } else {
                self.providers
            },
            validate_plan: self.validate_plan.unwrap_or(defaults.validate_plan),
        }
    }
}

/// A loaded model.
///
/// Loading validates the graph, checks opset imports, resolves every node
/// and places it on a provider. Any failure happens here, before a kernel
/// has run. A session is `Send + Sync`; `run` may be called from many
/// threads at once.
///
/// # Example
///
/// ```
/// use ortex_graph::{DataType, Graph, Node, TensorInfo, TensorKind, TensorShape};
/// use ortex_runtime::{Session, SessionConfig, Tensor};
///
/// let mut graph = Graph::new();
/// for (name, kind) in [("x", TensorKind::Input), ("y", TensorKind::Output)] {
///     graph.add_tensor(TensorInfo::new(name, DataType::F32, TensorShape::Static(vec![2]), kind));
/// }
/// graph.add_node(
///     Node::new("FastGelu")
///         .with_domain("com.my_virtual_npu")
///         .with_inputs(["x"])
///         .with_outputs(["y"]),
/// );
/// graph.inputs.push("x".to_string());
/// graph.outputs.push("y".to_string());
///
/// let registry = ortex_operators::default_operator_registry()?;
/// let session = Session::load(&graph, registry, SessionConfig::default())?;
/// let outputs = session.run(&[("x", Tensor::from_vec(vec![-1.0f32, 1.0], &[2]))])?;
/// assert_eq!(outputs["y"].shape(), &[2]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Session {
    dispatcher: Dispatcher,
    registry: Arc<OperatorRegistry>,
    config: SessionConfig,
}

impl Session {
    /// Load `graph` with the default priority placement.
    #[tracing::instrument(skip_all, fields(graph = %graph.metadata.name))]
    pub fn load(graph: &Graph, registry: Arc<OperatorRegistry>, config: SessionConfig) -> Result<Self> {
        let placement = Arc::new(PriorityPlacement::from_ids(&config.providers)?);
        Self::load_with_placement(graph, registry, config, placement)
    }

    /// Load `graph` with a caller-supplied placement policy.
    pub fn load_with_placement(
        graph: &Graph,
        registry: Arc<OperatorRegistry>,
        config: SessionConfig,
        placement: Arc<dyn PlacementPolicy>,
    ) -> Result<Self> {
        let plan = ExecutionPlan::build(graph, &registry)?;
        let dispatcher = Dispatcher::new(plan, placement, config.validate_plan)?;

        tracing::info!(
            nodes = dispatcher.plan().nodes.len(),
            providers = ?config.providers,
            "session loaded"
        );

        Ok(Self {
            dispatcher,
            registry,
            config,
        })
    }

    /// Execute with named inputs, returning named outputs.
    pub fn run(&self, inputs: &[(&str, Tensor)]) -> Result<HashMap<String, Tensor>> {
        self.dispatcher
            .run(inputs, &RunOptions::default())
            .map(|(outputs, _)| outputs)
    }

    /// Like [`Session::run`], also reporting what the run did.
    pub fn run_with_stats(&self, inputs: &[(&str, Tensor)]) -> Result<(HashMap<String, Tensor>, RunStats)> {
        self.dispatcher.run(inputs, &RunOptions::default())
    }

    /// Run with per-call options such as a cancellation flag.
    pub fn run_with_options(
        &self,
        inputs: &[(&str, Tensor)],
        options: &RunOptions,
    ) -> Result<(HashMap<String, Tensor>, RunStats)> {
        self.dispatcher.run(inputs, options)
    }

    pub fn plan(&self) -> &ExecutionPlan {
        self.dispatcher.plan()
    }

    /// Node labels with their assigned provider, in execution order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &ProviderId)> {
        self.dispatcher.assignments()
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.plan().input_names().collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.plan().output_names().collect()
    }
}
