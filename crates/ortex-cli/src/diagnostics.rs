//! Diagnostics behind the `ortex` subcommands.
//!
//! Each function builds a small graph, runs it through a session and
//! returns a report; printing is left to the binary.

use anyhow::{Context, Result, ensure};
use ortex_core::{DataType, OperatorKey, OperatorRegistry, Tensor, VersionRange};
use ortex_graph::{Graph, Node, TensorInfo, TensorKind, TensorShape};
use ortex_operators::{CUSTOM_DOMAIN, VENDOR_DOMAIN, math};
use ortex_runtime::{ProviderId, RunStats, Session, SessionConfig};
use std::sync::Arc;

/// One registration, as listed by `ortex ops`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRow {
    pub key: OperatorKey,
    pub versions: VersionRange,
    pub types: Vec<DataType>,
    pub doc: String,
}

/// Registrations in `registry`, optionally restricted to one domain.
pub fn list_operators(registry: &OperatorRegistry, domain: Option<&str>) -> Vec<OperatorRow> {
    let domain = domain.map(ortex_core::Domain::new);
    registry
        .registrations()
        .into_iter()
        .map(|registration| registration.descriptor.as_ref())
        .filter(|descriptor| domain.as_ref().is_none_or(|d| descriptor.domain() == d))
        .map(|descriptor| OperatorRow {
            key: descriptor.key().clone(),
            versions: descriptor.versions(),
            types: descriptor.allowed_types().to_vec(),
            doc: descriptor.doc().to_string(),
        })
        .collect()
}

fn add_tensor(graph: &mut Graph, name: &str, dtype: DataType, shape: &[usize], kind: TensorKind) {
    graph.add_tensor(TensorInfo::new(
        name,
        dtype,
        TensorShape::Static(shape.to_vec()),
        kind,
    ));
}

/// `x -> domain::FastGelu -> y` over `len` elements of `dtype`.
pub fn fast_gelu_graph(domain: &str, dtype: DataType, len: usize) -> Graph {
    let mut graph = Graph::new();
    graph.metadata.name = format!("{domain}_fast_gelu");
    graph.metadata.producer_name = "ortex".to_string();

    add_tensor(&mut graph, "x", dtype, &[len], TensorKind::Input);
    add_tensor(&mut graph, "y", dtype, &[len], TensorKind::Output);
    graph.add_node(
        Node::new("FastGelu")
            .with_name("fast_gelu")
            .with_domain(domain)
            .with_inputs(["x"])
            .with_outputs(["y"]),
    );
    graph.inputs = vec!["x".to_string()];
    graph.outputs = vec!["y".to_string()];
    graph.import_opset(domain, 1);
    graph
}

/// Result of running FastGelu from one domain.
#[derive(Debug, Clone)]
pub struct DomainRun {
    pub domain: String,
    /// Operator the node actually resolved to.
    pub resolved: OperatorKey,
    pub versions: VersionRange,
    pub output: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct DomainCheck {
    pub custom: DomainRun,
    pub vendor: DomainRun,
    pub max_difference: f32,
}

/// Run FastGelu from the custom and the vendor domain on the same values.
///
/// Fails if either node resolved to a descriptor outside its own domain.
pub fn check_domains(registry: &Arc<OperatorRegistry>, values: &[f32]) -> Result<DomainCheck> {
    let custom = run_in_domain(registry, CUSTOM_DOMAIN, values)?;
    let vendor = run_in_domain(registry, VENDOR_DOMAIN, values)?;

    let max_difference = custom
        .output
        .iter()
        .zip(&vendor.output)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);

    Ok(DomainCheck {
        custom,
        vendor,
        max_difference,
    })
}

fn run_in_domain(registry: &Arc<OperatorRegistry>, domain: &str, values: &[f32]) -> Result<DomainRun> {
    let graph = fast_gelu_graph(domain, DataType::F32, values.len());
    let session = Session::load(&graph, Arc::clone(registry), SessionConfig::default())
        .with_context(|| format!("Failed to load FastGelu from domain '{domain}'"))?;

    let node = session
        .plan()
        .nodes
        .first()
        .context("FastGelu graph resolved to an empty plan")?;
    let resolved = node.descriptor.key().clone();
    ensure!(
        resolved.domain.as_str() == domain,
        "node from domain '{domain}' resolved to {resolved}"
    );
    let versions = node.descriptor.versions();

    let outputs = session
        .run(&[("x", Tensor::from_vec(values.to_vec(), &[values.len()]))])
        .with_context(|| format!("Failed to run FastGelu from domain '{domain}'"))?;
    let output = outputs
        .get("y")
        .context("FastGelu run produced no output")?
        .to_vec::<f32>()?;

    Ok(DomainRun {
        domain: domain.to_string(),
        resolved,
        versions,
        output,
    })
}

/// Add -> FastGelu -> MatMul with a fixed bias and an identity weight.
pub fn mixed_graph() -> Result<Graph> {
    let mut graph = Graph::new();
    graph.metadata.name = "mixed_domain".to_string();
    graph.metadata.producer_name = "ortex".to_string();

    add_tensor(&mut graph, "input", DataType::F32, &[1, 4], TensorKind::Input);

    let mut bias = TensorInfo::new("bias", DataType::F32, TensorShape::Static(vec![4]), TensorKind::Weight);
    bias.initializer = Some(Tensor::from_vec(vec![0.1f32, -0.2, 0.3, 0.0], &[4]).as_bytes().to_vec());
    graph.add_tensor(bias);

    let identity: Vec<f32> = (0..16).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect();
    let mut weight = TensorInfo::new("weight", DataType::F32, TensorShape::Static(vec![4, 4]), TensorKind::Weight);
    weight.initializer = Some(Tensor::from_vec(identity, &[4, 4]).as_bytes().to_vec());
    graph.add_tensor(weight);

    add_tensor(&mut graph, "added", DataType::F32, &[1, 4], TensorKind::Intermediate);
    add_tensor(&mut graph, "activated", DataType::F32, &[1, 4], TensorKind::Intermediate);
    add_tensor(&mut graph, "output", DataType::F32, &[1, 4], TensorKind::Output);

    graph.add_node(
        Node::new("Add")
            .with_name("add")
            .with_opset(13)
            .with_inputs(["input", "bias"])
            .with_outputs(["added"]),
    );
    graph.add_node(
        Node::new("FastGelu")
            .with_name("fast_gelu")
            .with_domain(CUSTOM_DOMAIN)
            .with_inputs(["added"])
            .with_outputs(["activated"]),
    );
    graph.add_node(
        Node::new("MatMul")
            .with_name("matmul")
            .with_opset(13)
            .with_inputs(["activated", "weight"])
            .with_outputs(["output"]),
    );

    graph.inputs = vec!["input".to_string()];
    graph.outputs = vec!["output".to_string()];
    graph.import_opset("", 13);
    graph.import_opset(CUSTOM_DOMAIN, 1);
    graph.sort_nodes().context("Mixed graph has a cycle")?;
    Ok(graph)
}

#[derive(Debug, Clone)]
pub struct MixedReport {
    pub assignments: Vec<(String, ProviderId)>,
    pub stats: RunStats,
    pub output: Vec<f32>,
}

/// Run the mixed graph on `input` (four values) under `config`.
pub fn run_mixed(registry: &Arc<OperatorRegistry>, config: SessionConfig, input: &[f32]) -> Result<MixedReport> {
    ensure!(input.len() == 4, "mixed graph takes 4 input values, got {}", input.len());

    let session =
        Session::load(&mixed_graph()?, Arc::clone(registry), config).context("Failed to load mixed graph")?;
    let assignments = session
        .assignments()
        .map(|(node, provider)| (node.to_string(), provider.clone()))
        .collect();

    let (outputs, stats) = session
        .run_with_stats(&[("input", Tensor::from_vec(input.to_vec(), &[1, 4]))])
        .context("Failed to run mixed graph")?;
    let output = outputs
        .get("output")
        .context("Mixed graph produced no output")?
        .to_vec::<f32>()?;

    Ok(MixedReport {
        assignments,
        stats,
        output,
    })
}

/// FastGelu against exact GELU at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeluRow {
    pub x: f64,
    pub fast: f64,
    pub exact: f64,
    pub error: f64,
}

/// Evaluate the custom FastGelu kernel in double precision and compare
/// each value with the erf-based GELU.
pub fn compare_gelu(registry: &Arc<OperatorRegistry>, values: &[f64]) -> Result<Vec<GeluRow>> {
    let graph = fast_gelu_graph(CUSTOM_DOMAIN, DataType::F64, values.len());
    let session = Session::load(&graph, Arc::clone(registry), SessionConfig::default())
        .context("Failed to load FastGelu graph")?;
    let outputs = session
        .run(&[("x", Tensor::from_vec(values.to_vec(), &[values.len()]))])
        .context("Failed to run FastGelu")?;
    let fast = outputs.get("y").context("FastGelu run produced no output")?.to_vec::<f64>()?;

    Ok(values
        .iter()
        .zip(fast)
        .map(|(&x, fast)| {
            let exact = math::gelu_exact_f64(x);
            GeluRow {
                x,
                fast,
                exact,
                error: math::scaled_error(fast, exact),
            }
        })
        .collect())
}
