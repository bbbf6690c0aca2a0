//! ortex CLI - inspect the operator registry and check domain isolation and
//! mixed-provider execution.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ortex_cli::diagnostics;
use ortex_runtime::{ProviderId, SessionConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "ortex")]
#[command(about = "Multi-domain operator runtime diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered operators with their domains and opset ranges
    Ops {
        /// Only show this domain ("" or "ai.onnx" for built-in operators)
        #[arg(short, long)]
        domain: Option<String>,
    },
    /// Run FastGelu from the custom and vendor domains side by side
    CheckDomains {
        /// Input values
        #[arg(allow_negative_numbers = true, default_values_t = [-3.0f32, -1.0, 0.0, 0.5, 2.0])]
        values: Vec<f32>,
    },
    /// Run Add -> FastGelu -> MatMul under a provider priority list
    Mixed {
        /// Execution provider, highest priority first (repeatable)
        #[arg(short, long = "provider", value_name = "PROVIDER")]
        providers: Vec<String>,

        /// Four input values
        #[arg(long, num_args = 4, allow_negative_numbers = true, default_values_t = [1.0f32, 0.5, -0.5, 2.0])]
        input: Vec<f32>,
    },
    /// Compare FastGelu with exact GELU
    Gelu {
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = ortex_cli::log_level(cli.verbose, cli.quiet);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let registry = ortex_operators::default_operator_registry().context("Failed to build operator registry")?;

    match cli.command {
        Commands::Ops { domain } => cmd_ops(&registry, domain.as_deref()),
        Commands::CheckDomains { values } => cmd_check_domains(&registry, &values),
        Commands::Mixed { providers, input } => {
            let config = SessionConfig::builder()
                .log_level(level)
                .providers(providers.iter().map(|p| ProviderId::new(p)))
                .build();
            cmd_mixed(&registry, config, &input)
        }
        Commands::Gelu { values } => cmd_gelu(&registry, &values),
    }
}

fn cmd_ops(registry: &ortex_core::OperatorRegistry, domain: Option<&str>) -> Result<()> {
    let rows = diagnostics::list_operators(registry, domain);
    if rows.is_empty() {
        anyhow::bail!("No operators registered for domain '{}'", domain.unwrap_or_default());
    }

    println!("{:<40} {:<10} {}", "OPERATOR", "OPSETS", "TYPES");
    for row in &rows {
        let types: Vec<_> = row.types.iter().map(|t| t.type_str()).collect();
        println!("{:<40} {:<10} {}", row.key.to_string(), row.versions.to_string(), types.join(", "));
    }

    println!();
    for domain in registry.domains() {
        if let Some(span) = registry.domain_versions(&domain) {
            println!("domain {domain}: opsets {span}");
        }
    }
    Ok(())
}

fn cmd_check_domains(registry: &std::sync::Arc<ortex_core::OperatorRegistry>, values: &[f32]) -> Result<()> {
    let check = diagnostics::check_domains(registry, values)?;

    for run in [&check.custom, &check.vendor] {
        println!("{} -> {} (opsets {})", run.domain, run.resolved, run.versions);
        println!("  {:?}", run.output);
    }
    println!("max difference: {:e}", check.max_difference);
    println!("domains resolved independently");
    Ok(())
}

fn cmd_mixed(
    registry: &std::sync::Arc<ortex_core::OperatorRegistry>,
    config: SessionConfig,
    input: &[f32],
) -> Result<()> {
    let providers = config.providers.clone();
    let report = diagnostics::run_mixed(registry, config, input)?;

    println!("providers: {}", providers.iter().map(ProviderId::as_str).collect::<Vec<_>>().join(", "));
    for (node, provider) in &report.assignments {
        println!("  {node:<12} -> {provider}");
    }
    println!(
        "{} nodes, {} transfers in {:?}",
        report.stats.nodes_executed, report.stats.transfers, report.stats.elapsed
    );
    println!("output: {:?}", report.output);
    Ok(())
}

fn cmd_gelu(registry: &std::sync::Arc<ortex_core::OperatorRegistry>, values: &[f64]) -> Result<()> {
    let rows = diagnostics::compare_gelu(registry, values)?;

    println!("{:>10} {:>14} {:>14} {:>12}", "x", "FastGelu", "Gelu", "error");
    for row in &rows {
        println!("{:>10.4} {:>14.8} {:>14.8} {:>12.3e}", row.x, row.fast, row.exact, row.error);
    }
    if let Some(worst) = rows.iter().map(|row| row.error).reduce(f64::max) {
        println!("max scaled error: {worst:.3e}");
    }
    Ok(())
}
