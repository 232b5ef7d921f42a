//! catalog-discover: one discovery run against a CKAN-style repository.
//!
//! Loads `mapcat.toml` (plus `MAPCAT_*` env overrides), runs discovery
//! into an empty root group and prints the resulting tree to stdout.
//! Diagnostics go to the log; `--report` also prints the run report.

use std::io::ErrorKind;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use mapcat_catalog::{CatalogDiscovery, DiscoveryReport};
use mapcat_core::{load_dotenv, CatalogGroup, ConfigError, DiscoveryConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Discover WMS / Esri REST layers in a data catalog and print the tree.
#[derive(Parser, Debug)]
#[command(name = "catalog-discover", version, about)]
struct Cli {
    /// Path to mapcat.toml config file.
    #[arg(long, env = "MAPCAT_CONFIG", default_value = "config/mapcat.toml")]
    config: String,

    /// Repository base URL (overrides `search.url`).
    #[arg(long)]
    url: Option<String>,

    /// Filter query; repeat for several parallel searches (replaces `search.filter_query`).
    #[arg(long = "filter-query")]
    filter_query: Vec<String>,

    /// Cross-validate WMS layers against GetCapabilities.
    #[arg(long)]
    filter_by_capabilities: bool,

    /// Minimum MaxScaleDenominator a layer must reach.
    #[arg(long)]
    min_scale: Option<f64>,

    /// Name of the root group the tree is built under.
    #[arg(long, default_value = "Data Catalog")]
    root_name: String,

    /// Output format for the tree.
    #[arg(long, value_enum, default_value_t = OutputFormat::Outline)]
    format: OutputFormat,

    /// Also print the run report (JSON) after the tree.
    #[arg(long)]
    report: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Outline,
}

impl Cli {
    fn apply(&self, config: &mut DiscoveryConfig) {
        if let Some(url) = &self.url {
            config.search.url = url.clone();
        }
        if !self.filter_query.is_empty() {
            config.search.filter_query = self.filter_query.clone();
        }
        if self.filter_by_capabilities {
            config.search.filter_by_capabilities = true;
        }
        if let Some(scale) = self.min_scale {
            config.search.minimum_max_scale_denominator = Some(scale);
        }
    }
}

// ── Config ──────────────────────────────────────────────────────────

fn load_config(path: &str) -> Result<DiscoveryConfig, ConfigError> {
    match DiscoveryConfig::read_file(path) {
        Ok(config) => {
            info!(path, "loaded mapcat config");
            Ok(config)
        }
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!(path, "config file not found, using environment only");
            let mut config = DiscoveryConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn print_tree(root: &CatalogGroup, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(root)?),
        OutputFormat::Outline => print!("{}", root.to_outline()),
    }
    Ok(())
}

fn log_report(report: &DiscoveryReport) {
    info!(
        run_id = %report.run_id,
        records = report.records,
        endpoints = report.endpoints_checked,
        items = report.items_created,
        groups = report.groups_created,
        diagnostics = report.diagnostics.len(),
        elapsed_ms = report.elapsed_ms,
        "run finished"
    );
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;
    config.log_summary();

    let discovery = CatalogDiscovery::from_config(&config)?;
    let mut root = CatalogGroup::new(cli.root_name.clone());
    let report = discovery.run(&config.search, &mut root).await?;

    print_tree(&root, cli.format)?;
    log_report(&report);
    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
