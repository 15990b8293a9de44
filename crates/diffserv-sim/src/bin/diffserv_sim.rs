//! DiffServ link simulator.
//!
//! Runs a built-in traffic scenario through a DRR or strict-priority queue
//! and writes a JSON report.
//!
//! - `--discipline` picks the scheduler and the matching built-in scenario
//! - `--config` replaces the built-in queue configuration (JSON or TOML)
//! - `--prometheus` also prints the final queue counters in text format

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use diffserv_core::stats::render_prometheus;
use diffserv_core::{DisciplineKind, QosConfig};
use diffserv_sim::{builtin_config, Scenario};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "diffserv-sim", about = "Simulate DiffServ queuing on a bottleneck link")]
struct Cli {
    /// Scheduling discipline: drr or spq.
    #[arg(long, default_value = "drr")]
    discipline: DisciplineKind,

    /// Queue configuration file (.json or .toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated time in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Bottleneck rate in bits per second.
    #[arg(long)]
    link_rate: Option<u64>,

    /// Seed for source jitter.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print queue counters in Prometheus text format.
    #[arg(long, default_value_t = false)]
    prometheus: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => QosConfig::from_path(path)
            .with_context(|| format!("loading queue config {}", path.display()))?,
        None => builtin_config(cli.discipline).context("loading built-in queue config")?,
    };
    if let Some(file_kind) = config.discipline {
        if file_kind != cli.discipline {
            tracing::warn!(
                file = %file_kind,
                cli = %cli.discipline,
                "config names a different discipline, using the command line"
            );
        }
    }

    let mut scenario = Scenario::builtin(cli.discipline).with_seed(cli.seed);
    if let Some(secs) = cli.duration {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--duration must be a positive number of seconds");
        }
        scenario = scenario.with_duration(Duration::from_secs_f64(secs));
    }
    if let Some(rate) = cli.link_rate {
        if rate == 0 {
            bail!("--link-rate must be positive");
        }
        scenario = scenario.with_link_rate(rate);
    }

    let report = diffserv_sim::run(scenario, &config, cli.discipline)
        .context("building queue from config")?;

    tracing::info!(
        utilization = report.utilization(),
        dropped_unclassified = report.queue.dropped_unclassified,
        "simulation finished"
    );

    let json = report.to_json_pretty().context("serialising report")?;
    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }

    if cli.prometheus {
        print!("{}", render_prometheus(&report.queue));
    }

    Ok(())
}
