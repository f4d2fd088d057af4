//! switchcheck
//!
//! Frame-level conformance runner for a CLI-configured learning switch.
//!
//! - `run` executes the built-in suite or the scenarios of a TOML file
//! - `list` names the scenarios available
//! - `show-config` prints the resolved configuration

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use switchcheck::driver::ScenarioDriver;
use switchcheck::suite;
use switchcheck_common::config::{Readiness, SuiteConfig};
use switchcheck_common::scenario::Scenario;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "switchcheck", about = "Frame-level switch conformance harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scenarios against the switch.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Only run these scenarios (repeatable). Default: all.
        #[arg(long = "scenario", short = 's')]
        scenarios: Vec<String>,

        /// Switch-under-test executable.
        #[arg(long, env = "SWITCHCHECK_SWITCH_BIN")]
        switch_bin: Option<String>,

        /// Frame helper executable, as seen inside host contexts.
        #[arg(long, env = "SWITCHCHECK_PROBE")]
        probe: Option<String>,

        /// Host wrapper command line, e.g. "sudo ip netns exec".
        #[arg(long)]
        exec_wrapper: Option<String>,

        /// How listener readiness is established before injecting.
        #[arg(long, value_enum)]
        readiness: Option<ReadinessArg>,

        /// Write the run report as JSON.
        #[arg(long)]
        report_json: Option<PathBuf>,
    },
    /// List available scenarios.
    List {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the resolved configuration.
    ShowConfig {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Suite file (TOML). Without it the default topology and the built-in
    /// suite are used.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReadinessArg {
    FixedDelay,
    Handshake,
}

impl From<ReadinessArg> for Readiness {
    fn from(arg: ReadinessArg) -> Self {
        match arg {
            ReadinessArg::FixedDelay => Readiness::FixedDelay,
            ReadinessArg::Handshake => Readiness::Handshake,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("switchcheck: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Run {
            source,
            scenarios,
            switch_bin,
            probe,
            exec_wrapper,
            readiness,
            report_json,
        } => {
            let mut config = load(&source)?;
            if let Some(bin) = switch_bin {
                config.harness.switch_binary = bin;
            }
            if let Some(probe) = probe {
                config.harness.probe = probe;
            }
            if let Some(wrapper) = exec_wrapper {
                config.harness.exec_wrapper =
                    wrapper.split_whitespace().map(str::to_string).collect();
            }
            if let Some(readiness) = readiness {
                config.harness.readiness = readiness.into();
            }

            let selected = select(&config, &scenarios)?;
            tracing::info!(
                scenarios = selected.len(),
                switch = %config.harness.switch_binary,
                probe = %config.harness.probe,
                readiness = ?config.harness.readiness,
                "starting run"
            );

            let driver = ScenarioDriver::new(config.harness, Arc::new(config.topology));
            let report = driver.run_all(&selected).await;

            println!("{}", report.summary());
            if let Some(path) = report_json {
                write_report(&path, &report)?;
            }

            if let Some(failure) = &report.failure {
                eprintln!("FAILED: {failure}");
                if let Some(diag) = failure.diagnostics() {
                    if !diag.stdout.trim().is_empty() {
                        eprintln!("listener stdout:\n{}", diag.stdout.trim_end());
                    }
                    if !diag.stderr.trim().is_empty() {
                        eprintln!("listener stderr:\n{}", diag.stderr.trim_end());
                    }
                }
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::List { source } => {
            let config = load(&source)?;
            for scenario in available(&config)? {
                println!(
                    "{:<16} {:>2} steps  {}",
                    scenario.name,
                    scenario.steps.len(),
                    scenario.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::ShowConfig { source } => {
            let config = load(&source)?;
            println!("version = {}", config.version);
            println!("{:#?}", config.harness);
            println!("hosts:");
            for host in config.topology.hosts() {
                println!(
                    "  {} {:<8} {:<12} {} {:<15} -> {}",
                    host.id, host.name, host.iface, host.mac, host.ip, host.switch_iface
                );
            }
            println!("scenarios: {}", config.scenarios.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(source: &SourceArgs) -> anyhow::Result<SuiteConfig> {
    match &source.config {
        Some(path) => SuiteConfig::from_path(path)
            .with_context(|| format!("load suite {}", path.display())),
        None => Ok(SuiteConfig::default()),
    }
}

/// Scenarios from the suite file, or the built-in suite when it has none.
fn available(config: &SuiteConfig) -> anyhow::Result<Vec<Scenario>> {
    if !config.scenarios.is_empty() {
        return Ok(config.scenarios.clone());
    }
    suite::builtin(&config.topology).context("build built-in suite")
}

fn select(config: &SuiteConfig, names: &[String]) -> anyhow::Result<Vec<Scenario>> {
    let all = available(config)?;
    if names.is_empty() {
        return Ok(all);
    }
    names
        .iter()
        .map(|name| {
            all.iter()
                .find(|s| &s.name == name)
                .cloned()
                .with_context(|| format!("unknown scenario \"{name}\""))
        })
        .collect()
}

fn write_report(path: &Path, report: &switchcheck::driver::RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
