//! frame-probe
//!
//! Runs inside a host's execution context on behalf of the switchcheck
//! orchestrator.
//!
//! - `send` transmits one exact frame on an interface
//! - `expect` waits for one exact frame and reports what it saw instead
//!
//! stdout carries protocol lines only (`READY`, `MATCH`, diagnostics); logs
//! go to stderr.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use switchcheck_common::frame::Frame;
use switchcheck_probe::capture::{expect_frame, CaptureOutcome};
use switchcheck_probe::link::RawLink;
use switchcheck_probe::{EXIT_ERROR, EXIT_NO_MATCH, EXIT_OK, MATCH_LINE, READY_LINE};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "frame-probe", about = "Send or expect one exact link-layer frame")]
struct Cli {
    #[command(subcommand)]
    command: ProbeCommand,
}

#[derive(Subcommand, Debug)]
enum ProbeCommand {
    /// Transmit a frame unmodified.
    Send {
        /// Interface (or `<iface>.<vlan>` sub-interface) to transmit on.
        #[arg(long)]
        iface: String,
        /// Frame bytes as hex.
        #[arg(long)]
        frame: String,
    },
    /// Wait for an exact frame.
    Expect {
        /// Interface (or `<iface>.<vlan>` sub-interface) to capture on.
        #[arg(long)]
        iface: String,
        /// Expected frame bytes as hex.
        #[arg(long)]
        frame: String,
        /// Capture window in milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_ERROR } else { EXIT_OK });
        }
    };

    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("frame-probe: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(command: ProbeCommand) -> anyhow::Result<u8> {
    match command {
        ProbeCommand::Send { iface, frame } => {
            let frame = Frame::from_hex(&frame).context("invalid --frame")?;
            let link = RawLink::open(&iface).with_context(|| format!("open {iface}"))?;
            link.send(frame.as_bytes())
                .with_context(|| format!("send on {iface}"))?;
            tracing::info!(iface = link.name(), ifindex = link.index(), len = frame.len(), "frame sent");
            Ok(EXIT_OK)
        }
        ProbeCommand::Expect {
            iface,
            frame,
            timeout_ms,
        } => {
            let expected = Frame::from_hex(&frame).context("invalid --frame")?;
            let link = RawLink::open(&iface).with_context(|| format!("open {iface}"))?;

            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{READY_LINE}")?;
            stdout.flush()?;

            let outcome = expect_frame(&link, expected.as_bytes(), Duration::from_millis(timeout_ms))
                .with_context(|| format!("capture on {iface}"))?;
            match outcome {
                CaptureOutcome::Matched => {
                    writeln!(stdout, "{MATCH_LINE}")?;
                    tracing::info!(iface = link.name(), "expected frame observed");
                    Ok(EXIT_OK)
                }
                missed @ CaptureOutcome::Missed { .. } => {
                    for line in missed.diagnostics() {
                        writeln!(stdout, "{line}")?;
                    }
                    tracing::info!(iface = link.name(), timeout_ms, "expected frame not observed");
                    Ok(EXIT_NO_MATCH)
                }
            }
        }
    }
}
