//! The probe command: one full cycle against the configured endpoint.

use std::sync::Arc;
use std::time::Instant;

use affprobe::{Probe, ProbeReport};
use affprobe_runtime::WsConnector;
use anyhow::Context;
use tracing::debug;

use crate::cli::Cli;
use crate::error::Result;
use crate::output::{self, ConsoleReporter};

/// Validates the arguments, runs the probe and prints the summary.
///
/// Fails only before any connection is attempted; once the probe has started,
/// task failures are part of the report and the command succeeds.
pub async fn run(cli: Cli) -> Result<ProbeReport> {
	let config = cli.probe_config()?;
	debug!(?config, "resolved probe configuration");

	let connector = WsConnector::new().context("failed to build TLS client configuration")?;
	let reporter = Arc::new(ConsoleReporter::new(cli.format));
	let probe = Probe::new(config, Arc::new(connector), reporter);

	let started = Instant::now();
	let report = probe.run().await;
	output::print_report(&report, cli.format, started.elapsed())?;

	Ok(report)
}
