//! Console rendering of probe events and the final report.
//!
//! ## Formats
//!
//! `text` prints one status line per event as it happens, then a summary
//! that puts both responses next to each other:
//!
//! ```text
//! ✓ WS1 connected to wss://probe.example.com/ws1
//! → WS1 sent "start"
//! ← WS1 received {"instance":"a1"}
//! … WS1 holding session open, waiting for WS2 (timeout 15000ms)
//! ✓ WS2 connected to wss://probe.example.com/ws2
//! ...
//! ```
//!
//! `json` prints one JSON object per event (NDJSON), then a result envelope:
//!
//! ```json
//! { "ok": true, "command": "probe", "data": { ...report... }, "timings": { "durationMs": 2104 } }
//! ```


use std::io::{self, Write};
use std::time::Duration;

use affprobe::{ProbeEvent, ProbeReport, ReleaseCause, Reporter};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CliError, Result};

/// Output format for status lines and the summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable status lines
	#[default]
	Text,
	/// Newline-delimited JSON events followed by a result envelope
	Json,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(OutputFormat::Text),
			"json" => Ok(OutputFormat::Json),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// Result envelope printed once the run is over in `json` format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Serialize)]
pub struct CommandError {
	pub code: &'static str,
	pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
		}
	}
}

/// [`Reporter`] that writes each event to stdout as it happens.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
	format: OutputFormat,
}

impl ConsoleReporter {
	pub fn new(format: OutputFormat) -> Self {
		Self { format }
	}
}

impl Reporter for ConsoleReporter {
	fn report(&self, event: &ProbeEvent) {
		let line = match self.format {
			OutputFormat::Text => format!("{} {}", marker(event), describe(event)),
			OutputFormat::Json => match serde_json::to_string(event) {
				Ok(json) => json,
				Err(err) => {
					tracing::warn!(error = %err, "failed to serialize probe event");
					return;
				}
			},
		};

		// Stdout may be a closed pipe; the probe keeps running regardless.
		let _ = writeln!(io::stdout().lock(), "{line}");
	}
}

/// Plain-text description of an event, without colour.
pub fn describe(event: &ProbeEvent) -> String {
	let label = event.role().label();
	match event {
		ProbeEvent::Connected { url, .. } => format!("{label} connected to {url}"),
		ProbeEvent::ConnectFailed { url, error, .. } => format!("{label} connect to {url} failed: {error}"),
		ProbeEvent::Sent { payload, .. } => format!("{label} sent {payload:?}"),
		ProbeEvent::SendFailed { error, .. } => format!("{label} send failed: {error}"),
		ProbeEvent::Received { response, .. } => format!("{label} received {response}"),
		ProbeEvent::ReceiveFailed { error, .. } => format!("{label} receive failed: {error}"),
		ProbeEvent::Awaiting { timeout_ms, .. } => {
			format!("{label} holding session open, waiting for WS2 (timeout {timeout_ms}ms)")
		}
		ProbeEvent::Released {
			cause: ReleaseCause::Signal,
			..
		} => format!("{label} released by completion signal"),
		ProbeEvent::Released {
			cause: ReleaseCause::Timeout,
			..
		} => format!("{label} released by timeout"),
		ProbeEvent::Closed { .. } => format!("{label} closed"),
		ProbeEvent::CloseFailed { error, .. } => format!("{label} close failed: {error}"),
	}
}

fn marker(event: &ProbeEvent) -> ColoredString {
	if event.is_failure() {
		return "✗".red().bold();
	}
	match event {
		ProbeEvent::Connected { .. } => "✓".green(),
		ProbeEvent::Sent { .. } => "→".cyan(),
		ProbeEvent::Received { .. } => "←".cyan(),
		ProbeEvent::Awaiting { .. } => "…".yellow(),
		ProbeEvent::Released {
			cause: ReleaseCause::Signal,
			..
		} => "✓".green(),
		ProbeEvent::Released {
			cause: ReleaseCause::Timeout,
			..
		} => "⏱".yellow(),
		_ => "•".dimmed(),
	}
}

/// Summary lines for the `text` format.
pub fn summary_lines(report: &ProbeReport) -> Vec<String> {
	let release = match report.primary.release {
		Some(ReleaseCause::Signal) => "signal",
		Some(ReleaseCause::Timeout) => "timeout",
		None => "-",
	};

	let mut lines = vec![
		format!("summary: {} ({}ms)", report.endpoint, report.elapsed_ms),
		format!(
			"  WS1 response: {}  released by: {release}  closed: {}",
			render_response(report.primary.response.as_ref()),
			yes_no(report.primary.closed)
		),
		format!(
			"  WS2 response: {}  closed: {}",
			render_response(report.secondary.response.as_ref()),
			yes_no(report.secondary.closed)
		),
	];
	if let Some(error) = &report.primary.error {
		lines.push(format!("  WS1 error: {error}"));
	}
	if let Some(error) = &report.secondary.error {
		lines.push(format!("  WS2 error: {error}"));
	}
	lines
}

fn render_response(response: Option<&Value>) -> String {
	response.map_or_else(|| "-".to_string(), Value::to_string)
}

fn yes_no(flag: bool) -> &'static str {
	if flag { "yes" } else { "no" }
}

/// Prints the end-of-run report in the requested format.
pub fn print_report(report: &ProbeReport, format: OutputFormat, duration: Duration) -> Result<()> {
	let mut out = io::stdout().lock();
	match format {
		OutputFormat::Text => {
			for line in summary_lines(report) {
				writeln!(out, "{line}")?;
			}
		}
		OutputFormat::Json => {
			let result = CommandResult {
				ok: true,
				command: "probe",
				data: Some(report),
				error: None,
				timings: Some(duration.into()),
			};
			writeln!(out, "{}", serde_json::to_string(&result)?)?;
		}
	}
	Ok(())
}

/// Prints a pre-run failure to stdout, as a plain line or an error envelope.
pub fn print_error(err: &CliError, format: OutputFormat) {
	match format {
		OutputFormat::Text => println!("{} {err}", "error:".red().bold()),
		OutputFormat::Json => match serde_json::to_string(&error_result(err)) {
			Ok(json) => println!("{json}"),
			Err(_) => println!("error: {err}"),
		},
	}
}

/// Error envelope for `json` consumers.
pub fn error_result(err: &CliError) -> CommandResult<()> {
	CommandResult {
		ok: false,
		command: "probe",
		data: None,
		error: Some(CommandError {
			code: err.code(),
			message: err.to_string(),
		}),
		timings: None,
	}
}
