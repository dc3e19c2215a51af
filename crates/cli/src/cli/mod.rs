
use std::ffi::OsString;
use std::time::Duration;

use affprobe::{ConfigError, Endpoint, ProbeConfig};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

use crate::output::OutputFormat;

/// Two-phase WebSocket session affinity probe.
///
/// Opens `<URL>/ws1` and sends `start`, waits for the stabilization delay,
/// then opens `<URL>/ws2` and sends `check`. WS1 stays open until WS2 has
/// finished or the wait timeout elapses, and both responses are printed for
/// comparison.
#[derive(Parser, Debug)]
#[command(name = "affprobe")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Base endpoint (ws, wss, http or https); `-url` is accepted as well
	#[arg(long, value_name = "URL")]
	pub url: Option<String>,

	/// Delay between opening WS1 and opening WS2
	#[arg(long, value_name = "MS", default_value_t = 2_000)]
	pub stabilization_ms: u64,

	/// Upper bound on how long WS1 waits for WS2 to finish
	#[arg(long, value_name = "MS", default_value_t = 15_000)]
	pub wait_timeout_ms: u64,

	/// Overall bound for the run; pending connects, sends and reads fail once it passes
	#[arg(long, value_name = "MS")]
	pub deadline_ms: Option<u64>,

	/// Increase log verbosity on stderr (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format for status lines and the summary
	#[arg(short = 'f', long, value_enum, default_value = "text")]
	pub format: OutputFormat,
}

impl Cli {
	/// Parses the process arguments, accepting the single-dash `-url` form.
	pub fn parse_normalized() -> Self {
		Self::parse_from(normalize_legacy_args(std::env::args_os()))
	}

	/// Validates the endpoint and builds the run configuration.
	pub fn probe_config(&self) -> Result<ProbeConfig, ConfigError> {
		let endpoint = Endpoint::parse(self.url.as_deref().unwrap_or_default())?;
		Ok(ProbeConfig::new(endpoint)
			.stabilization_delay(Duration::from_millis(self.stabilization_ms))
			.wait_timeout(Duration::from_millis(self.wait_timeout_ms))
			.deadline(self.deadline_ms.map(Duration::from_millis)))
	}
}

/// Rewrites `-url` / `-url=<URL>` to their `--url` spelling.
///
/// clap would otherwise read `-url` as the short flags `-u -r -l`. Arguments
/// after a `--` terminator are left untouched.
pub fn normalize_legacy_args<I, T>(args: I) -> Vec<OsString>
where
	I: IntoIterator<Item = T>,
	T: Into<OsString>,
{
	let mut terminated = false;
	args.into_iter()
		.map(Into::into)
		.map(|arg| {
			if terminated {
				return arg;
			}
			match arg.to_str() {
				Some("--") => {
					terminated = true;
					arg
				}
				Some("-url") => OsString::from("--url"),
				Some(value) if value.starts_with("-url=") => OsString::from(format!("-{value}")),
				_ => arg,
			}
		})
		.collect()
}

fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default().bold())
		.usage(AnsiColor::Yellow.on_default().bold())
		.literal(AnsiColor::Green.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Green.on_default())
}
