use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the global subscriber. Logs go to stderr; status lines and the
/// summary are written to stdout by [`crate::output`].
pub fn init_logging(verbosity: u8) {
	// 0 = errors only
	// 1 (-v) = info for the probe crates, warn for the transport stack
	// 2+ (-vv) = debug for everything, including tungstenite and rustls
	let filter = verbosity_filter(verbosity);

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

fn verbosity_filter(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error",
		1 => "warn,affprobe=info,affprobe_runtime=info,affprobe_cli=info",
		_ => "debug",
	}
}
