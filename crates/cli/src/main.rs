use affprobe_cli::{cli::Cli, logging, output, probe};

#[tokio::main]
async fn main() {
	let cli = Cli::parse_normalized();
	logging::init_logging(cli.verbose);
	let format = cli.format;

	if let Err(err) = probe::run(cli).await {
		output::print_error(&err, format);
		std::process::exit(1);
	}
}
