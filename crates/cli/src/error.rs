use affprobe::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	/// The probe did not run: the endpoint is missing or invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Short machine-readable code for the JSON error envelope.
	pub fn code(&self) -> &'static str {
		match self {
			CliError::Config(ConfigError::MissingEndpoint) => "MISSING_URL",
			CliError::Config(_) => "INVALID_URL",
			CliError::Io(_) => "IO_ERROR",
			CliError::Json(_) => "INTERNAL_ERROR",
			CliError::Anyhow(_) => "INTERNAL_ERROR",
		}
	}
}
