//! Error types for the transport runtime.

use thiserror::Error;

/// Result type alias for runtime setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building the transport (session failures are
/// reported as [`affprobe::SessionError`]).
#[derive(Debug, Error)]
pub enum Error {
	/// The TLS client configuration could not be built.
	#[error("TLS configuration error: {0}")]
	Tls(#[from] rustls::Error),
}
