//! Error types for the probe core.

use std::time::Duration;

use thiserror::Error;

/// Boxed transport error carried through [`SessionError::Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rejected probe configuration. Reported before any session is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// No endpoint was supplied (or it was blank).
	#[error("missing target endpoint, pass it with --url")]
	MissingEndpoint,

	/// The endpoint could not be parsed as an absolute URL.
	#[error("invalid endpoint '{input}': {reason}")]
	InvalidEndpoint { input: String, reason: String },

	/// The endpoint scheme cannot carry a WebSocket session.
	#[error("unsupported scheme '{scheme}' in '{input}' (expected ws, wss, http or https)")]
	UnsupportedScheme { input: String, scheme: String },
}

/// Failure of a single session operation (connect, send, receive or close).
#[derive(Debug, Error)]
pub enum SessionError {
	/// Transport-level failure (DNS, TCP, TLS, handshake, framing).
	#[error("transport error: {0}")]
	Transport(#[source] BoxError),

	/// The peer closed the session before the operation completed.
	#[error("session closed by peer{}", .0.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
	Closed(Option<String>),

	/// A data message arrived but was not valid JSON.
	#[error("response is not valid JSON: {0}")]
	Decode(#[from] serde_json::Error),

	/// The run deadline elapsed while the operation was pending.
	#[error("run deadline of {}ms elapsed", .0.as_millis())]
	DeadlineElapsed(Duration),

	/// The primary's wait window closed before the operation completed.
	#[error("no response within the {}ms wait window", .0.as_millis())]
	WaitElapsed(Duration),
}

impl SessionError {
	/// Wraps any transport error.
	pub fn transport(err: impl Into<BoxError>) -> Self {
		SessionError::Transport(err.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn closed_message_includes_reason_when_present() {
		assert_eq!(SessionError::Closed(None).to_string(), "session closed by peer");
		assert_eq!(
			SessionError::Closed(Some("going away".into())).to_string(),
			"session closed by peer: going away"
		);
	}

	#[test]
	fn deadline_message_reports_millis() {
		let err = SessionError::DeadlineElapsed(Duration::from_millis(1500));
		assert_eq!(err.to_string(), "run deadline of 1500ms elapsed");
	}

	#[test]
	fn transport_wraps_string_errors() {
		let err = SessionError::transport("connection refused");
		assert_eq!(err.to_string(), "transport error: connection refused");
	}
}
