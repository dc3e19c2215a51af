//! Probe target endpoint and the two session roles derived from it.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::ConfigError;

/// Validated base endpoint. Session URLs are built with [`Endpoint::session_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	base: Url,
}

impl Endpoint {
	/// Parses a user-supplied base endpoint.
	///
	/// Trailing slashes are stripped, and `http`/`https` are mapped to
	/// `ws`/`wss` so the worker's plain URL can be passed directly.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let trimmed = raw.trim().trim_end_matches('/');
		if trimmed.is_empty() {
			return Err(ConfigError::MissingEndpoint);
		}

		let invalid = |reason: String| ConfigError::InvalidEndpoint {
			input: raw.to_string(),
			reason,
		};

		let mut base = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;

		let scheme = match base.scheme() {
			"ws" | "http" => "ws",
			"wss" | "https" => "wss",
			other => {
				return Err(ConfigError::UnsupportedScheme {
					input: raw.to_string(),
					scheme: other.to_string(),
				});
			}
		};
		if base.scheme() != scheme && base.set_scheme(scheme).is_err() {
			return Err(invalid(format!("cannot switch scheme to {scheme}")));
		}

		if base.host_str().is_none_or(str::is_empty) {
			return Err(invalid("missing host".into()));
		}
		if base.query().is_some() || base.fragment().is_some() {
			return Err(invalid("query strings and fragments are not supported".into()));
		}

		Ok(Self { base })
	}

	/// Base URL without a trailing slash.
	pub fn as_str(&self) -> &str {
		self.base.as_str().trim_end_matches('/')
	}

	/// Returns `<base>/<role path>`.
	pub fn session_url(&self, role: SessionRole) -> Url {
		self.join(role.path())
	}

	/// Appends `path` to the base with exactly one separating slash.
	pub fn join(&self, path: &str) -> Url {
		let mut url = self.base.clone();
		let joined = format!("{}/{}", url.path().trim_end_matches('/'), path.trim_start_matches('/'));
		url.set_path(&joined);
		url
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Which of the two probe sessions an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
	/// Long-lived session on `/ws1` that sends `start`.
	Primary,
	/// One-shot session on `/ws2` that sends `check`.
	Secondary,
}

impl SessionRole {
	pub fn path(self) -> &'static str {
		match self {
			SessionRole::Primary => "ws1",
			SessionRole::Secondary => "ws2",
		}
	}

	/// Literal text payload sent right after connecting.
	pub fn payload(self) -> &'static str {
		match self {
			SessionRole::Primary => "start",
			SessionRole::Secondary => "check",
		}
	}

	/// Short label used in status lines.
	pub fn label(self) -> &'static str {
		match self {
			SessionRole::Primary => "WS1",
			SessionRole::Secondary => "WS2",
		}
	}
}

impl fmt::Display for SessionRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}
