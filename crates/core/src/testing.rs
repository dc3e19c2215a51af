//! Scripted in-memory transport and clock for task tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;
use url::Url;

use crate::clock::{Clock, TokioClock};
use crate::endpoint::{Endpoint, SessionRole};
use crate::error::SessionError;
use crate::report::RecordingReporter;
use crate::session::{CloseStatus, Connector, DuplexSession};
use crate::signal::CompletionSignal;
use crate::task::{Deadline, TaskContext};

pub(crate) const BASE: &str = "wss://probe.test";

/// How one endpoint path behaves.
#[derive(Debug, Clone)]
pub(crate) struct Route {
	pub connect_delay: Duration,
	pub connect_error: Option<String>,
	pub send_error: Option<String>,
	pub reply_delay: Duration,
	pub reply: Reply,
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
	Json(Value),
	Fail(String),
	Never,
}

impl Route {
	/// Connects at once and answers `{"ok": true}`.
	pub fn echo() -> Self {
		Self {
			connect_delay: Duration::ZERO,
			connect_error: None,
			send_error: None,
			reply_delay: Duration::ZERO,
			reply: Reply::Json(json!({"ok": true})),
		}
	}

	pub fn refuse(error: &str) -> Self {
		Self {
			connect_error: Some(error.to_string()),
			..Self::echo()
		}
	}

	pub fn connect_delay(mut self, delay: Duration) -> Self {
		self.connect_delay = delay;
		self
	}

	pub fn send_error(mut self, error: &str) -> Self {
		self.send_error = Some(error.to_string());
		self
	}

	pub fn reply(mut self, reply: Reply) -> Self {
		self.reply = reply;
		self
	}

	pub fn reply_delay(mut self, delay: Duration) -> Self {
		self.reply_delay = delay;
		self
	}
}

/// Transport call observed by the fake, with the virtual time it happened at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
	Connect { path: String, at: Instant },
	Send { path: String, text: String },
	Recv { path: String },
	Close { path: String, status: CloseStatus },
}

#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
	routes: HashMap<String, Route>,
	calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeConnector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn route(mut self, role: SessionRole, route: Route) -> Self {
		self.routes.insert(format!("/{}", role.path()), route);
		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn connect_time(&self, role: SessionRole) -> Option<Instant> {
		let wanted = format!("/{}", role.path());
		self.calls.lock().iter().find_map(|call| match call {
			Call::Connect { path, at } if *path == wanted => Some(*at),
			_ => None,
		})
	}

	pub fn closes(&self, role: SessionRole) -> Vec<CloseStatus> {
		let wanted = format!("/{}", role.path());
		self.calls
			.lock()
			.iter()
			.filter_map(|call| match call {
				Call::Close { path, status } if *path == wanted => Some(status.clone()),
				_ => None,
			})
			.collect()
	}
}

#[async_trait]
impl Connector for FakeConnector {
	async fn connect(&self, url: &Url) -> Result<Box<dyn DuplexSession>, SessionError> {
		let path = url.path().to_string();
		self.calls.lock().push(Call::Connect {
			path: path.clone(),
			at: Instant::now(),
		});

		let route = self
			.routes
			.get(&path)
			.cloned()
			.ok_or_else(|| SessionError::transport(format!("no route for {path}")))?;

		tokio::time::sleep(route.connect_delay).await;
		if let Some(error) = &route.connect_error {
			return Err(SessionError::transport(error.clone()));
		}

		Ok(Box::new(FakeSession {
			path,
			route,
			calls: Arc::clone(&self.calls),
		}))
	}
}

struct FakeSession {
	path: String,
	route: Route,
	calls: Arc<Mutex<Vec<Call>>>,
}

#[async_trait]
impl DuplexSession for FakeSession {
	async fn send_text(&mut self, text: &str) -> Result<(), SessionError> {
		self.calls.lock().push(Call::Send {
			path: self.path.clone(),
			text: text.to_string(),
		});
		match &self.route.send_error {
			Some(error) => Err(SessionError::transport(error.clone())),
			None => Ok(()),
		}
	}

	async fn recv_json(&mut self) -> Result<Value, SessionError> {
		self.calls.lock().push(Call::Recv { path: self.path.clone() });
		tokio::time::sleep(self.route.reply_delay).await;
		match &self.route.reply {
			Reply::Json(value) => Ok(value.clone()),
			Reply::Fail(error) => Err(SessionError::transport(error.clone())),
			Reply::Never => std::future::pending().await,
		}
	}

	async fn close(self: Box<Self>, status: CloseStatus) -> Result<(), SessionError> {
		self.calls.lock().push(Call::Close {
			path: self.path.clone(),
			status,
		});
		Ok(())
	}
}

/// Clock that records every sleep the coordinator asks for.
#[derive(Debug, Default)]
pub(crate) struct RecordingClock {
	sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
	pub fn sleeps(&self) -> Vec<Duration> {
		self.sleeps.lock().clone()
	}
}

#[async_trait]
impl Clock for RecordingClock {
	fn now(&self) -> Instant {
		TokioClock.now()
	}

	async fn sleep(&self, duration: Duration) {
		self.sleeps.lock().push(duration);
		TokioClock.sleep(duration).await;
	}
}

pub(crate) fn endpoint() -> Endpoint {
	Endpoint::parse(BASE).unwrap()
}

/// Task context over `connector` with a recording reporter.
pub(crate) fn context(connector: Arc<FakeConnector>, deadline: Option<Duration>) -> (TaskContext, Arc<RecordingReporter>) {
	let reporter = Arc::new(RecordingReporter::new());
	let ctx = TaskContext {
		endpoint: endpoint(),
		connector,
		reporter: reporter.clone(),
		clock: Arc::new(TokioClock),
		deadline: deadline.map(|length| Deadline {
			at: Instant::now() + length,
			length,
		}),
	};
	(ctx, reporter)
}

/// Signal that fires after `delay` of virtual time.
pub(crate) fn fire_after(delay: Duration) -> CompletionSignal {
	let signal = CompletionSignal::new();
	let handle = signal.clone();
	tokio::spawn(async move {
		tokio::time::sleep(delay).await;
		handle.fire();
	});
	signal
}
