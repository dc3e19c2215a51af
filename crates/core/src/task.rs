//! State shared by the primary and secondary tasks of one run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::clock::Clock;
use crate::endpoint::Endpoint;
use crate::error::SessionError;
use crate::report::{ProbeEvent, Reporter};
use crate::session::Connector;

/// Run deadline: instant at which pending operations are abandoned, plus the
/// configured length for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
	pub at: Instant,
	pub length: Duration,
}

#[derive(Clone)]
pub(crate) struct TaskContext {
	pub endpoint: Endpoint,
	pub connector: Arc<dyn Connector>,
	pub reporter: Arc<dyn Reporter>,
	pub clock: Arc<dyn Clock>,
	pub deadline: Option<Deadline>,
}

impl TaskContext {
	pub fn emit(&self, event: ProbeEvent) {
		event.trace();
		self.reporter.report(&event);
	}

	/// Runs a session operation, failing it if the run deadline passes first.
	pub async fn bounded<T, F>(&self, op: F) -> Result<T, SessionError>
	where
		F: Future<Output = Result<T, SessionError>>,
	{
		let Some(deadline) = self.deadline else {
			return op.await;
		};

		tokio::select! {
			biased;
			result = op => result,
			() = self.clock.sleep_until(deadline.at) => Err(SessionError::DeadlineElapsed(deadline.length)),
		}
	}

	/// Time left before the run deadline, if one is set.
	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|d| d.at.saturating_duration_since(self.clock.now()))
	}
}
