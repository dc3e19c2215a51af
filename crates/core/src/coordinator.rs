//! Coordinator: sequences the two tasks and joins them before returning.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{Clock, TokioClock};
use crate::endpoint::Endpoint;
use crate::primary::{PrimaryOutcome, PrimaryTask};
use crate::report::Reporter;
use crate::secondary::{SecondaryOutcome, SecondaryTask};
use crate::session::Connector;
use crate::signal::CompletionSignal;
use crate::task::{Deadline, TaskContext};

/// Default delay between starting the primary and the secondary task.
pub const DEFAULT_STABILIZATION_DELAY: Duration = Duration::from_secs(2);

/// Default bound on the primary task's wait for the completion signal.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Parameters of one probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
	pub endpoint: Endpoint,
	/// Applied once, between launching the primary and the secondary task.
	pub stabilization_delay: Duration,
	/// Upper bound on the primary task's wait for the secondary task.
	pub wait_timeout: Duration,
	/// Optional overall bound for the run, measured from its start. Pending
	/// session operations fail once it passes, and the primary wait never
	/// extends beyond it.
	pub deadline: Option<Duration>,
}

impl ProbeConfig {
	pub fn new(endpoint: Endpoint) -> Self {
		Self {
			endpoint,
			stabilization_delay: DEFAULT_STABILIZATION_DELAY,
			wait_timeout: DEFAULT_WAIT_TIMEOUT,
			deadline: None,
		}
	}

	pub fn stabilization_delay(mut self, delay: Duration) -> Self {
		self.stabilization_delay = delay;
		self
	}

	pub fn wait_timeout(mut self, timeout: Duration) -> Self {
		self.wait_timeout = timeout;
		self
	}

	pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
		self.deadline = deadline;
		self
	}
}

/// Raw observations of a run, for a human to compare.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
	pub endpoint: String,
	pub primary: PrimaryOutcome,
	pub secondary: SecondaryOutcome,
	pub elapsed_ms: u64,
}

/// One probe cycle against a target endpoint.
pub struct Probe {
	config: ProbeConfig,
	connector: Arc<dyn Connector>,
	reporter: Arc<dyn Reporter>,
	clock: Arc<dyn Clock>,
}

impl Probe {
	pub fn new(config: ProbeConfig, connector: Arc<dyn Connector>, reporter: Arc<dyn Reporter>) -> Self {
		Self {
			config,
			connector,
			reporter,
			clock: Arc::new(TokioClock),
		}
	}

	/// Replaces the time source used for the stabilization delay, the primary
	/// wait and the run deadline.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Runs both tasks and returns once both have terminated.
	///
	/// Failures inside either task never abort the other one; they are
	/// recorded in the returned report.
	pub async fn run(&self) -> ProbeReport {
		let started = self.clock.now();
		let signal = CompletionSignal::new();
		let ctx = TaskContext {
			endpoint: self.config.endpoint.clone(),
			connector: Arc::clone(&self.connector),
			reporter: Arc::clone(&self.reporter),
			clock: Arc::clone(&self.clock),
			deadline: self.config.deadline.map(|length| Deadline {
				at: started + length,
				length,
			}),
		};

		info!(
			endpoint = %self.config.endpoint,
			stabilization_ms = millis(self.config.stabilization_delay),
			wait_timeout_ms = millis(self.config.wait_timeout),
			"starting probe"
		);

		let primary = tokio::spawn(PrimaryTask::new(ctx.clone(), signal.clone(), self.config.wait_timeout).run());

		self.clock.sleep(self.config.stabilization_delay).await;

		let secondary = tokio::spawn(SecondaryTask::new(ctx, signal.clone()).run());

		let (primary, secondary) = tokio::join!(primary, secondary);

		let primary = primary.unwrap_or_else(|err| {
			warn!(error = %err, "primary task aborted");
			PrimaryOutcome {
				error: Some(format!("task aborted: {err}")),
				..PrimaryOutcome::default()
			}
		});
		let secondary = secondary.unwrap_or_else(|err| {
			warn!(error = %err, "secondary task aborted");
			SecondaryOutcome {
				error: Some(format!("task aborted: {err}")),
				..SecondaryOutcome::default()
			}
		});

		let elapsed = self.clock.now().saturating_duration_since(started);
		let elapsed_ms = millis(elapsed);
		info!(elapsed_ms, signal_fired = signal.is_fired(), "probe finished");

		ProbeReport {
			endpoint: self.config.endpoint.to_string(),
			primary,
			secondary,
			elapsed_ms,
		}
	}
}

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
