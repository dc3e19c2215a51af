use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::endpoint::SessionRole;
use crate::report::{ProbeEvent, RecordingReporter, ReleaseCause};
use crate::testing::{FakeConnector, RecordingClock, Reply, Route, endpoint};

const DELAY: Duration = Duration::from_secs(2);
const WAIT: Duration = Duration::from_secs(15);

fn probe(connector: Arc<FakeConnector>) -> (Probe, Arc<RecordingReporter>) {
	let reporter = Arc::new(RecordingReporter::new());
	let config = ProbeConfig::new(endpoint()).stabilization_delay(DELAY).wait_timeout(WAIT);
	(Probe::new(config, connector, reporter.clone()), reporter)
}

fn kinds(events: &[ProbeEvent]) -> Vec<&'static str> {
	events
		.iter()
		.map(|e| match e {
			ProbeEvent::Connected { .. } => "connected",
			ProbeEvent::ConnectFailed { .. } => "connect_failed",
			ProbeEvent::Sent { .. } => "sent",
			ProbeEvent::SendFailed { .. } => "send_failed",
			ProbeEvent::Received { .. } => "received",
			ProbeEvent::ReceiveFailed { .. } => "receive_failed",
			ProbeEvent::Awaiting { .. } => "awaiting",
			ProbeEvent::Released { cause: ReleaseCause::Signal, .. } => "released_by_signal",
			ProbeEvent::Released { cause: ReleaseCause::Timeout, .. } => "released_by_timeout",
			ProbeEvent::Closed { .. } => "closed",
			ProbeEvent::CloseFailed { .. } => "close_failed",
		})
		.collect()
}

#[test]
fn config_defaults() {
	let config = ProbeConfig::new(endpoint());
	assert_eq!(config.stabilization_delay, Duration::from_secs(2));
	assert_eq!(config.wait_timeout, Duration::from_secs(15));
	assert_eq!(config.deadline, None);
}

#[tokio::test(start_paused = true)]
async fn both_sessions_succeed_and_primary_is_released_by_signal() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo())
			.route(SessionRole::Secondary, Route::echo().reply_delay(Duration::from_secs(1))),
	);
	let (probe, reporter) = probe(connector.clone());

	let report = probe.run().await;

	assert_eq!(
		kinds(&reporter.events_for(SessionRole::Primary)),
		vec!["connected", "sent", "received", "awaiting", "released_by_signal", "closed"]
	);
	assert_eq!(
		kinds(&reporter.events_for(SessionRole::Secondary)),
		vec!["connected", "sent", "received", "closed"]
	);
	assert_eq!(report.endpoint, "wss://probe.test");
	assert_eq!(report.primary.response, Some(json!({"ok": true})));
	assert_eq!(report.secondary.response, Some(json!({"ok": true})));
	assert_eq!(report.primary.release, Some(ReleaseCause::Signal));
	assert!(report.primary.closed && report.secondary.closed);
	assert!((3_000..3_010).contains(&report.elapsed_ms));
}

#[tokio::test(start_paused = true)]
async fn secondary_connect_failure_still_releases_primary_by_signal() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo())
			.route(SessionRole::Secondary, Route::refuse("502 bad gateway")),
	);
	let (probe, reporter) = probe(connector.clone());

	let report = probe.run().await;

	assert_eq!(
		kinds(&reporter.events_for(SessionRole::Secondary)),
		vec!["connect_failed"]
	);
	assert_eq!(report.primary.release, Some(ReleaseCause::Signal));
	assert!(report.primary.closed);
	assert!(report.elapsed_ms < u64::try_from(WAIT.as_millis()).unwrap());
	assert_eq!(connector.closes(SessionRole::Primary).len(), 1);
	assert!(connector.closes(SessionRole::Secondary).is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_secondary_releases_primary_by_timeout_and_is_still_joined() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo())
			.route(SessionRole::Secondary, Route::echo().connect_delay(Duration::from_secs(20))),
	);
	let (probe, reporter) = probe(connector.clone());

	let report = probe.run().await;

	assert_eq!(report.primary.release, Some(ReleaseCause::Timeout));
	assert!(report.primary.closed);
	assert!(report.secondary.connected);
	assert!(report.secondary.closed);
	assert_eq!(report.secondary.response, Some(json!({"ok": true})));
	// Secondary finished at 2s + 20s, well after the primary's 15s bound.
	assert!((22_000..22_010).contains(&report.elapsed_ms));

	let events = reporter.events();
	let primary_closed = events
		.iter()
		.position(|e| matches!(e, ProbeEvent::Closed { role: SessionRole::Primary }))
		.unwrap();
	let secondary_connected = events
		.iter()
		.position(|e| matches!(e, ProbeEvent::Connected { role: SessionRole::Secondary, .. }))
		.unwrap();
	assert!(primary_closed < secondary_connected);
}

#[tokio::test(start_paused = true)]
async fn silent_primary_peer_does_not_hang_the_run() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo().reply(Reply::Never))
			.route(SessionRole::Secondary, Route::echo()),
	);
	let reporter = Arc::new(RecordingReporter::new());
	let probe = Probe::new(ProbeConfig::new(endpoint()), connector.clone(), reporter.clone());

	let report = tokio::time::timeout(Duration::from_secs(3600), probe.run())
		.await
		.expect("probe run did not finish");

	// Bounded by the stabilization delay plus the wait timeout.
	assert!(report.elapsed_ms <= 17_000);
	assert_eq!(report.primary.release, Some(ReleaseCause::Signal));
	assert!(report.primary.closed);
	assert_eq!(report.secondary.response, Some(json!({"ok": true})));
	assert_eq!(
		kinds(&reporter.events_for(SessionRole::Primary)),
		vec!["connected", "sent", "receive_failed", "awaiting", "released_by_signal", "closed"]
	);
}

#[tokio::test(start_paused = true)]
async fn secondary_starts_only_after_stabilization_delay() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo())
			.route(SessionRole::Secondary, Route::echo()),
	);
	let clock = Arc::new(RecordingClock::default());
	let (probe, _) = probe(connector.clone());
	let probe = probe.with_clock(clock.clone());

	probe.run().await;

	let primary_at = connector.connect_time(SessionRole::Primary).unwrap();
	let secondary_at = connector.connect_time(SessionRole::Secondary).unwrap();
	assert!(secondary_at.duration_since(primary_at) >= DELAY);
	assert!(clock.sleeps().contains(&DELAY));
}

#[tokio::test(start_paused = true)]
async fn failures_on_both_sides_still_terminate() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::refuse("dns error"))
			.route(SessionRole::Secondary, Route::refuse("dns error")),
	);
	let (probe, reporter) = probe(connector);

	let report = probe.run().await;

	assert!(!report.primary.connected && !report.secondary.connected);
	assert_eq!(report.primary.release, None);
	assert_eq!(reporter.events().len(), 2);
	assert!((2_000..2_010).contains(&report.elapsed_ms));
}

#[tokio::test(start_paused = true)]
async fn run_deadline_caps_the_whole_probe() {
	let connector = Arc::new(
		FakeConnector::new()
			.route(SessionRole::Primary, Route::echo())
			.route(SessionRole::Secondary, Route::echo().connect_delay(Duration::from_secs(60))),
	);
	let reporter = Arc::new(RecordingReporter::new());
	let config = ProbeConfig::new(endpoint())
		.stabilization_delay(DELAY)
		.wait_timeout(WAIT)
		.deadline(Some(Duration::from_secs(5)));

	let report = Probe::new(config, connector, reporter).run().await;

	assert!((5_000..5_010).contains(&report.elapsed_ms));
	assert!(report.primary.release.is_some());
	assert!(report.primary.closed);
	assert_eq!(report.secondary.error.as_deref(), Some("run deadline of 5000ms elapsed"));
}

#[test]
fn report_serializes_camel_case() {
	let report = ProbeReport {
		endpoint: "wss://probe.test".into(),
		primary: Default::default(),
		secondary: Default::default(),
		elapsed_ms: 42,
	};
	let value = serde_json::to_value(&report).unwrap();
	assert_eq!(value["elapsedMs"], 42);
	assert_eq!(value["primary"]["connected"], false);
}
