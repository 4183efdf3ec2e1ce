//! prometheus meters of the event pipeline, exposed by
//! [telemetry_endpoint](crate::telemetry_endpoint)

use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

const NAMESPACE: &str = "flare_relay";

#[allow(clippy::expect_used)]
fn counter(name: &str, help: &str, subsystem: &str) -> IntCounter {
	register_int_counter!(opts!(name, help).namespace(NAMESPACE).subsystem(subsystem))
		.expect("metric names are unique")
}

#[allow(clippy::expect_used)]
fn counter_vec(name: &str, help: &str, subsystem: &str, labels: &[&str]) -> IntCounterVec {
	register_int_counter_vec!(opts!(name, help).namespace(NAMESPACE).subsystem(subsystem), labels)
		.expect("metric names are unique")
}

/// total number of authenticated events
pub static RECEIVED_EVENTS: Lazy<IntCounter> =
	Lazy::new(|| counter("received_events_total", "total number of authenticated events", "webhook"));

/// requests turned away, labeled by `missing_header`, `wrong_secret`, `bad_body`
pub static REJECTED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
	counter_vec("rejected_requests_total", "requests that were not processed", "webhook", &["reason"])
});

/// events that were sent as raw payload because extraction failed
pub static FALLBACK_MESSAGES: Lazy<IntCounter> = Lazy::new(|| {
	counter("fallback_messages_total", "events sent as unrecognized raw payload", "pipeline")
});

/// events aborted because of an unparseable timestamp
pub static ABORTED_EVENTS: Lazy<IntCounter> =
	Lazy::new(|| counter("aborted_events_total", "events aborted before composing", "pipeline"));

pub static CHAT_SENT: Lazy<IntCounter> =
	Lazy::new(|| counter("messages_sent_total", "messages delivered to chat", "chat"));

pub static CHAT_FAILED: Lazy<IntCounter> =
	Lazy::new(|| counter("messages_failed_total", "messages the chat transport rejected", "chat"));

pub static STORE_WRITES: Lazy<IntCounter> =
	Lazy::new(|| counter("writes_total", "rows written to the event log", "store"));

pub static STORE_FAILED: Lazy<IntCounter> =
	Lazy::new(|| counter("writes_failed_total", "rows that could not be written", "store"));

/// rows the store didn't confirm in time, they may still have been written
pub static STORE_TIMED_OUT: Lazy<IntCounter> = Lazy::new(|| {
	counter("writes_timed_out_total", "rows not confirmed within the store timeout", "store")
});
