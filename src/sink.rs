//! Delivers composed messages to chat and records them in the event log.
//!
//! A row is only written for messages the chat transport accepted, because
//! the row carries the delivery id. Nothing is retried or queued.

use std::{sync::Arc, time::Duration};

use chrono::Local;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::{
	chat::ChatTransport,
	error::{ChatError, StoreError},
	fields::CanonicalFields,
	metrics,
	rendered_alert::RenderedAlertContent,
	store::{EventStore, LogRecord},
};

/// upper bounds of the outbound calls of a single message
#[serde_as]
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSettings {
	#[serde_as(as = "DurationSeconds<f64>")]
	pub chat: Duration,
	#[serde_as(as = "DurationSeconds<f64>")]
	pub store: Duration,
}

impl Default for TimeoutSettings {
	fn default() -> Self {
		Self { chat: Duration::from_secs(10), store: Duration::from_secs(5) }
	}
}

/// what happened to a single message
#[derive(Debug)]
pub enum LogOutcome {
	/// delivered to chat and written to the store
	Persisted(LogRecord),
	/// the chat transport failed, no row was written
	ChatFailed(ChatError),
	/// delivered to chat but the row couldn't be written, it is dropped
	StoreFailed { record: LogRecord, error: StoreError },
	/// delivered to chat but the store didn't confirm the row in time, the
	/// write keeps running and the row may still land
	StoreTimedOut { record: LogRecord, after: Duration },
}

impl LogOutcome {
	pub fn record(&self) -> Option<&LogRecord> {
		match self {
			Self::Persisted(record)
			| Self::StoreFailed { record, .. }
			| Self::StoreTimedOut { record, .. } => Some(record),
			Self::ChatFailed(_) => None,
		}
	}
}

pub struct Sink {
	chat: Arc<dyn ChatTransport>,
	store: Arc<dyn EventStore>,
	channel: String,
	table: String,
	timeouts: TimeoutSettings,
}

impl Sink {
	pub fn new(
		chat: Arc<dyn ChatTransport>,
		store: Arc<dyn EventStore>,
		channel: String,
		table: String,
		timeouts: TimeoutSettings,
	) -> Self {
		Self { chat, store, channel, table, timeouts }
	}

	/// Sends `message` to chat and persists `event` together with the
	/// delivery id.
	pub async fn log(&self, message: &RenderedAlertContent, event: &CanonicalFields) -> LogOutcome {
		tracing::info!(
			kind = %event.kind,
			pool = %event.pool,
			service = %event.service,
			health = %event.health,
			reason = %event.reason,
			time = %event.time,
			source = %event.src_ip,
			"cloudflare event: {}",
			message.plain()
		);

		let delivery_id = match self.send(message).await {
			Ok(delivery_id) => {
				metrics::CHAT_SENT.inc();
				delivery_id
			}
			Err(err) => {
				metrics::CHAT_FAILED.inc();
				tracing::error!(channel = %self.channel, "error sending message to chat: {err}");
				return LogOutcome::ChatFailed(err);
			}
		};

		let now = Local::now();
		let record = LogRecord {
			kind: event.kind.clone(),
			pool: event.pool.clone(),
			service: event.service.clone(),
			health: event.health.clone(),
			reason: event.reason.clone(),
			logdate: now.date_naive(),
			logtime: now.format("%H:%M:%S").to_string(),
			source: event.src_ip.clone(),
			message: delivery_id,
		};

		match tokio::time::timeout(self.timeouts.store, self.write(record.clone())).await {
			Ok(Ok(())) => {
				metrics::STORE_WRITES.inc();
				LogOutcome::Persisted(record)
			}
			Err(_) => {
				let after = self.timeouts.store;
				metrics::STORE_TIMED_OUT.inc();
				tracing::warn!(
					table = %self.table,
					delivery_id = %record.message,
					"event log row not confirmed within {after:?}, it may still be written"
				);
				LogOutcome::StoreTimedOut { record, after }
			}
			Ok(Err(error)) => {
				metrics::STORE_FAILED.inc();
				tracing::error!(
					table = %self.table,
					delivery_id = %record.message,
					"dropping event log row: {error}"
				);
				LogOutcome::StoreFailed { record, error }
			}
		}
	}

	async fn send(&self, message: &RenderedAlertContent) -> Result<String, ChatError> {
		tokio::time::timeout(self.timeouts.chat, self.chat.send(message, &self.channel))
			.await
			.map_err(|_| ChatError::Timeout(self.timeouts.chat))?
	}

	/// the insert runs on the blocking pool, dropping the returned future
	/// detaches it without cancelling
	async fn write(&self, record: LogRecord) -> Result<(), StoreError> {
		let store = Arc::clone(&self.store);
		let table = self.table.clone();

		tokio::task::spawn_blocking(move || store.insert(&table, &record))
			.await
			.map_err(|err| StoreError::Task(err.to_string()))?
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use async_trait::async_trait;

	use super::*;
	use crate::store::SqliteStore;

	const TABLE: &str = "cloudflare_events";

	#[derive(Default)]
	struct RecordingChat {
		fail: bool,
		delay: Option<Duration>,
		sent: Mutex<Vec<(String, String)>>,
	}

	#[async_trait]
	impl ChatTransport for RecordingChat {
		async fn send(&self, message: &RenderedAlertContent, channel: &str) -> Result<String, ChatError> {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.fail {
				return Err(ChatError::SendFailed("M_FORBIDDEN".to_owned()));
			}

			let mut sent = self.sent.lock().unwrap();
			sent.push((channel.to_owned(), message.plain().to_owned()));
			Ok(format!("$event{}", sent.len()))
		}
	}

	struct BrokenStore;

	/// takes its time before handing the row to sqlite
	struct SlowStore {
		delay: Duration,
		inner: SqliteStore,
	}

	impl EventStore for SlowStore {
		fn insert(&self, table: &str, record: &LogRecord) -> Result<(), StoreError> {
			std::thread::sleep(self.delay);
			self.inner.insert(table, record)
		}
	}

	impl EventStore for BrokenStore {
		fn insert(&self, table: &str, _: &LogRecord) -> Result<(), StoreError> {
			Err(StoreError::InvalidTable(table.to_owned()))
		}
	}

	fn fields() -> CanonicalFields {
		CanonicalFields {
			kind: "pool_health_check".to_owned(),
			pool: "web-pool".to_owned(),
			service: "srv1".to_owned(),
			health: "Healthy".to_owned(),
			src_ip: "192.0.2.10".to_owned(),
			..Default::default()
		}
	}

	fn message() -> RenderedAlertContent {
		RenderedAlertContent::new("<b>hi</b>".to_owned(), "hi".to_owned()).unwrap()
	}

	fn sink(chat: Arc<RecordingChat>, store: Arc<dyn EventStore>) -> Sink {
		Sink::new(chat, store, "!room:example.org".to_owned(), TABLE.to_owned(), TimeoutSettings::default())
	}

	#[tokio::test]
	async fn persists_delivered_messages() {
		let chat = Arc::new(RecordingChat::default());
		let store = Arc::new(SqliteStore::open_in_memory(TABLE).unwrap());

		let outcome = sink(chat.clone(), store.clone()).log(&message(), &fields()).await;

		let record = match outcome {
			LogOutcome::Persisted(record) => record,
			other => panic!("unexpected outcome {other:?}"),
		};
		assert_eq!(record.message, "$event1");
		assert_eq!(record.source, "192.0.2.10");
		assert_eq!(record.health, "Healthy");
		assert_eq!(record.logtime.len(), 8);

		assert_eq!(*chat.sent.lock().unwrap(), vec![("!room:example.org".to_owned(), "hi".to_owned())]);
		assert_eq!(store.recent(TABLE, 10).unwrap(), vec![record]);
	}

	#[tokio::test]
	async fn chat_failure_skips_persistence() {
		let chat = Arc::new(RecordingChat { fail: true, ..Default::default() });
		let store = Arc::new(SqliteStore::open_in_memory(TABLE).unwrap());

		let outcome = sink(chat, store.clone()).log(&message(), &fields()).await;

		assert!(matches!(outcome, LogOutcome::ChatFailed(ChatError::SendFailed(_))));
		assert!(outcome.record().is_none());
		assert!(store.recent(TABLE, 10).unwrap().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn slow_chat_times_out() {
		let chat = Arc::new(RecordingChat { delay: Some(Duration::from_secs(60)), ..Default::default() });
		let store = Arc::new(SqliteStore::open_in_memory(TABLE).unwrap());

		let outcome = sink(chat, store.clone()).log(&message(), &fields()).await;

		assert!(matches!(outcome, LogOutcome::ChatFailed(ChatError::Timeout(_))));
		assert!(store.recent(TABLE, 10).unwrap().is_empty());
	}

	#[tokio::test]
	async fn store_failure_is_reported_not_retried() {
		let chat = Arc::new(RecordingChat::default());

		let outcome = sink(chat.clone(), Arc::new(BrokenStore)).log(&message(), &fields()).await;

		match outcome {
			LogOutcome::StoreFailed { record, error: StoreError::InvalidTable(table) } => {
				assert_eq!(record.message, "$event1");
				assert_eq!(table, TABLE);
			}
			other => panic!("unexpected outcome {other:?}"),
		}
		assert_eq!(chat.sent.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn slow_store_is_reported_as_timed_out_not_dropped() {
		let chat = Arc::new(RecordingChat::default());
		let store = Arc::new(SlowStore {
			delay: Duration::from_millis(300),
			inner: SqliteStore::open_in_memory(TABLE).unwrap(),
		});
		let timeouts = TimeoutSettings { store: Duration::from_millis(50), ..Default::default() };
		let sink = Sink::new(chat, store.clone(), "!room:example.org".to_owned(), TABLE.to_owned(), timeouts);

		let outcome = sink.log(&message(), &fields()).await;

		match &outcome {
			LogOutcome::StoreTimedOut { record, after } => {
				assert_eq!(record.message, "$event1");
				assert_eq!(*after, Duration::from_millis(50));
			}
			other => panic!("unexpected outcome {other:?}"),
		}

		// the detached write still completes
		tokio::time::sleep(Duration::from_millis(600)).await;
		let rows = store.inner.recent(TABLE, 10).unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(Some(&rows[0]), outcome.record());
	}
}
