//! Structured event log in SQLite.
//!
//! One row per message that reached the chat, carrying the chat delivery id
//! so rows can be matched to what operators saw.

use std::{path::Path, sync::Mutex};

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::error::StoreError;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
	/// path of the sqlite database file
	pub path: String,
	/// table the event rows are written to
	#[serde(default = "default_table")]
	pub table: String,
}

fn default_table() -> String {
	"cloudflare_events".to_owned()
}

/// a persisted row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
	pub kind: String,
	pub pool: String,
	pub service: String,
	pub health: String,
	pub reason: String,
	pub logdate: NaiveDate,
	/// local time of day the row was written, `HH:MM:SS`
	pub logtime: String,
	pub source: String,
	/// delivery id of the chat message
	pub message: String,
}

/// write interface of the event log
pub trait EventStore: Send + Sync {
	fn insert(&self, table: &str, record: &LogRecord) -> Result<(), StoreError>;
}

/// only plain identifiers are interpolated into sql
fn validate_table(table: &str) -> Result<(), StoreError> {
	let mut chars = table.chars();
	let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

	if valid {
		Ok(())
	} else {
		Err(StoreError::InvalidTable(table.to_owned()))
	}
}

fn create_table_sql(table: &str) -> String {
	format!(
		"CREATE TABLE IF NOT EXISTS {table} (
			id       INTEGER PRIMARY KEY AUTOINCREMENT,
			type     TEXT,
			pool     TEXT,
			service  TEXT,
			health   TEXT,
			reason   TEXT,
			logdate  TEXT NOT NULL,
			logtime  TEXT NOT NULL,
			source   TEXT NOT NULL,
			message  TEXT
		);"
	)
}

#[derive(Debug)]
pub struct SqliteStore {
	conn: Mutex<Connection>,
}

impl SqliteStore {
	/// opens the database and creates `table` if it doesn't exist yet
	pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
		Self::init(Connection::open(path)?, table)
	}

	pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
		Self::init(Connection::open_in_memory()?, table)
	}

	fn init(conn: Connection, table: &str) -> Result<Self, StoreError> {
		validate_table(table)?;
		conn.execute_batch(&create_table_sql(table))?;

		Ok(Self { conn: Mutex::new(conn) })
	}

	/// the most recent rows, newest first
	pub fn recent(&self, table: &str, limit: u32) -> Result<Vec<LogRecord>, StoreError> {
		validate_table(table)?;
		let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

		let mut stmt = conn.prepare(&format!(
			"SELECT type, pool, service, health, reason, logdate, logtime, source, message
			 FROM {table}
			 ORDER BY id DESC
			 LIMIT ?1"
		))?;

		let rows = stmt.query_map(params![limit], |row| {
			Ok(LogRecord {
				kind: row.get(0)?,
				pool: row.get(1)?,
				service: row.get(2)?,
				health: row.get(3)?,
				reason: row.get(4)?,
				logdate: row.get(5)?,
				logtime: row.get(6)?,
				source: row.get(7)?,
				message: row.get(8)?,
			})
		})?;

		Ok(rows.collect::<rusqlite::Result<_>>()?)
	}
}

impl EventStore for SqliteStore {
	fn insert(&self, table: &str, record: &LogRecord) -> Result<(), StoreError> {
		validate_table(table)?;
		let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

		conn.execute(
			&format!(
				"INSERT INTO {table} (type, pool, service, health, reason, logdate, logtime, source, message)
				 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
			),
			params![
				record.kind,
				record.pool,
				record.service,
				record.health,
				record.reason,
				record.logdate,
				record.logtime,
				record.source,
				record.message,
			],
		)?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TABLE: &str = "cloudflare_events";

	fn record(health: &str, message: &str) -> LogRecord {
		LogRecord {
			kind: "pool_health_check".to_owned(),
			pool: "web-pool".to_owned(),
			service: "srv1".to_owned(),
			health: health.to_owned(),
			reason: String::new(),
			logdate: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
			logtime: "02:00:00".to_owned(),
			source: "192.0.2.10".to_owned(),
			message: message.to_owned(),
		}
	}

	#[test]
	fn insert_and_read_back() {
		let store = SqliteStore::open_in_memory(TABLE).unwrap();

		store.insert(TABLE, &record("Healthy", "$first")).unwrap();
		store.insert(TABLE, &record("Unhealthy", "$second")).unwrap();

		let rows = store.recent(TABLE, 10).unwrap();
		assert_eq!(rows, vec![record("Unhealthy", "$second"), record("Healthy", "$first")]);
		assert_eq!(store.recent(TABLE, 1).unwrap().len(), 1);
	}

	#[test]
	fn opening_twice_keeps_rows() {
		let conn = Connection::open_in_memory().unwrap();
		let store = SqliteStore::init(conn, TABLE).unwrap();
		store.insert(TABLE, &record("Healthy", "$id")).unwrap();

		let conn = store.conn.into_inner().unwrap();
		let store = SqliteStore::init(conn, TABLE).unwrap();
		assert_eq!(store.recent(TABLE, 10).unwrap().len(), 1);
	}

	#[test]
	fn rejects_unsafe_table_names() {
		for table in ["", "1events", "events; DROP TABLE x", "ev-ents", "ev ents"] {
			assert!(matches!(validate_table(table), Err(StoreError::InvalidTable(_))), "{table}");
		}
		assert!(validate_table("_events_2023").is_ok());
		assert!(SqliteStore::open_in_memory("bad name").is_err());
	}

	#[test]
	fn insert_into_unknown_table_fails() {
		let store = SqliteStore::open_in_memory(TABLE).unwrap();
		assert!(matches!(store.insert("other", &record("Healthy", "$id")), Err(StoreError::Sqlite(_))));
	}
}
