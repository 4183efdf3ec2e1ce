//! error types of the event pipeline

use std::time::Duration;

use thiserror::Error;

/// the timestamp of an event could not be normalized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
	/// the located timestamp value is not a json string
	#[error("timestamp is not a string: {0}")]
	NotAString(String),
	/// none of the known formats matched
	#[error("unparseable timestamp {0:?}")]
	Unparseable(String),
}

/// a key the vendor payload shape promised was absent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
	#[error("missing key `{0}`")]
	MissingKey(&'static str),
	#[error("`{0}` is not a json object")]
	NotAnObject(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
	/// the request didn't carry the configured authentication header at all
	#[error("authentication header `{0}` is missing")]
	MissingHeader(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
	#[error("failed to register template `{name}`")]
	Template {
		name: String,
		#[source]
		source: tera::Error,
	},
	#[error("failed to render template `{name}`")]
	Render {
		name: String,
		#[source]
		source: tera::Error,
	},
}

/// errors of the chat transport, none of them are retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
	#[error("invalid channel id {0:?}")]
	InvalidChannel(String),
	#[error("not joined to channel {0}")]
	NotJoined(String),
	#[error("failed to send message: {0}")]
	SendFailed(String),
	#[error("chat transport timed out after {0:?}")]
	Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum StoreError {
	#[error("invalid table name {0:?}")]
	InvalidTable(String),
	#[error("sqlite error")]
	Sqlite(#[from] rusqlite::Error),
	#[error("store connection lock poisoned")]
	Poisoned,
	#[error("store write task failed: {0}")]
	Task(String),
}

/// errors that abort the handling of a single event
#[derive(Error, Debug)]
pub enum PipelineError {
	#[error("failed to normalize timestamp")]
	Timestamp(#[from] TimestampError),
}
