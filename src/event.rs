//! schema-less access to incoming webhook payloads
//!
//! The vendor sends differently shaped bodies per alert family, so nothing is
//! deserialized into fixed structs. Every lookup is an explicit presence check.

use serde_json::{Map, Value};

use crate::error::ExtractError;

/// name of the nested object carrying the substantive payload
pub const DATA_KEY: &str = "data";

/// a webhook body as delivered, always a json object
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
	pub fn new(body: Map<String, Value>) -> Self {
		Self(body)
	}

	/// accessor for the top level keys
	pub fn payload(&self) -> Payload<'_> {
		Payload(&self.0)
	}

	/// the nested `data` object, if there is one
	pub fn data(&self) -> Result<Payload<'_>, ExtractError> {
		match self.0.get(DATA_KEY) {
			Some(Value::Object(data)) => Ok(Payload(data)),
			Some(_) => Err(ExtractError::NotAnObject(DATA_KEY)),
			None => Err(ExtractError::MissingKey(DATA_KEY)),
		}
	}

	/// the alert part of the payload as verbatim text, used for fallback messages
	///
	/// This is the `data` value if present, the whole body otherwise.
	pub fn alert_text(&self) -> String {
		match self.0.get(DATA_KEY) {
			Some(data) => data.to_string(),
			None => Value::Object(self.0.clone()).to_string(),
		}
	}
}

impl TryFrom<Value> for RawEvent {
	type Error = Value;

	/// fails with the original value if it isn't an object
	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(body) => Ok(Self(body)),
			other => Err(other),
		}
	}
}

/// borrowed view on one level of a payload
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a>(&'a Map<String, Value>);

impl<'a> Payload<'a> {
	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Option<&'a Value> {
		self.0.get(key)
	}

	/// looks up a key that must be present
	pub fn require(&self, key: &'static str) -> Result<String, ExtractError> {
		self.0.get(key).map(value_text).ok_or(ExtractError::MissingKey(key))
	}

	/// looks up a key, the empty string if absent
	pub fn text_or_default(&self, key: &str) -> String {
		self.0.get(key).map(value_text).unwrap_or_default()
	}
}

/// strings are taken verbatim, everything else in its compact json form
pub fn value_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}
