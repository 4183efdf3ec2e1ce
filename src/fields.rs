//! maps vendor specific payload keys onto the canonical field set

use serde::{Deserialize, Serialize};

use crate::{error::ExtractError, event::Payload};

/// the normalized record of an event
///
/// Every field is always present, absent source keys leave the empty string.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFields {
	/// alert type, `alert_type` of the top level payload
	#[serde(rename = "type")]
	pub kind: String,
	/// normalized local time of the event
	pub time: String,
	/// address(es) of the sender
	pub src_ip: String,
	pub pool: String,
	pub service: String,
	pub health: String,
	pub reason: String,
}

/// Extracts pool, service, health and reason from the inner payload of an event.
///
/// The checks mirror the vendor's payload families:
/// - `pool_name` is read whenever a `pool` key exists, an event having `pool`
///   but no `pool_name` is malformed
/// - service is `origin_name`, else `name`
/// - health is `new_health`, else `status`
/// - reason is `origin_failure_reason`, else `reason` if `status` exists
pub fn extract(payload: Payload<'_>) -> Result<CanonicalFields, ExtractError> {
	let mut fields = CanonicalFields::default();

	if payload.contains("pool") {
		fields.pool = payload.require("pool_name")?;
	}

	if payload.contains("origin_name") {
		fields.service = payload.require("origin_name")?;
	} else if payload.contains("name") {
		fields.service = payload.require("name")?;
	}

	if payload.contains("new_health") {
		fields.health = payload.require("new_health")?;
	} else if payload.contains("status") {
		fields.health = payload.require("status")?;
	}

	if payload.contains("origin_failure_reason") {
		fields.reason = payload.require("origin_failure_reason")?;
	} else if payload.contains("status") {
		fields.reason = payload.require("reason")?;
	}

	Ok(fields)
}
