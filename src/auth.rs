//! webhook authentication
//!
//! The vendor transmits the shared secret in plain text inside a configurable
//! header, so authentication is an exact comparison.

use http::HeaderMap;

use crate::error::AuthError;

/// Compares the secret carried in `header` against the configured secret.
///
/// An absent header is an error, a different value is `Ok(false)`.
pub fn authenticate(headers: &HeaderMap, header: &str, secret: &str) -> Result<bool, AuthError> {
	let sent = headers.get(header).ok_or_else(|| AuthError::MissingHeader(header.to_owned()))?;

	Ok(sent.as_bytes() == secret.as_bytes())
}
