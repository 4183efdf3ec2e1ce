//! the chat transport seam

use async_trait::async_trait;

use crate::{error::ChatError, rendered_alert::RenderedAlertContent};

/// identifier the chat service assigned to a delivered message
pub type DeliveryId = String;

/// Sends one composed message into a chat channel.
///
/// A single attempt is made per call, retrying is up to nobody.
#[async_trait]
pub trait ChatTransport: Send + Sync {
	async fn send(
		&self,
		message: &RenderedAlertContent,
		channel: &str,
	) -> Result<DeliveryId, ChatError>;
}
