//! config file options for the matrix chat transport

use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
/// login data of the bot and the room alerts are posted to
pub struct MatrixSettings {
	/// user id of bot
	pub user_id: OwnedUserId,
	/// homeserver url of bot
	pub homeserver: Url,
	/// password of bot
	pub password: String,
	/// the chat channel every message is sent to
	pub room_id: OwnedRoomId,
	/// where the login session is kept between restarts
	pub session_path: Option<String>,
}
