//! [ChatTransport] posting into a matrix room

use std::{
	fs::File,
	io::{BufReader, BufWriter},
	path::Path,
	time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use matrix_sdk::{
	config::{RequestConfig, SyncSettings},
	ruma::{events::room::message::RoomMessageEventContent, OwnedRoomId},
	Client, Session,
};

pub use self::settings::MatrixSettings;
use crate::{
	chat::{ChatTransport, DeliveryId},
	error::ChatError,
	rendered_alert::RenderedAlertContent,
};

pub mod settings;

/// a logged in matrix client, joined to the alert room
#[derive(Debug, Clone)]
pub struct MatrixTransport {
	client: Client,
}

impl MatrixTransport {
	/// Logs in, joins the configured room and keeps the client synced in the
	/// background.
	///
	/// # Arguments
	///
	/// * `settings` - login data and room of the bot
	///
	/// * `timeout` - upper bound of every request the client makes
	pub async fn connect(settings: &MatrixSettings, timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.homeserver_url(settings.homeserver.clone())
			.request_config(RequestConfig::new().disable_retry().timeout(timeout))
			.build()
			.await
			.context("failed to create client")?;

		login(&client, settings).await.context(format!("login failed for {}", settings.user_id))?;

		client.sync_once(SyncSettings::default()).await.context("initial sync failed")?;

		if client.get_joined_room(&settings.room_id).is_none() {
			client
				.join_room_by_id(&settings.room_id)
				.await
				.context(format!("could not join room {}", settings.room_id))?;

			tracing::info!("joined room {}", settings.room_id);
		}

		tokio::spawn({
			let client = client.clone();
			async move {
				client.sync(SyncSettings::default()).await;
			}
		});

		Ok(Self { client })
	}
}

/// restores the stored session if there is one, logs in with the password otherwise
async fn login(client: &Client, settings: &MatrixSettings) -> Result<()> {
	let session_path = settings.session_path.as_deref().map(Path::new);

	if let Some(path) = session_path.filter(|path| path.exists()) {
		let reader = BufReader::new(File::open(path).context("can't open session file")?);
		let session: Session = serde_json::from_reader(reader).context("corrupt session file")?;

		client.restore_login(session).await.context("unable to restore login")?;
		tracing::info!("restored login for {}", settings.user_id);

		return Ok(());
	}

	let response = client
		.login(settings.user_id.localpart(), &settings.password, None, Some(clap::crate_name!()))
		.await
		.context("failed to login homeserver")?;

	tracing::info!("logged in as {}", response.user_id);

	if let Some(path) = session_path {
		let writer = BufWriter::new(File::create(path)?);
		let session = Session {
			access_token: response.access_token,
			user_id: response.user_id,
			device_id: response.device_id,
		};
		serde_json::to_writer(writer, &session).context("could not write session to file")?;
	}

	Ok(())
}

#[async_trait]
impl ChatTransport for MatrixTransport {
	async fn send(
		&self,
		message: &RenderedAlertContent,
		channel: &str,
	) -> Result<DeliveryId, ChatError> {
		let room_id =
			OwnedRoomId::try_from(channel).map_err(|_| ChatError::InvalidChannel(channel.to_owned()))?;

		let room = self
			.client
			.get_joined_room(&room_id)
			.ok_or_else(|| ChatError::NotJoined(channel.to_owned()))?;

		let response = room
			.send(RoomMessageEventContent::from(message), None)
			.await
			.map_err(|err| ChatError::SendFailed(err.to_string()))?;

		Ok(response.event_id.to_string())
	}
}
