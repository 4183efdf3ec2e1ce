use std::sync::Arc;

use anyhow::{Context, Result};
use flare_relay::{
	alert_renderer::AlertRenderer, dispatcher::Dispatcher, log, matrix::MatrixTransport,
	settings::Settings, sink::Sink, store::SqliteStore, telemetry_endpoint, webhook_receiver,
};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let renderer = AlertRenderer::new(&settings.templates).context("failed to register templates")?;

	let store = SqliteStore::open(&settings.store.path, &settings.store.table)
		.with_context(|| format!("failed to open event store {}", settings.store.path))?;

	let chat = MatrixTransport::connect(&settings.matrix, settings.timeouts.chat)
		.await
		.context(format!("failed to spawn bot {}", settings.matrix.user_id))?;

	let sink = Sink::new(
		Arc::new(chat),
		Arc::new(store),
		settings.matrix.room_id.to_string(),
		settings.store.table.clone(),
		settings.timeouts,
	);

	tokio::spawn({
		let telemetry = settings.telemetry_endpoint.clone();
		async move {
			if let Err(err) = telemetry_endpoint::run_telemetry_endpoint(telemetry).await {
				tracing::error!("{err:?}");
			}
		}
	});

	webhook_receiver::run_webhook_receiver(settings.webhook_receiver, Dispatcher::new(renderer, sink))
		.await
}
