//! http endpoint the vendor delivers its webhooks to

use std::{
	net::{IpAddr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::JsonRejection, ConnectInfo, Extension, Json},
	http::{HeaderMap, StatusCode},
	routing::post,
	Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{auth, dispatcher::Dispatcher, error::PipelineError, event::RawEvent, metrics};

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// route the webhooks are posted to
	#[serde(default = "default_path")]
	pub path: String,
	/// name of the header carrying the shared secret
	pub auth_header: String,
	pub webhook_secret: String,
}

fn default_path() -> String {
	"/".to_owned()
}

impl WebhookReceiverSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

struct State {
	settings: WebhookReceiverSettings,
	dispatcher: Dispatcher,
}

async fn webhook_receiver(
	Extension(state): Extension<Arc<State>>,
	ConnectInfo(peer): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
	body: Result<Json<Value>, JsonRejection>,
) -> StatusCode {
	let State { settings, dispatcher } = &*state;

	match auth::authenticate(&headers, &settings.auth_header, &settings.webhook_secret) {
		Ok(true) => {}
		Ok(false) => {
			metrics::REJECTED_REQUESTS.with_label_values(&["wrong_secret"]).inc();
			tracing::warn!(%peer, "rejected webhook with wrong secret");
			return StatusCode::FORBIDDEN;
		}
		Err(err) => {
			metrics::REJECTED_REQUESTS.with_label_values(&["missing_header"]).inc();
			tracing::warn!(%peer, "rejected webhook: {err}");
			return StatusCode::UNAUTHORIZED;
		}
	}

	let raw = match body.map(|Json(body)| RawEvent::try_from(body)) {
		Ok(Ok(raw)) => raw,
		Ok(Err(body)) => {
			metrics::REJECTED_REQUESTS.with_label_values(&["bad_body"]).inc();
			tracing::debug!("webhook body is not an object: {body}");
			return StatusCode::BAD_REQUEST;
		}
		Err(err) => {
			metrics::REJECTED_REQUESTS.with_label_values(&["bad_body"]).inc();
			tracing::debug!("failed to deserialize webhook: {err:?}");
			return StatusCode::BAD_REQUEST;
		}
	};

	metrics::RECEIVED_EVENTS.inc();

	match dispatcher.handle_event(&raw, &peer.ip().to_string()).await {
		Ok(_) => StatusCode::OK,
		Err(PipelineError::Timestamp(_)) => StatusCode::UNPROCESSABLE_ENTITY,
	}
}

fn router(settings: WebhookReceiverSettings, dispatcher: Dispatcher) -> Router {
	let path = settings.path.clone();
	let state = Arc::new(State { settings, dispatcher });

	Router::new().route(&path, post(webhook_receiver)).layer(Extension(state))
}

pub async fn run_webhook_receiver(
	settings: WebhookReceiverSettings,
	dispatcher: Dispatcher,
) -> Result<()> {
	let addr = settings.to_socket_addr();
	let app = router(settings, dispatcher);

	tracing::info!("listening for webhooks on {addr}");

	axum::Server::bind(&addr)
		.serve(app.into_make_service_with_connect_info::<SocketAddr>())
		.await
		.context("webhook endpoint crashed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use async_trait::async_trait;
	use axum::http::HeaderValue;
	use serde_json::json;

	use super::*;
	use crate::{
		alert_renderer::{AlertRenderer, Templates},
		chat::ChatTransport,
		error::ChatError,
		rendered_alert::RenderedAlertContent,
		sink::{Sink, TimeoutSettings},
		store::SqliteStore,
	};

	const HEADER: &str = "cf-webhook-auth";
	const TABLE: &str = "cloudflare_events";

	#[derive(Default)]
	struct RecordingChat(Mutex<Vec<String>>);

	#[async_trait]
	impl ChatTransport for RecordingChat {
		async fn send(&self, message: &RenderedAlertContent, _: &str) -> Result<String, ChatError> {
			self.0.lock().unwrap().push(message.plain().to_owned());
			Ok("$event".to_owned())
		}
	}

	fn state(chat: Arc<RecordingChat>) -> Arc<State> {
		let store = Arc::new(SqliteStore::open_in_memory(TABLE).unwrap());
		let sink = Sink::new(chat, store, "!room:example.org".to_owned(), TABLE.to_owned(), TimeoutSettings::default());

		Arc::new(State {
			settings: WebhookReceiverSettings {
				bind_address: IpAddr::from([127, 0, 0, 1]),
				port: 0,
				path: default_path(),
				auth_header: HEADER.to_owned(),
				webhook_secret: "s3cret".to_owned(),
			},
			dispatcher: Dispatcher::new(AlertRenderer::new(&Templates::default()).unwrap(), sink),
		})
	}

	fn headers(secret: Option<&str>) -> HeaderMap {
		let mut headers = HeaderMap::new();
		if let Some(secret) = secret {
			headers.insert(HEADER, HeaderValue::from_str(secret).unwrap());
		}
		headers
	}

	async fn deliver(chat: Arc<RecordingChat>, secret: Option<&str>, body: Value) -> StatusCode {
		webhook_receiver(
			Extension(state(chat)),
			ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40000))),
			headers(secret),
			Ok(Json(body)),
		)
		.await
	}

	fn body() -> Value {
		json!({
			"alert_type": "pool_health_check",
			"data": { "time": "2023-04-01T00:00:00Z", "pool": "p", "pool_name": "web-pool" }
		})
	}

	#[tokio::test]
	async fn accepts_authenticated_webhooks() {
		let chat = Arc::new(RecordingChat::default());

		assert_eq!(deliver(chat.clone(), Some("s3cret"), body()).await, StatusCode::OK);
		assert_eq!(chat.0.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn rejects_wrong_secret() {
		let chat = Arc::new(RecordingChat::default());

		assert_eq!(deliver(chat.clone(), Some("guess"), body()).await, StatusCode::FORBIDDEN);
		assert!(chat.0.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn rejects_missing_header() {
		let chat = Arc::new(RecordingChat::default());

		assert_eq!(deliver(chat.clone(), None, body()).await, StatusCode::UNAUTHORIZED);
		assert!(chat.0.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn rejects_non_object_bodies() {
		let chat = Arc::new(RecordingChat::default());

		assert_eq!(deliver(chat, Some("s3cret"), json!(["x"])).await, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn unparseable_timestamp_is_unprocessable() {
		let chat = Arc::new(RecordingChat::default());
		let body = json!({ "data": { "timestamp": "soon" } });

		assert_eq!(deliver(chat.clone(), Some("s3cret"), body).await, StatusCode::UNPROCESSABLE_ENTITY);
		assert!(chat.0.lock().unwrap().is_empty());
	}
}
