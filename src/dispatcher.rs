//! Runs one webhook event through the pipeline: timestamp, field extraction,
//! composition and logging.

use crate::{
	alert_renderer::AlertRenderer,
	error::{ExtractError, PipelineError, RenderError},
	event::RawEvent,
	fields::{self, CanonicalFields},
	metrics,
	rendered_alert::RenderedAlertContent,
	sink::{LogOutcome, Sink},
	timestamp,
};

/// result of structuring an event
#[derive(Debug)]
pub enum Enrichment {
	/// every field could be extracted, the primary message is composed from them
	Complete { fields: CanonicalFields, message: RenderedAlertContent },
	/// the payload didn't have the expected shape, the message carries the raw alert
	Fallback { fields: CanonicalFields, message: RenderedAlertContent, cause: FallbackCause },
}

impl Enrichment {
	pub fn fields(&self) -> &CanonicalFields {
		match self {
			Self::Complete { fields, .. } | Self::Fallback { fields, .. } => fields,
		}
	}

	pub fn message(&self) -> &RenderedAlertContent {
		match self {
			Self::Complete { message, .. } | Self::Fallback { message, .. } => message,
		}
	}

	pub fn is_fallback(&self) -> bool {
		matches!(self, Self::Fallback { .. })
	}
}

#[derive(Debug)]
pub enum FallbackCause {
	Extract(ExtractError),
	Render(RenderError),
}

/// what happened to an event
#[derive(Debug)]
pub struct HandledEvent {
	pub enrichment: Enrichment,
	/// outcome of the primary (or fallback) message
	pub primary: LogOutcome,
	/// outcome of the health message, `None` if none was due
	pub health: Option<LogOutcome>,
}

pub struct Dispatcher {
	renderer: AlertRenderer,
	sink: Sink,
}

impl Dispatcher {
	pub fn new(renderer: AlertRenderer, sink: Sink) -> Self {
		Self { renderer, sink }
	}

	/// Handles a webhook event sent from `src` with the host's local time zone.
	///
	/// Only an unparseable timestamp aborts the event, every other failure
	/// degrades to a fallback message or is logged.
	pub async fn handle_event(&self, raw: &RawEvent, src: &str) -> Result<HandledEvent, PipelineError> {
		let time = timestamp::normalize(raw).map_err(|err| {
			metrics::ABORTED_EVENTS.inc();
			tracing::error!("aborting cloudflare event: {err}: {}", raw.alert_text());
			err
		})?;

		Ok(self.dispatch(raw, time, src).await)
	}

	/// [Dispatcher::handle_event] with an already normalized time
	pub async fn dispatch(&self, raw: &RawEvent, time: String, src: &str) -> HandledEvent {
		tracing::info!("cloudflare alert: {}", raw.alert_text());

		let enrichment = self.enrich(raw, time, src);

		let primary = self.sink.log(enrichment.message(), enrichment.fields()).await;

		let health = match self.renderer.health_message(enrichment.fields()) {
			Ok(Some(message)) => Some(self.sink.log(&message, enrichment.fields()).await),
			Ok(None) => None,
			Err(err) => {
				tracing::error!("failed to compose health message: {err:?}");
				None
			}
		};

		HandledEvent { enrichment, primary, health }
	}

	/// extracts the canonical fields and composes the primary message
	pub fn enrich(&self, raw: &RawEvent, time: String, src: &str) -> Enrichment {
		let extracted = raw.data().and_then(fields::extract).map(|mut fields| {
			fields.kind = raw.payload().text_or_default("alert_type");
			fields.time = time.clone();
			fields.src_ip = normalize_source(src);
			fields
		});

		let cause = match extracted {
			Ok(fields) => match self.renderer.event_message(&fields) {
				Ok(message) => {
					tracing::debug!(?fields, "cloudflare fields");
					return Enrichment::Complete { fields, message };
				}
				Err(err) => FallbackCause::Render(err),
			},
			Err(err) => FallbackCause::Extract(err),
		};

		metrics::FALLBACK_MESSAGES.inc();
		tracing::warn!(?cause, "unrecognized cloudflare format: {}", raw.alert_text());

		// only the dispatcher supplied fields survive a failed extraction
		let fields = CanonicalFields { time, src_ip: normalize_source(src), ..Default::default() };

		Enrichment::Fallback {
			fields,
			message: AlertRenderer::fallback_message(&raw.alert_text()),
			cause,
		}
	}
}

/// A sender may be given as several whitespace separated addresses (its v6
/// and v4 address), they are stored separated by a single space.
pub fn normalize_source(src: &str) -> String {
	src.split_whitespace().collect::<Vec<_>>().join(" ")
}
