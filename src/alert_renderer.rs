//! Composes chat messages from canonical fields via tera templates.
//!
//! Templates are registered once at startup. Which colour a health message
//! gets is decided here, templates only receive the result.

use serde::Deserialize;
use tera::{Context, Tera};

use crate::{error::RenderError, fields::CanonicalFields, rendered_alert::RenderedAlertContent};

/// vendor name used in fallback messages
const VENDOR: &str = "Cloudflare";

/// the one health value rendered with positive styling
pub const HEALTHY: &str = "Healthy";

const DEFAULT_EVENT_HTML: &str = r#"<b><span style="color:Yellow">{{ type }}</span></b> on <b><span style="color:Orange">{{ pool }}</span></b> at {{ time }}"#;
const DEFAULT_EVENT_PLAIN: &str = "{{ type }} on {{ pool }} at {{ time }}";
const DEFAULT_HEALTH_HTML: &str = r#"Current status for <b><span style="color:Orange">{{ service }}</span></b> is <b><span style="color:{{ health_color }}">{{ health }}</span></b>"#;
const DEFAULT_HEALTH_PLAIN: &str = "Current status for {{ service }} is {{ health }}";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Template {
	pub plain: String,
	pub html: String,
}

/// message templates, each can be overridden in the config file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Templates {
	/// primary message of every event
	pub event: Template,
	/// message about the health of a service, only sent if health is known
	pub health: Template,
}

impl Default for Templates {
	fn default() -> Self {
		Self {
			event: Template { plain: DEFAULT_EVENT_PLAIN.to_owned(), html: DEFAULT_EVENT_HTML.to_owned() },
			health: Template {
				plain: DEFAULT_HEALTH_PLAIN.to_owned(),
				html: DEFAULT_HEALTH_HTML.to_owned(),
			},
		}
	}
}

/// styling of a health message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStyle {
	Positive,
	Negative,
}

impl HealthStyle {
	/// `None` if there is no health to report. Only exactly [HEALTHY] is
	/// positive, every other value is alerting.
	pub fn of(health: &str) -> Option<Self> {
		match health {
			"" => None,
			HEALTHY => Some(Self::Positive),
			_ => Some(Self::Negative),
		}
	}

	pub fn color(self) -> &'static str {
		match self {
			Self::Positive => "Lime",
			Self::Negative => "Red",
		}
	}
}

/// Alert renderer
#[derive(Debug)]
pub struct AlertRenderer {
	tera: Tera,
}

impl AlertRenderer {
	pub fn new(templates: &Templates) -> Result<Self, RenderError> {
		let mut tera = Tera::default();

		for (name, template) in [("event", &templates.event), ("health", &templates.health)] {
			for (suffix, body) in [("plain", &template.plain), ("html", &template.html)] {
				let name = format!("{name}.{suffix}");
				tera.add_raw_template(&name, body)
					.map_err(|source| RenderError::Template { name, source })?;
			}
		}

		Ok(Self { tera })
	}

	/// the primary message naming alert type, pool and time
	pub fn event_message(&self, fields: &CanonicalFields) -> Result<RenderedAlertContent, RenderError> {
		self.render("event", &Self::context(fields, None))
	}

	/// the health message, `None` if the event carries no health
	pub fn health_message(
		&self,
		fields: &CanonicalFields,
	) -> Result<Option<RenderedAlertContent>, RenderError> {
		match HealthStyle::of(&fields.health) {
			Some(style) => self.render("health", &Self::context(fields, Some(style))).map(Some),
			None => Ok(None),
		}
	}

	/// degraded message embedding the raw alert payload
	pub fn fallback_message(alert: &str) -> RenderedAlertContent {
		let plain = format!("{VENDOR} event: {alert}");
		let html = format!("{VENDOR} event: <code>{}</code>", tera::escape_html(alert));

		RenderedAlertContent::new_lossy(html, plain)
	}

	fn context(fields: &CanonicalFields, style: Option<HealthStyle>) -> Context {
		let mut context = Context::new();
		context.insert("type", &fields.kind);
		context.insert("time", &fields.time);
		context.insert("src_ip", &fields.src_ip);
		context.insert("pool", &fields.pool);
		context.insert("service", &fields.service);
		context.insert("health", &fields.health);
		context.insert("reason", &fields.reason);

		if let Some(style) = style {
			context.insert("healthy", &(style == HealthStyle::Positive));
			context.insert("health_color", style.color());
		}

		context
	}

	fn render(&self, name: &str, context: &Context) -> Result<RenderedAlertContent, RenderError> {
		let render = |suffix: &str| {
			let name = format!("{name}.{suffix}");
			self.tera.render(&name, context).map_err(|source| RenderError::Render { name, source })
		};

		Ok(RenderedAlertContent::new_lossy(render("html")?, render("plain")?))
	}
}
