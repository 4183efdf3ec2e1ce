use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

/// the filter for the configured level, with the chatty dependencies turned down
fn filter(settings: &LogSettings) -> Result<EnvFilter> {
	let level = tracing::Level::from_str(settings.level.as_str())
		.with_context(|| format!("invalid log level {:?}", settings.level))?;

	Ok(EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("matrix_sdk=warn".parse()?)
		.add_directive("matrix_sdk_crypto=warn".parse()?)
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?))
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
	let fmt_layer = fmt::layer();

	tracing_subscriber::registry().with(filter(settings)?).with(fmt_layer).init();

	Ok(())
}
