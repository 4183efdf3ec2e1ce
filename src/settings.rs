use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
	alert_renderer::Templates, log::LogSettings, matrix::MatrixSettings, sink::TimeoutSettings,
	store::StoreSettings, telemetry_endpoint::TelemetryEndpointSettings,
	webhook_receiver::WebhookReceiverSettings,
};

/// prefix of environment variables overriding config file values, e.g.
/// `FLARE_RELAY__WEBHOOK_RECEIVER__WEBHOOK_SECRET`
const ENV_PREFIX: &str = "FLARE_RELAY";

/// Settings are loaded once at startup and handed to the components, nothing
/// reads or changes them afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub webhook_receiver: WebhookReceiverSettings,
	pub matrix: MatrixSettings,
	pub store: StoreSettings,
	#[serde(default)]
	pub timeouts: TimeoutSettings,
	#[serde(default)]
	pub templates: Templates,
	pub log: LogSettings,
	pub telemetry_endpoint: TelemetryEndpointSettings,
}

impl Settings {
	/// parses the command line and loads the config file it points to
	pub fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").context("no config path")?;

		let mut settings = Self::build(
			Config::builder()
				.add_source(File::with_name(config_path))
				.add_source(Environment::with_prefix(ENV_PREFIX).separator("__")),
		)
		.context("can't load config")?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// loads settings from yaml text
	pub fn from_yaml(yaml: &str) -> Result<Self> {
		Self::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
	}

	fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
		builder.build()?.try_deserialize().context("invalid config")
	}
}
