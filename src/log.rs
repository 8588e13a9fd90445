use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

/// logs go to stderr, stdout is reserved for command output
pub fn setup_logging() -> Result<()> {
	let level = tracing::Level::from_str(LogSettings::global().level.as_str())
		.with_context(|| format!("invalid log level {:?}", LogSettings::global().level))?;

	let fmt_layer = fmt::layer().with_writer(std::io::stderr);

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("regex=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

	Ok(())
}
