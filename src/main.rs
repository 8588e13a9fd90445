//! command line front end of the notification policy engine
//!
//! Loads a notification policy document and
//! - prints the policy tree with the settings every policy inherits
//! - searches policies by label matchers, contact point or free text
//! - previews which policies handle given alert instances
//! - renders mute timings

use anyhow::{Context, Result};
use settings::Settings;

mod commands;
mod log;
mod settings;

/// the entry point of the program
pub fn main() -> Result<()> {
	let matches = settings::cli().get_matches();

	Settings::init(&matches).context("failed to load config and command line arguments")?;

	log::setup_logging().context("could not setup logging")?;

	commands::run(&matches)
}
