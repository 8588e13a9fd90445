use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::Config;
use once_cell::sync::OnceCell;
use policytree::InheritanceDefaults;
use serde::Deserialize;

use crate::log::LogSettings;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	/// the notification policy document to inspect
	pub policies_path: PathBuf,
	/// fallbacks for options not even the root policy sets
	#[serde(default)]
	pub defaults: InheritanceDefaults,
	pub log: LogSettings,
}

impl Settings {
	#[allow(clippy::expect_used)]
	pub fn global() -> &'static Self {
		SETTINGS.get().expect("settings are loaded before use")
	}

	/// loads the settings and makes them available through [Settings::global]
	pub fn init(opts: &ArgMatches) -> Result<&'static Self> {
		let settings = Self::load(opts)?;
		Ok(SETTINGS.get_or_init(|| settings))
	}

	fn load(opts: &ArgMatches) -> Result<Self> {
		#[allow(clippy::unwrap_used)]
		let config_path = opts.value_of("config").unwrap();

		let conf = Config::builder()
			.set_default("policies_path", "./policies.yaml")?
			.set_default("log.level", "info")?
			.add_source(config::File::with_name(config_path).required(false))
			.build()
			.context("can't load config")?;

		let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}
		if let Some(path) = opts.value_of("policies") {
			settings.policies_path = PathBuf::from(path);
		}
		if let Some(receiver) = opts.value_of("default-receiver") {
			settings.defaults.receiver = Some(receiver.to_string());
		}

		Ok(settings)
	}
}

/// the command line interface
pub fn cli() -> Command<'static> {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about("inspect notification policy trees")
		.subcommand_required(true)
		.args(&[
			Arg::new("config")
				.help("path of config file")
				.takes_value(true)
				.short('c')
				.long("config")
				.default_value("./config.yaml"),
			Arg::new("level")
				.help("log level")
				.possible_values(["error", "warn", "info", "debug", "trace"])
				.ignore_case(true)
				.takes_value(true)
				.long("log"),
			Arg::new("policies")
				.help("path of the notification policy document, overrides the config file")
				.takes_value(true)
				.short('p')
				.long("policies"),
			Arg::new("default-receiver")
				.help("receiver used if the root policy has none")
				.takes_value(true)
				.long("default-receiver"),
		])
		.subcommand(Command::new("tree").about("print the policy tree with inherited settings"))
		.subcommand(
			Command::new("filter")
				.about("search policies by matchers, contact point or free text")
				.args(&[
					Arg::new("query")
						.help("label matchers, e.g. 'team=ops, severity=~critical|warning'")
						.takes_value(true)
						.short('q')
						.long("query"),
					Arg::new("contact-point")
						.help("effective receiver of the policy")
						.takes_value(true)
						.long("contact-point"),
					Arg::new("text")
						.help("case insensitive text searched in receivers and matchers")
						.takes_value(true)
						.long("text"),
					Arg::new("url")
						.help("read the criteria from the query parameters of a policy page url")
						.takes_value(true)
						.long("url")
						.conflicts_with_all(&["query", "contact-point", "text"]),
				]),
		)
		.subcommand(
			Command::new("route")
				.about("preview which policies handle alert instances")
				.args(&[
					Arg::new("labels")
						.help("labels of a single alert instance as name=value")
						.takes_value(true)
						.multiple_values(true),
					Arg::new("alerts")
						.help("JSON file with alert instances or an Alertmanager webhook payload")
						.takes_value(true)
						.long("alerts")
						.conflicts_with("labels"),
				]),
		)
		.subcommand(Command::new("mute-timings").about("render the mute timings and whether they're active"))
}
