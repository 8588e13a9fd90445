//! Subcommand handlers. Results are printed to stdout.
use std::fs;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::ArgMatches;
use policytree::{
	alert, compute_inherited_tree, find_routes_matching_filters, format_matchers, matcher, preview_routing,
	render_time_intervals, FilterCriteria, InheritableField, LabelSet, MatchedRoute, PolicyConfig, ResolvedRoute,
};
use url::Url;

use crate::settings::Settings;

pub fn run(matches: &ArgMatches) -> Result<()> {
	let settings = Settings::global();

	let config = PolicyConfig::load(&settings.policies_path).context("failed to load notification policies")?;

	let resolve = || {
		compute_inherited_tree(&config.route, &settings.defaults)
			.context("failed to resolve inherited notification policy settings")
	};

	match matches.subcommand() {
		Some(("tree", _)) => print_tree(&resolve()?, 0),
		Some(("filter", opts)) => filter(&resolve()?, opts)?,
		Some(("route", opts)) => route(&resolve()?, opts)?,
		Some(("mute-timings", _)) => mute_timings(&config),
		Some((name, _)) => bail!("unknown subcommand {name}"),
		None => bail!("no subcommand given"),
	}

	Ok(())
}

fn print_tree(route: &ResolvedRoute, depth: usize) {
	println!("{}{}", "  ".repeat(depth), describe(route));

	for child in &route.routes {
		print_tree(child, depth + 1);
	}
}

fn filter(tree: &ResolvedRoute, opts: &ArgMatches) -> Result<()> {
	let criteria = match opts.value_of("url") {
		Some(url) => FilterCriteria::from_url(&Url::parse(url).with_context(|| format!("invalid url {url:?}"))?),
		None => {
			let query = opts.value_of("query").unwrap_or_default();
			if matcher::is_lossy_parse(query) {
				tracing::warn!("no valid label matcher in {query:?}");
			}

			FilterCriteria::from_input(query, opts.value_of("contact-point"), opts.value_of("text"))
		}
	};

	let result = find_routes_matching_filters(tree, &criteria);
	if !result.filters_applied {
		tracing::info!("no filter given, printing the whole tree");
		print_tree(tree, 0);
		return Ok(());
	}

	for matched in &result.matches {
		println!("{}", describe_match(matched));
	}
	println!("{} of {} policies match", result.matches.len(), tree.count());

	Ok(())
}

fn route(tree: &ResolvedRoute, opts: &ArgMatches) -> Result<()> {
	let instances: Vec<LabelSet> = match opts.value_of("alerts") {
		Some(path) => {
			let content = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
			alert::parse_alert_instances(&content)
				.with_context(|| format!("failed to parse alert instances from {path}"))?
				.into_iter()
				.map(|instance| instance.labels)
				.collect()
		}
		None => {
			let labels = opts
				.values_of("labels")
				.into_iter()
				.flatten()
				.map(|pair| {
					pair.split_once('=')
						.map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
						.with_context(|| format!("invalid label {pair:?}, expected name=value"))
				})
				.collect::<Result<LabelSet>>()?;

			vec![labels]
		}
	};

	for preview in preview_routing(tree, &instances).values() {
		println!("{}", describe_match(&preview.route));
		for labels in &preview.instances {
			println!("    {}", format_labels(labels));
		}
	}

	Ok(())
}

fn mute_timings(config: &PolicyConfig) {
	let now = Utc::now();

	for timing in &config.mute_time_intervals {
		let state = if timing.is_active_at(&now) { "active" } else { "inactive" };
		println!("{}: {} [{state}]", timing.name, render_time_intervals(timing));
	}
}

/// a policy with its matchers and effective settings, settings it doesn't
/// set itself are marked as inherited
fn describe(route: &ResolvedRoute) -> String {
	let matchers = if route.matchers.is_empty() {
		String::from("(all alerts)")
	} else {
		format_matchers(&route.matchers)
	};

	let mut parts = vec![format!("[{}] {matchers}", route.id)];

	for field in InheritableField::ALL {
		let value = match field {
			InheritableField::Receiver => route.inherited.receiver.clone(),
			InheritableField::GroupBy => route.inherited.group_by.join(","),
			InheritableField::GroupWait => route.inherited.group_wait.clone(),
			InheritableField::GroupInterval => route.inherited.group_interval.clone(),
			InheritableField::RepeatInterval => route.inherited.repeat_interval.clone(),
		};
		let marker = if route.is_overridden(field) { "" } else { "*" };

		parts.push(format!("{}={value}{marker}", field.as_str()));
	}

	if route.continue_matching {
		parts.push(String::from("continue"));
	}
	if !route.mute_time_intervals.is_empty() {
		parts.push(format!("muted during {}", route.mute_time_intervals.join(", ")));
	}

	parts.join(" ")
}

fn describe_match(matched: &MatchedRoute<'_>) -> String {
	if matched.path.is_empty() {
		return describe(matched.route);
	}
	format!("{} > {}", matched.path.join(" > "), describe(matched.route))
}

fn format_labels(labels: &LabelSet) -> String {
	let labels: Vec<_> = labels.iter().map(|(name, value)| format!("{name}={value:?}")).collect();
	format!("{{{}}}", labels.join(", "))
}
