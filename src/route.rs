//! The notification policy tree and the Alertmanager-shaped wire format it
//! is read from.
//!
//! Policies come from the backend in several historical encodings of their
//! matchers (`object_matchers`, `matchers`, `match` and `match_re`). They are
//! normalized into a single list of [Matcher]s here, so nothing past the
//! deserialization boundary has to care about the encoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
	duration::parse_duration,
	error::Error,
	matcher::{self, LabelSet, Matcher, MatcherOperator},
};

/// placeholder id of a root policy the backend didn't assign an id to
pub const ROOT_ROUTE_ID: &str = "root";

/// The options a policy may set explicitly. Every `None` is inherited from
/// the parent policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSettings {
	pub receiver: Option<String>,
	pub group_by: Option<Vec<String>>,
	pub group_wait: Option<String>,
	pub group_interval: Option<String>,
	pub repeat_interval: Option<String>,
}

/// A notification policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoute", into = "RawRoute")]
pub struct RouteNode {
	/// backend id, or a placeholder derived from the position in the tree
	pub id: String,
	/// whether `id` is a placeholder. placeholders are never serialized
	pub synthetic_id: bool,
	pub matchers: Vec<Matcher>,
	pub settings: RouteSettings,
	/// keep evaluating sibling policies after this one matched
	pub continue_matching: bool,
	/// names of the mute timings applied to this policy. not inherited
	pub mute_time_intervals: Vec<String>,
	pub routes: Vec<RouteNode>,
}

impl RouteNode {
	/// A policy without matchers or settings.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			synthetic_id: false,
			matchers: Vec::new(),
			settings: RouteSettings::default(),
			continue_matching: false,
			mute_time_intervals: Vec::new(),
			routes: Vec::new(),
		}
	}

	/// true if all of the policy's own matchers match `labels`
	pub fn matches(&self, labels: &LabelSet) -> bool {
		matcher::matches_all(&self.matchers, labels)
	}

	/// number of policies in this subtree, including `self`
	pub fn count(&self) -> usize {
		1 + self.routes.iter().map(RouteNode::count).sum::<usize>()
	}

	/// visits every policy of the subtree, parents before their children
	pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a RouteNode)) {
		f(self);
		for child in &self.routes {
			child.walk(f);
		}
	}

	/// Converts a policy from the wire format. `position` is the
	/// placeholder id used if the policy carries none; children get
	/// `{position}.{index}`.
	fn from_raw(raw: RawRoute, position: String) -> Result<Self, Error> {
		let (id, synthetic_id) = match raw.id {
			Some(id) if !id.is_empty() => (id, false),
			_ => (position, true),
		};

		let matchers = normalize_matchers(&raw.object_matchers, &raw.matchers, &raw.match_equal, &raw.match_re)
			.map_err(|err| Error::invalid_route(&id, err))?;

		for value in [&raw.group_wait, &raw.group_interval, &raw.repeat_interval].into_iter().flatten() {
			parse_duration(value).map_err(|err| Error::invalid_route(&id, err))?;
		}

		let routes = raw
			.routes
			.unwrap_or_default()
			.into_iter()
			.enumerate()
			.map(|(index, child)| Self::from_raw(child, format!("{id}.{index}")))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self {
			matchers,
			settings: RouteSettings {
				receiver: raw.receiver.filter(|receiver| !receiver.is_empty()),
				group_by: raw.group_by,
				group_wait: raw.group_wait,
				group_interval: raw.group_interval,
				repeat_interval: raw.repeat_interval,
			},
			continue_matching: raw.continue_matching,
			mute_time_intervals: raw.mute_time_intervals.unwrap_or_default(),
			routes,
			id,
			synthetic_id,
		})
	}
}

impl TryFrom<RawRoute> for RouteNode {
	type Error = Error;

	fn try_from(raw: RawRoute) -> Result<Self, Self::Error> {
		Self::from_raw(raw, ROOT_ROUTE_ID.to_owned())
	}
}

impl From<RouteNode> for RawRoute {
	fn from(route: RouteNode) -> Self {
		let RouteNode { id, synthetic_id, matchers, settings, continue_matching, mute_time_intervals, routes } =
			route;

		Self {
			id: (!synthetic_id).then(|| id),
			receiver: settings.receiver,
			group_by: settings.group_by,
			group_wait: settings.group_wait,
			group_interval: settings.group_interval,
			repeat_interval: settings.repeat_interval,
			continue_matching,
			object_matchers: (!matchers.is_empty()).then(|| matchers),
			matchers: None,
			match_equal: None,
			match_re: None,
			mute_time_intervals: (!mute_time_intervals.is_empty()).then(|| mute_time_intervals),
			routes: (!routes.is_empty()).then(|| routes.into_iter().map(RawRoute::from).collect()),
		}
	}
}

/// A policy as the Alertmanager configuration API transmits it.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRoute {
	pub id: Option<String>,
	pub receiver: Option<String>,
	pub group_by: Option<Vec<String>>,
	pub group_wait: Option<String>,
	pub group_interval: Option<String>,
	pub repeat_interval: Option<String>,
	#[serde(default, rename = "continue", skip_serializing_if = "std::ops::Not::not")]
	pub continue_matching: bool,
	pub object_matchers: Option<Vec<Matcher>>,
	/// matchers in their textual form, e.g. `team=~"ops|dev"`
	pub matchers: Option<Vec<String>>,
	/// deprecated equality matchers
	#[serde(rename = "match")]
	pub match_equal: Option<IndexMap<String, String>>,
	/// deprecated regex matchers
	pub match_re: Option<IndexMap<String, String>>,
	pub mute_time_intervals: Option<Vec<String>>,
	pub routes: Option<Vec<RawRoute>>,
}

/// merges the matcher encodings in the order Alertmanager evaluates them
fn normalize_matchers(
	object_matchers: &Option<Vec<Matcher>>,
	matchers: &Option<Vec<String>>,
	match_equal: &Option<IndexMap<String, String>>,
	match_re: &Option<IndexMap<String, String>>,
) -> Result<Vec<Matcher>, Error> {
	let mut normalized: Vec<Matcher> = object_matchers.iter().flatten().cloned().collect();

	for expression in matchers.iter().flatten() {
		normalized.push(matcher::parse_matcher(expression)?);
	}

	normalized.extend(
		match_equal
			.iter()
			.flatten()
			.map(|(name, value)| Matcher::new(name.as_str(), MatcherOperator::Equal, value.as_str())),
	);
	normalized.extend(
		match_re
			.iter()
			.flatten()
			.map(|(name, value)| Matcher::new(name.as_str(), MatcherOperator::Regex, value.as_str())),
	);

	Ok(normalized)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn route(value: serde_json::Value) -> Result<RouteNode, String> {
		serde_json::from_value(value).map_err(|err| err.to_string())
	}

	#[test]
	fn normalizes_every_matcher_encoding() {
		let root = route(json!({
			"receiver": "default",
			"routes": [{
				"object_matchers": [["team", "=", "ops"]],
				"matchers": ["env!=\"dev\"", "job=~api-.*"],
				"match": { "severity": "critical" },
				"match_re": { "cluster": "us-.+" },
			}],
		}))
		.unwrap();

		assert_eq!(
			root.routes[0].matchers,
			vec![
				Matcher::new("team", MatcherOperator::Equal, "ops"),
				Matcher::new("env", MatcherOperator::NotEqual, "dev"),
				Matcher::new("job", MatcherOperator::Regex, "api-.*"),
				Matcher::new("severity", MatcherOperator::Equal, "critical"),
				Matcher::new("cluster", MatcherOperator::Regex, "us-.+"),
			]
		);
	}

	#[test]
	fn assigns_placeholder_ids_by_position() {
		let root = route(json!({
			"receiver": "default",
			"routes": [
				{ "routes": [{}, { "id": "backend-id", "routes": [{}] }] },
				{},
			],
		}))
		.unwrap();

		let mut ids = Vec::new();
		root.walk(&mut |node| ids.push((node.id.as_str(), node.synthetic_id)));

		assert_eq!(
			ids,
			vec![
				("root", true),
				("root.0", true),
				("root.0.0", true),
				("backend-id", false),
				("backend-id.0", true),
				("root.1", true),
			]
		);
		assert_eq!(root.count(), 6);
	}

	#[test]
	fn keeps_explicit_settings_only() {
		let root = route(json!({
			"receiver": "default",
			"group_by": ["alertname"],
			"group_wait": "45s",
			"continue": true,
			"mute_time_intervals": ["weekends"],
			"routes": [{ "receiver": "" }],
		}))
		.unwrap();

		assert_eq!(
			root.settings,
			RouteSettings {
				receiver: Some("default".to_owned()),
				group_by: Some(vec!["alertname".to_owned()]),
				group_wait: Some("45s".to_owned()),
				group_interval: None,
				repeat_interval: None,
			}
		);
		assert!(root.continue_matching);
		assert_eq!(root.mute_time_intervals, vec!["weekends".to_owned()]);
		assert_eq!(root.routes[0].settings, RouteSettings::default());
	}

	#[test]
	fn rejects_malformed_policies() {
		let err = route(json!({ "routes": [{ "matchers": ["severity"] }] })).unwrap_err();
		assert!(err.contains("root.0"), "{err}");
		assert!(err.contains("severity"), "{err}");

		let err = route(json!({ "id": "r", "repeat_interval": "forever" })).unwrap_err();
		assert!(err.contains("\"r\""), "{err}");
		assert!(err.contains("forever"), "{err}");

		assert!(route(json!({ "object_matchers": [["team", "~=", "ops"]] })).is_err());
	}

	#[test]
	fn serializes_normalized_matchers_without_placeholder_ids() {
		let root = route(json!({
			"receiver": "default",
			"routes": [{ "id": "ops", "match": { "team": "ops" }, "continue": true }],
		}))
		.unwrap();

		assert_eq!(
			serde_json::to_value(&root).unwrap(),
			json!({
				"receiver": "default",
				"routes": [{ "id": "ops", "object_matchers": [["team", "=", "ops"]], "continue": true }],
			})
		);
	}
}
