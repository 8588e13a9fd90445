//! Computes the effective settings of every notification policy.
//!
//! A policy that doesn't set an option inherits it from its parent. The root
//! falls back to [InheritanceDefaults]. Resolving produces a new tree of
//! [ResolvedRoute]s that keeps each policy's own settings next to the
//! inherited ones, so overrides can be told apart from inherited values.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::{
	error::Error,
	matcher::{self, LabelSet, Matcher},
	route::{RouteNode, RouteSettings},
};

pub const DEFAULT_GROUP_WAIT: &str = "30s";
pub const DEFAULT_GROUP_INTERVAL: &str = "5m";
pub const DEFAULT_REPEAT_INTERVAL: &str = "4h";

/// values used when not even the root policy sets an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritanceDefaults {
	pub receiver: Option<String>,
	pub group_by: Vec<String>,
	pub group_wait: String,
	pub group_interval: String,
	pub repeat_interval: String,
}

impl Default for InheritanceDefaults {
	fn default() -> Self {
		Self {
			receiver: None,
			group_by: Vec::new(),
			group_wait: DEFAULT_GROUP_WAIT.to_owned(),
			group_interval: DEFAULT_GROUP_INTERVAL.to_owned(),
			repeat_interval: DEFAULT_REPEAT_INTERVAL.to_owned(),
		}
	}
}

/// the effective value of every inheritable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritedProperties {
	pub receiver: String,
	pub group_by: Vec<String>,
	pub group_wait: String,
	pub group_interval: String,
	pub repeat_interval: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InheritableField {
	Receiver,
	GroupBy,
	GroupWait,
	GroupInterval,
	RepeatInterval,
}

impl InheritableField {
	pub const ALL: [Self; 5] =
		[Self::Receiver, Self::GroupBy, Self::GroupWait, Self::GroupInterval, Self::RepeatInterval];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Receiver => "receiver",
			Self::GroupBy => "group_by",
			Self::GroupWait => "group_wait",
			Self::GroupInterval => "group_interval",
			Self::RepeatInterval => "repeat_interval",
		}
	}
}

impl RouteSettings {
	/// the policy's effective settings given its parent's
	fn inherit(&self, parent: &InheritedProperties) -> InheritedProperties {
		InheritedProperties {
			receiver: self.receiver.clone().unwrap_or_else(|| parent.receiver.clone()),
			group_by: self.group_by.clone().unwrap_or_else(|| parent.group_by.clone()),
			group_wait: self.group_wait.clone().unwrap_or_else(|| parent.group_wait.clone()),
			group_interval: self.group_interval.clone().unwrap_or_else(|| parent.group_interval.clone()),
			repeat_interval: self.repeat_interval.clone().unwrap_or_else(|| parent.repeat_interval.clone()),
		}
	}

	fn is_set(&self, field: InheritableField) -> bool {
		match field {
			InheritableField::Receiver => self.receiver.is_some(),
			InheritableField::GroupBy => self.group_by.is_some(),
			InheritableField::GroupWait => self.group_wait.is_some(),
			InheritableField::GroupInterval => self.group_interval.is_some(),
			InheritableField::RepeatInterval => self.repeat_interval.is_some(),
		}
	}
}

/// A notification policy together with its effective settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
	pub id: String,
	/// `id` is a placeholder derived from the policy's position
	pub synthetic_id: bool,
	pub matchers: Vec<Matcher>,
	/// the settings the policy sets explicitly
	pub own: RouteSettings,
	pub inherited: InheritedProperties,
	pub continue_matching: bool,
	pub mute_time_intervals: Vec<String>,
	pub routes: Vec<ResolvedRoute>,
}

impl ResolvedRoute {
	/// true if all of the policy's own matchers match `labels`
	pub fn matches(&self, labels: &LabelSet) -> bool {
		matcher::matches_all(&self.matchers, labels)
	}

	/// true if the policy sets `field` itself instead of inheriting it
	pub fn is_overridden(&self, field: InheritableField) -> bool {
		self.own.is_set(field)
	}

	/// number of policies in this subtree, including `self`
	pub fn count(&self) -> usize {
		1 + self.routes.iter().map(ResolvedRoute::count).sum::<usize>()
	}

	/// looks up a policy of the subtree by id
	pub fn find(&self, id: &str) -> Option<&ResolvedRoute> {
		if self.id == id {
			return Some(self);
		}
		self.routes.iter().find_map(|child| child.find(id))
	}
}

/// Resolves the effective settings of every policy below `root`.
///
/// Fails with [Error::MissingRootReceiver] if neither the root nor
/// `defaults` name a receiver, and with [Error::DuplicateRoute] if a policy
/// id is encountered twice.
pub fn compute_inherited_tree(
	root: &RouteNode,
	defaults: &InheritanceDefaults,
) -> Result<ResolvedRoute, Error> {
	let receiver = root
		.settings
		.receiver
		.clone()
		.or_else(|| defaults.receiver.clone())
		.ok_or(Error::MissingRootReceiver)?;

	let base = InheritedProperties {
		receiver,
		group_by: defaults.group_by.clone(),
		group_wait: defaults.group_wait.clone(),
		group_interval: defaults.group_interval.clone(),
		repeat_interval: defaults.repeat_interval.clone(),
	};

	let mut visited = HashSet::new();
	let resolved = resolve(root, &base, &mut visited)?;

	tracing::debug!(policies = resolved.count(), "resolved inherited notification policy settings");

	Ok(resolved)
}

fn resolve<'a>(
	route: &'a RouteNode,
	parent: &InheritedProperties,
	visited: &mut HashSet<&'a str>,
) -> Result<ResolvedRoute, Error> {
	// placeholder ids live apart from backend ids and are unique by position
	if !route.synthetic_id && !visited.insert(route.id.as_str()) {
		return Err(Error::DuplicateRoute(route.id.clone()));
	}

	let inherited = route.settings.inherit(parent);

	let routes = route
		.routes
		.iter()
		.map(|child| resolve(child, &inherited, visited))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(ResolvedRoute {
		id: route.id.clone(),
		synthetic_id: route.synthetic_id,
		matchers: route.matchers.clone(),
		own: route.settings.clone(),
		inherited,
		continue_matching: route.continue_matching,
		mute_time_intervals: route.mute_time_intervals.clone(),
		routes,
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::matcher::MatcherOperator;

	fn node(id: &str, settings: RouteSettings, routes: Vec<RouteNode>) -> RouteNode {
		RouteNode { settings, routes, ..RouteNode::new(id) }
	}

	fn receiver(name: &str) -> RouteSettings {
		RouteSettings { receiver: Some(name.to_owned()), ..RouteSettings::default() }
	}

	/// the inherited value of every field equals the explicit value if set,
	/// else the parent's inherited value
	fn assert_inheritance(route: &ResolvedRoute, parent: &InheritedProperties) {
		let expected = route.own.inherit(parent);
		assert_eq!(route.inherited, expected, "policy {}", route.id);
		for child in &route.routes {
			assert_inheritance(child, &route.inherited);
		}
	}

	fn sample_tree() -> RouteNode {
		node(
			"root",
			RouteSettings {
				receiver: Some("default".to_owned()),
				group_wait: Some("30s".to_owned()),
				group_by: Some(vec!["alertname".to_owned()]),
				..RouteSettings::default()
			},
			vec![
				RouteNode {
					matchers: vec![Matcher::new("team", MatcherOperator::Equal, "a")],
					..RouteNode::new("team-a")
				},
				node(
					"team-b",
					RouteSettings { group_wait: Some("1m".to_owned()), ..receiver("pager") },
					vec![
						node("team-b-db", RouteSettings::default(), vec![]),
						node(
							"team-b-web",
							RouteSettings { group_by: Some(vec![]), ..receiver("web") },
							vec![],
						),
					],
				),
			],
		)
	}

	#[test]
	fn children_inherit_from_the_root() {
		let resolved = compute_inherited_tree(&sample_tree(), &InheritanceDefaults::default()).unwrap();

		let team_a = &resolved.routes[0];
		assert_eq!(team_a.inherited.receiver, "default");
		assert_eq!(team_a.inherited.group_wait, "30s");
		assert_eq!(team_a.inherited.group_by, vec!["alertname".to_owned()]);
		assert!(!team_a.is_overridden(InheritableField::Receiver));
	}

	#[test]
	fn overrides_propagate_to_descendants() {
		let resolved = compute_inherited_tree(&sample_tree(), &InheritanceDefaults::default()).unwrap();

		let db = resolved.find("team-b-db").unwrap();
		assert_eq!(db.inherited.receiver, "pager");
		assert_eq!(db.inherited.group_wait, "1m");
		assert_eq!(db.own, RouteSettings::default());

		let web = resolved.find("team-b-web").unwrap();
		assert_eq!(web.inherited.receiver, "web");
		assert!(web.inherited.group_by.is_empty());
		assert!(web.is_overridden(InheritableField::GroupBy));
		assert!(!web.is_overridden(InheritableField::GroupWait));
	}

	#[test]
	fn inheritance_holds_for_every_policy() {
		let defaults = InheritanceDefaults::default();
		let resolved = compute_inherited_tree(&sample_tree(), &defaults).unwrap();

		let base = InheritedProperties {
			receiver: "default".to_owned(),
			group_by: defaults.group_by.clone(),
			group_wait: defaults.group_wait.clone(),
			group_interval: defaults.group_interval.clone(),
			repeat_interval: defaults.repeat_interval.clone(),
		};
		assert_inheritance(&resolved, &base);
	}

	#[test]
	fn root_falls_back_to_defaults() {
		let resolved = compute_inherited_tree(&sample_tree(), &InheritanceDefaults::default()).unwrap();

		assert_eq!(resolved.inherited.group_interval, DEFAULT_GROUP_INTERVAL);
		assert_eq!(resolved.inherited.repeat_interval, DEFAULT_REPEAT_INTERVAL);

		let defaults = InheritanceDefaults {
			receiver: Some("fallback".to_owned()),
			repeat_interval: "12h".to_owned(),
			..InheritanceDefaults::default()
		};
		let resolved = compute_inherited_tree(&RouteNode::new("root"), &defaults).unwrap();
		assert_eq!(resolved.inherited.receiver, "fallback");
		assert_eq!(resolved.inherited.repeat_interval, "12h");
	}

	#[test]
	fn preserves_shape_and_input() {
		let tree = sample_tree();
		let before = tree.clone();

		let first = compute_inherited_tree(&tree, &InheritanceDefaults::default()).unwrap();
		let second = compute_inherited_tree(&tree, &InheritanceDefaults::default()).unwrap();

		assert_eq!(tree, before);
		assert_eq!(first, second);
		assert_eq!(first.count(), tree.count());

		let ids: Vec<_> = first.routes[1].routes.iter().map(|route| route.id.as_str()).collect();
		assert_eq!(ids, vec!["team-b-db", "team-b-web"]);
		assert_eq!(first.routes[0].matchers, tree.routes[0].matchers);
	}

	#[test]
	fn root_without_receiver_is_rejected() {
		let result = compute_inherited_tree(&RouteNode::new("root"), &InheritanceDefaults::default());

		assert_eq!(result, Err(Error::MissingRootReceiver));
	}

	#[test]
	fn repeated_policies_are_rejected() {
		let tree = node(
			"root",
			receiver("default"),
			vec![node("a", RouteSettings::default(), vec![node("root", RouteSettings::default(), vec![])])],
		);

		let result = compute_inherited_tree(&tree, &InheritanceDefaults::default());

		assert_eq!(result, Err(Error::DuplicateRoute("root".to_owned())));
	}

	#[test]
	fn placeholder_ids_do_not_collide_with_backend_ids() {
		let tree: RouteNode = serde_json::from_value(serde_json::json!({
			"receiver": "default",
			"routes": [{}, { "id": "root.0" }],
		}))
		.unwrap();

		let resolved = compute_inherited_tree(&tree, &InheritanceDefaults::default()).unwrap();

		assert_eq!(resolved.count(), 3);
		assert!(resolved.routes[0].synthetic_id);
		assert!(!resolved.routes[1].synthetic_id);
		assert_eq!(resolved.routes[1].id, "root.0");
	}
}
