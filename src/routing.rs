//! Routing preview: which notification policies would handle an alert
//! instance with a given label set.

use indexmap::IndexMap;

use crate::{
	filter::MatchedRoute,
	inheritance::ResolvedRoute,
	matcher::LabelSet,
};

/// Evaluates the tree the way Alertmanager does.
///
/// A matching policy descends into its children in order. Evaluation of the
/// remaining siblings stops at the first matching child unless that child
/// has `continue` set. A policy none of whose children match handles the
/// alert itself. If the root doesn't match there are no matches at all.
pub fn find_matching_routes<'a>(root: &'a ResolvedRoute, labels: &LabelSet) -> Vec<MatchedRoute<'a>> {
	let mut matches = Vec::new();
	if root.matches(labels) {
		collect(root, labels, &mut Vec::new(), &mut matches);
	}
	matches
}

/// `route` is known to match. collects its deepest matching descendants, or
/// `route` itself if no child matches
fn collect<'a>(
	route: &'a ResolvedRoute,
	labels: &LabelSet,
	path: &mut Vec<&'a str>,
	matches: &mut Vec<MatchedRoute<'a>>,
) {
	let before = matches.len();

	path.push(route.id.as_str());
	for child in route.routes.iter().filter(|child| child.matches(labels)) {
		collect(child, labels, path, matches);

		if !child.continue_matching {
			break;
		}
	}
	path.pop();

	if matches.len() == before {
		matches.push(MatchedRoute { route, path: path.clone() });
	}
}

/// The alert instances handled by one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPreview<'a, 'l> {
	pub route: MatchedRoute<'a>,
	pub instances: Vec<&'l LabelSet>,
}

/// Routes every instance and groups them by the policy handling them, in
/// the order the policies were first matched. An instance matched by
/// several policies (through `continue`) appears under each of them.
pub fn preview_routing<'a, 'l>(
	root: &'a ResolvedRoute,
	instances: &'l [LabelSet],
) -> IndexMap<&'a str, RoutingPreview<'a, 'l>> {
	let mut previews: IndexMap<&'a str, RoutingPreview<'a, 'l>> = IndexMap::new();

	for labels in instances {
		for matched in find_matching_routes(root, labels) {
			let route = matched.route;
			previews
				.entry(route.id.as_str())
				.or_insert_with(|| RoutingPreview { route: matched, instances: Vec::new() })
				.instances
				.push(labels);
		}
	}

	tracing::debug!(
		instances = instances.len(),
		policies = previews.len(),
		"previewed routing of alert instances"
	);

	previews
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::{
		inheritance::{compute_inherited_tree, InheritanceDefaults},
		matcher::{Matcher, MatcherOperator},
		route::RouteNode,
	};

	fn resolved_tree() -> ResolvedRoute {
		let root: RouteNode = serde_json::from_value(json!({
			"id": "root",
			"receiver": "default",
			"routes": [
				{
					"id": "audit",
					"object_matchers": [["severity", "=~", "critical|warning"]],
					"receiver": "audit-log",
					"continue": true,
				},
				{
					"id": "ops",
					"object_matchers": [["team", "=", "ops"]],
					"receiver": "ops-pager",
					"routes": [
						{ "id": "ops-db", "object_matchers": [["service", "=", "db"]] },
						{ "id": "ops-any", "object_matchers": [["service", "!=", "db"]] },
					],
				},
				{ "id": "ops-fallback", "object_matchers": [["team", "=", "ops"]] },
			],
		}))
		.unwrap();

		compute_inherited_tree(&root, &InheritanceDefaults::default()).unwrap()
	}

	fn labels(pairs: &[(&str, &str)]) -> LabelSet {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	fn ids<'a>(matches: &[MatchedRoute<'a>]) -> Vec<&'a str> {
		matches.iter().map(|m| m.route.id.as_str()).collect()
	}

	#[test]
	fn unmatched_alerts_go_to_the_root() {
		let tree = resolved_tree();

		let matches = find_matching_routes(&tree, &labels(&[("team", "dev")]));

		assert_eq!(ids(&matches), vec!["root"]);
		assert!(matches[0].path.is_empty());
		assert_eq!(matches[0].route.inherited.receiver, "default");
	}

	#[test]
	fn first_match_wins_and_deepest_policy_handles() {
		let tree = resolved_tree();

		let matches = find_matching_routes(&tree, &labels(&[("team", "ops"), ("service", "db")]));

		assert_eq!(ids(&matches), vec!["ops-db"]);
		assert_eq!(matches[0].path, vec!["root", "ops"]);
		assert_eq!(matches[0].route.inherited.receiver, "ops-pager");
	}

	#[test]
	fn continue_keeps_evaluating_siblings() {
		let tree = resolved_tree();

		let matches = find_matching_routes(&tree, &labels(&[("team", "ops"), ("severity", "critical")]));

		assert_eq!(ids(&matches), vec!["audit", "ops-any"]);
	}

	#[test]
	fn root_matchers_are_respected() {
		let mut tree = resolved_tree();
		tree.matchers = vec!["env=prod".parse().unwrap()];

		assert!(find_matching_routes(&tree, &labels(&[("team", "ops")])).is_empty());
	}

	#[test]
	fn invalid_regexes_only_fail_their_own_policy() {
		let mut tree = resolved_tree();
		tree.routes[0].matchers = vec![Matcher::new("severity", MatcherOperator::Regex, "(critical")];

		let matches = find_matching_routes(&tree, &labels(&[("team", "ops"), ("severity", "critical")]));
		assert_eq!(ids(&matches), vec!["ops-any"]);

		let matches = find_matching_routes(&tree, &labels(&[("team", "dev"), ("severity", "critical")]));
		assert_eq!(ids(&matches), vec!["root"]);
	}

	#[test]
	fn groups_instances_by_policy() {
		let tree = resolved_tree();
		let instances = vec![
			labels(&[("team", "ops"), ("service", "db")]),
			labels(&[("team", "dev"), ("severity", "warning")]),
			labels(&[("team", "ops"), ("service", "db"), ("severity", "critical")]),
			labels(&[("team", "dev")]),
		];

		let previews = preview_routing(&tree, &instances);

		assert_eq!(previews.keys().copied().collect::<Vec<_>>(), vec!["ops-db", "audit", "root"]);
		assert_eq!(previews["ops-db"].instances, vec![&instances[0], &instances[2]]);
		assert_eq!(previews["audit"].instances, vec![&instances[1], &instances[2]]);
		assert_eq!(previews["root"].instances, vec![&instances[3]]);
	}
}
