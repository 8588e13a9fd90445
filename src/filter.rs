//! Searching the resolved policy tree.
//!
//! [find_routes_matching_predicate] is the generic pre-order walk. The
//! search form of the policy page builds a [FilterCriteria] (label matchers,
//! contact point, free text) and runs [find_routes_matching_filters], which
//! also records the path to every match so the tree can be expanded and
//! highlighted around it.

use url::Url;

use crate::{
	inheritance::ResolvedRoute,
	matcher::{self, Matcher},
};

/// A policy found by a search, with the ids of its ancestors from the root
/// down to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute<'a> {
	pub route: &'a ResolvedRoute,
	pub path: Vec<&'a str>,
}

/// Collects every policy `predicate` holds for, in pre-order.
///
/// The whole tree is walked: a policy that doesn't match never hides
/// matching descendants.
pub fn find_routes_matching_predicate<'a, P>(root: &'a ResolvedRoute, mut predicate: P) -> Vec<&'a ResolvedRoute>
where
	P: FnMut(&ResolvedRoute) -> bool,
{
	let mut found = Vec::new();
	walk_with_path(root, &mut Vec::new(), &mut |route, _| {
		if predicate(route) {
			found.push(route);
		}
	});
	found
}

/// pre-order walk passing the ancestor ids of every visited policy
pub(crate) fn walk_with_path<'a>(
	route: &'a ResolvedRoute,
	path: &mut Vec<&'a str>,
	f: &mut impl FnMut(&'a ResolvedRoute, &[&'a str]),
) {
	f(route, path);

	path.push(route.id.as_str());
	for child in &route.routes {
		walk_with_path(child, path, f);
	}
	path.pop();
}

/// Search criteria of the notification policy view. All present criteria
/// have to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
	/// every one of these has to be among the policy's own matchers
	pub label_matchers: Vec<Matcher>,
	/// the policy's effective receiver
	pub contact_point: Option<String>,
	/// case insensitive substring of the policy's receiver or matchers
	pub text: Option<String>,
}

impl FilterCriteria {
	pub const QUERY_STRING_PARAM: &'static str = "queryString";
	pub const CONTACT_POINT_PARAM: &'static str = "contactPoint";
	pub const SEARCH_PARAM: &'static str = "search";

	/// builds criteria from the raw contents of the search inputs
	pub fn from_input(query: &str, contact_point: Option<&str>, text: Option<&str>) -> Self {
		let non_empty = |value: Option<&str>| {
			value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
		};

		Self {
			label_matchers: matcher::parse_matchers(query),
			contact_point: non_empty(contact_point),
			text: non_empty(text),
		}
	}

	/// reads the criteria from the query parameters of a page URL
	pub fn from_url(url: &Url) -> Self {
		let mut query = String::new();
		let mut contact_point = None;
		let mut text = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				Self::QUERY_STRING_PARAM => query = value.into_owned(),
				Self::CONTACT_POINT_PARAM => contact_point = Some(value.into_owned()),
				Self::SEARCH_PARAM => text = Some(value.into_owned()),
				_ => {}
			}
		}

		Self::from_input(&query, contact_point.as_deref(), text.as_deref())
	}

	/// the query parameters representing these criteria
	pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = Vec::new();

		if !self.label_matchers.is_empty() {
			pairs.push((Self::QUERY_STRING_PARAM, matcher::format_matchers(&self.label_matchers)));
		}
		if let Some(contact_point) = &self.contact_point {
			pairs.push((Self::CONTACT_POINT_PARAM, contact_point.clone()));
		}
		if let Some(text) = &self.text {
			pairs.push((Self::SEARCH_PARAM, text.clone()));
		}

		pairs
	}

	/// replaces the criteria's query parameters of `url`, keeping unrelated ones
	pub fn apply_to_url(&self, url: &mut Url) {
		let kept: Vec<(String, String)> = url
			.query_pairs()
			.filter(|(key, _)| {
				![Self::QUERY_STRING_PARAM, Self::CONTACT_POINT_PARAM, Self::SEARCH_PARAM]
					.contains(&key.as_ref())
			})
			.map(|(key, value)| (key.into_owned(), value.into_owned()))
			.collect();

		let pairs = self.to_query_pairs();
		if kept.is_empty() && pairs.is_empty() {
			url.set_query(None);
			return;
		}

		let mut serializer = url.query_pairs_mut();
		serializer.clear();
		for (key, value) in &kept {
			serializer.append_pair(key, value);
		}
		for (key, value) in &pairs {
			serializer.append_pair(key, value);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.label_matchers.is_empty() && self.contact_point.is_none() && self.text.is_none()
	}

	pub fn matches(&self, route: &ResolvedRoute) -> bool {
		let matches_labels = self.label_matchers.iter().all(|filter| route.matchers.contains(filter));

		let matches_contact_point = self
			.contact_point
			.as_ref()
			.map_or(true, |contact_point| route.inherited.receiver == *contact_point);

		let matches_text = self.text.as_ref().map_or(true, |text| {
			let needle = text.to_lowercase();
			route.inherited.receiver.to_lowercase().contains(&needle)
				|| route.matchers.iter().any(|m| m.to_string().to_lowercase().contains(&needle))
		});

		matches_labels && matches_contact_point && matches_text
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult<'a> {
	/// false if the criteria were empty, in which case nothing is highlighted
	pub filters_applied: bool,
	pub matches: Vec<MatchedRoute<'a>>,
}

/// Finds the policies matching `criteria`, in pre-order.
pub fn find_routes_matching_filters<'a>(root: &'a ResolvedRoute, criteria: &FilterCriteria) -> FilterResult<'a> {
	if criteria.is_empty() {
		return FilterResult { filters_applied: false, matches: Vec::new() };
	}

	let mut matches = Vec::new();
	walk_with_path(root, &mut Vec::new(), &mut |route, path| {
		if criteria.matches(route) {
			matches.push(MatchedRoute { route, path: path.to_vec() });
		}
	});

	tracing::debug!(matches = matches.len(), "filtered notification policies");

	FilterResult { filters_applied: true, matches }
}
