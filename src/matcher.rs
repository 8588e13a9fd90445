//! Label matchers.
//!
//! Matchers are parsed from free-form search input and evaluated against the
//! label sets of alert instances. Parsing is best effort: fragments that
//! don't form a valid matcher are dropped, so a half-typed query never fails.
//! [parse_matcher] is the strict variant used when reading stored policies.

use std::{
	collections::BTreeMap,
	fmt,
	hash::{Hash, Hasher},
	str::FromStr,
};

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// labels of an alert instance, ordered by name so they display
/// deterministically
pub type LabelSet = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatcherOperator {
	#[serde(rename = "=")]
	Equal,
	#[serde(rename = "!=")]
	NotEqual,
	#[serde(rename = "=~")]
	Regex,
	#[serde(rename = "!~")]
	NotRegex,
}

impl MatcherOperator {
	/// the order operators are tried in while scanning an expression. the two
	/// character operators go first so `=` never shadows `=~`
	const SCAN_ORDER: [Self; 4] = [Self::NotEqual, Self::NotRegex, Self::Regex, Self::Equal];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Equal => "=",
			Self::NotEqual => "!=",
			Self::Regex => "=~",
			Self::NotRegex => "!~",
		}
	}
}

impl fmt::Display for MatcherOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MatcherOperator {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::SCAN_ORDER.into_iter().find(|op| op.as_str() == s).ok_or_else(|| {
			Error::InvalidMatcher { expression: s.to_owned(), reason: "unknown operator" }
		})
	}
}

/// A single label predicate, e.g. `severity=critical` or `instance=~us-.+`.
///
/// On the wire a matcher is the tuple `[name, operator, value]`, the shape
/// Alertmanager uses for `object_matchers`.
#[derive(Debug, Clone)]
pub struct Matcher {
	name: String,
	operator: MatcherOperator,
	value: String,
	/// compiled lazily on first evaluation. `None` if `value` isn't a valid
	/// regular expression
	regex: OnceCell<Option<Regex>>,
}

impl Matcher {
	pub fn new(name: impl Into<String>, operator: MatcherOperator, value: impl Into<String>) -> Self {
		Self { name: name.into(), operator, value: value.into(), regex: OnceCell::new() }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn operator(&self) -> MatcherOperator {
		self.operator
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	/// Evaluates the matcher against a label set.
	///
	/// `!=` and `!~` are satisfied when the label is absent, `=` and `=~`
	/// are not. Regular expressions are unanchored. A value that doesn't
	/// compile as a regular expression never matches, whichever regex
	/// operator is used.
	pub fn matches(&self, labels: &LabelSet) -> bool {
		let label = labels.get(&self.name);

		match (self.operator, label) {
			(MatcherOperator::Equal, Some(value)) => *value == self.value,
			(MatcherOperator::Equal, None) => false,
			(MatcherOperator::NotEqual, Some(value)) => *value != self.value,
			(MatcherOperator::NotEqual, None) => true,
			(MatcherOperator::Regex, Some(value)) => self.regex().map_or(false, |re| re.is_match(value)),
			(MatcherOperator::Regex, None) => false,
			(MatcherOperator::NotRegex, Some(value)) => {
				self.regex().map_or(false, |re| !re.is_match(value))
			}
			(MatcherOperator::NotRegex, None) => self.regex().is_some(),
		}
	}

	fn regex(&self) -> Option<&Regex> {
		self.regex
			.get_or_init(|| match Regex::new(&self.value) {
				Ok(regex) => Some(regex),
				Err(err) => {
					tracing::debug!("matcher {self} has an invalid regular expression: {err}");
					None
				}
			})
			.as_ref()
	}
}

impl PartialEq for Matcher {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name && self.operator == other.operator && self.value == other.value
	}
}

impl Eq for Matcher {}

impl Hash for Matcher {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
		self.operator.hash(state);
		self.value.hash(state);
	}
}

impl fmt::Display for Matcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.name, self.operator)?;

		if needs_quoting(&self.value) {
			write!(f, "\"{}\"", self.value.replace('"', "\\\""))
		} else {
			f.write_str(&self.value)
		}
	}
}

impl FromStr for Matcher {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_matcher(s)
	}
}

impl Serialize for Matcher {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		(&self.name, self.operator, &self.value).serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Matcher {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let (name, operator, value) = <(String, MatcherOperator, String)>::deserialize(deserializer)?;

		if name.is_empty() {
			return Err(serde::de::Error::custom("matcher label name is empty"));
		}

		Ok(Self::new(name, operator, value))
	}
}

/// true if every matcher matches `labels`. an empty list matches everything
pub fn matches_all(matchers: &[Matcher], labels: &LabelSet) -> bool {
	matchers.iter().all(|matcher| matcher.matches(labels))
}

/// Parses a comma separated list of matcher expressions, skipping every
/// fragment that isn't a valid matcher.
///
/// Surrounding `{}` are stripped, values may be double quoted (`\"` inside
/// the quotes is unescaped) and commas inside quotes don't split.
pub fn parse_matchers(input: &str) -> Vec<Matcher> {
	split_expressions(strip_braces(input))
		.into_iter()
		.map(str::trim)
		.filter(|fragment| !fragment.is_empty())
		.filter_map(|fragment| match parse_matcher(fragment) {
			Ok(matcher) => Some(matcher),
			Err(err) => {
				tracing::trace!("skipping matcher expression: {err}");
				None
			}
		})
		.collect()
}

/// Parses exactly one matcher expression.
pub fn parse_matcher(expression: &str) -> Result<Matcher, Error> {
	let invalid = |reason| Error::InvalidMatcher { expression: expression.to_owned(), reason };

	let (position, operator) = find_operator(expression).ok_or_else(|| invalid("missing operator"))?;

	let name = expression[..position].trim();
	if name.is_empty() {
		return Err(invalid("empty label name"));
	}

	let value = unquote(expression[position + operator.as_str().len()..].trim());

	Ok(Matcher::new(name, operator, value))
}

/// Serializes matchers back into the syntax [parse_matchers] accepts.
pub fn format_matchers(matchers: &[Matcher]) -> String {
	matchers.iter().map(Matcher::to_string).collect::<Vec<_>>().join(", ")
}

/// Heuristic for telling the user their search input couldn't be understood:
/// nothing parsed although more than a few characters were typed.
pub fn is_lossy_parse(input: &str) -> bool {
	parse_matchers(input).is_empty() && input.trim().chars().count() > 3
}

/// position and operator of the first operator in `expression`
fn find_operator(expression: &str) -> Option<(usize, MatcherOperator)> {
	expression.char_indices().find_map(|(position, _)| {
		let rest = &expression[position..];
		MatcherOperator::SCAN_ORDER
			.into_iter()
			.find(|operator| rest.starts_with(operator.as_str()))
			.map(|operator| (position, operator))
	})
}

fn strip_braces(input: &str) -> &str {
	let trimmed = input.trim();
	trimmed.strip_prefix('{').and_then(|inner| inner.strip_suffix('}')).unwrap_or(trimmed)
}

/// splits on commas that aren't inside double quotes
fn split_expressions(input: &str) -> Vec<&str> {
	let mut fragments = Vec::new();
	let mut start = 0;
	let mut in_quotes = false;
	let mut escaped = false;

	for (position, c) in input.char_indices() {
		match c {
			_ if escaped => escaped = false,
			'\\' => escaped = true,
			'"' => in_quotes = !in_quotes,
			',' if !in_quotes => {
				fragments.push(&input[start..position]);
				start = position + 1;
			}
			_ => {}
		}
	}
	fragments.push(&input[start..]);

	fragments
}

fn unquote(value: &str) -> String {
	match value.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')) {
		Some(inner) => inner.replace("\\\"", "\""),
		None => value.to_owned(),
	}
}

fn needs_quoting(value: &str) -> bool {
	value.is_empty() || value.trim() != value || value.contains(|c| c == ',' || c == '"')
}
