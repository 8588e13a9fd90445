//! errors surfaced by the notification policy engine
//!
//! Parsing search input and evaluating matchers never fail, so the only
//! errors here come from the deserialization boundary and from structural
//! problems in the policy tree.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// the same policy id was reached twice while walking the tree
	#[error("notification policy {0:?} appears more than once in the tree")]
	DuplicateRoute(String),

	/// neither the root policy nor the configured defaults name a receiver
	#[error("the root notification policy has no receiver and no default receiver is configured")]
	MissingRootReceiver,

	#[error("invalid matcher {expression:?}: {reason}")]
	InvalidMatcher { expression: String, reason: &'static str },

	#[error("invalid duration {0:?}")]
	InvalidDuration(String),

	/// a policy that was rejected while reading it from the wire format
	#[error("invalid notification policy {route:?}: {source}")]
	InvalidRoute {
		route: String,
		#[source]
		source: Box<Error>,
	},

	#[error("invalid time interval in mute timing {timing:?}: {reason}")]
	InvalidTimeInterval { timing: String, reason: String },

	#[error("notification policy {route:?} references unknown mute timing {timing:?}")]
	UnknownMuteTiming { route: String, timing: String },

	#[error("failed to load notification policies from {path}: {reason}")]
	Load { path: String, reason: String },
}

impl Error {
	pub(crate) fn invalid_route(route: &str, source: Error) -> Self {
		Self::InvalidRoute { route: route.to_owned(), source: Box::new(source) }
	}
}
