//! notification policy tree engine
//!
//! Features:
//! - parses label matchers from search input and evaluates them against alert labels
//! - resolves the settings every notification policy inherits from its ancestors
//! - searches the resolved tree and previews how alert instances are routed
//! - renders and evaluates mute timings

pub mod alert;
pub mod duration;
pub mod error;
pub mod filter;
pub mod inheritance;
pub mod matcher;
pub mod mute_timing;
pub mod policy_config;
pub mod route;
pub mod routing;

pub use error::Error;
pub use filter::{find_routes_matching_filters, find_routes_matching_predicate, FilterCriteria, FilterResult, MatchedRoute};
pub use inheritance::{compute_inherited_tree, InheritableField, InheritanceDefaults, InheritedProperties, ResolvedRoute};
pub use matcher::{format_matchers, parse_matcher, parse_matchers, LabelSet, Matcher, MatcherOperator};
pub use mute_timing::{render_time_intervals, MuteTiming, TimeInterval, TimeRange};
pub use policy_config::PolicyConfig;
pub use route::{RawRoute, RouteNode, RouteSettings};
pub use routing::{find_matching_routes, preview_routing, RoutingPreview};
