//! The notification policy document: the policy tree plus the mute timings
//! its policies reference, as exported by the Alertmanager configuration API.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::Error, mute_timing::MuteTiming, route::RouteNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
	pub route: RouteNode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub mute_time_intervals: Vec<MuteTiming>,
}

impl PolicyConfig {
	/// Reads a policy document from a YAML or JSON file and validates it.
	pub fn load(path: &Path) -> Result<Self, Error> {
		let load_error = |reason: String| Error::Load { path: path.display().to_string(), reason };

		let content = std::fs::read_to_string(path).map_err(|err| load_error(err.to_string()))?;
		let config: Self = serde_yaml::from_str(&content).map_err(|err| load_error(err.to_string()))?;

		config.validate()?;

		tracing::info!(
			policies = config.route.count(),
			mute_timings = config.mute_time_intervals.len(),
			"loaded notification policies from {}",
			path.display()
		);

		Ok(config)
	}

	/// Checks every mute timing and that every policy only references
	/// mute timings that exist.
	pub fn validate(&self) -> Result<(), Error> {
		for timing in &self.mute_time_intervals {
			timing.validate()?;
		}

		let mut result = Ok(());
		self.route.walk(&mut |route| {
			if result.is_err() {
				return;
			}
			if let Some(timing) = route.mute_time_intervals.iter().find(|name| self.mute_timing(name).is_none()) {
				result = Err(Error::UnknownMuteTiming { route: route.id.clone(), timing: timing.clone() });
			}
		});

		result
	}

	pub fn mute_timing(&self, name: &str) -> Option<&MuteTiming> {
		self.mute_time_intervals.iter().find(|timing| timing.name == name)
	}
}
