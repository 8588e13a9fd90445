//! alert instances fed into the routing preview
//!
//! Accepts either a bare JSON list of instances or an Alertmanager webhook
//! payload, so captured notifications can be replayed against a policy tree.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::LabelSet;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInstance {
	pub labels: LabelSet,
	#[serde(default)]
	pub annotations: HashMap<String, String>,
	#[serde(default)]
	pub starts_at: Option<DateTime<Utc>>,
}

/// the parts of a webhook notification the preview needs
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
	alerts: Vec<AlertInstance>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum AlertDocument {
	Webhook(WebhookData),
	Instances(Vec<AlertInstance>),
}

/// Reads alert instances from JSON.
pub fn parse_alert_instances(input: &str) -> Result<Vec<AlertInstance>, serde_json::Error> {
	Ok(match serde_json::from_str(input)? {
		AlertDocument::Webhook(data) => data.alerts,
		AlertDocument::Instances(instances) => instances,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_webhook_payloads() {
		let payload = r#"{
			"version": "4",
			"groupKey": "{}:{alertname=\"HighLatency\"}",
			"receiver": "ops-pager",
			"status": "firing",
			"alerts": [{
				"status": "firing",
				"labels": { "alertname": "HighLatency", "team": "ops" },
				"annotations": { "summary": "p99 above 1s" },
				"startsAt": "2024-01-15T09:00:00Z",
				"endsAt": "0001-01-01T00:00:00Z",
				"generatorURL": "http://prometheus/graph"
			}],
			"externalURL": "http://alertmanager"
		}"#;

		let instances = parse_alert_instances(payload).unwrap();

		assert_eq!(instances.len(), 1);
		assert_eq!(instances[0].labels["team"], "ops");
		assert_eq!(instances[0].annotations["summary"], "p99 above 1s");
		assert!(instances[0].starts_at.is_some());
	}

	#[test]
	fn reads_bare_instance_lists() {
		let instances = parse_alert_instances(
			r#"[{ "labels": { "team": "dev" } }, { "labels": { "team": "ops", "env": "prod" } }]"#,
		).unwrap();

		assert_eq!(instances.len(), 2);
		assert_eq!(instances[1].labels.len(), 2);
		assert!(instances[1].starts_at.is_none());
	}
}
