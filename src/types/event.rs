//! Operational hub events
//!
//! A `HubEvent` is one attributed record in the hub's append-only event
//! sequence. Events are best-effort operational history (durability is
//! delegated to the event store); the ledger handles tamper evidence
//! separately.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One attributed event recorded through the state hub
///
/// All named fields are optional; unknown fields round-trip through `extra`.
/// `timestamp` is float Unix seconds and defaults to append time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Event category, e.g. "control" or "telemetry"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Who caused the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Which surface the event entered through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,

    /// Which system the event is aimed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// What was done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Free-form action parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    /// Routing path the event took
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,

    /// Unix seconds; normalized by `record_event` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,

    /// Result of the action, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// Issuer signal carried by some events; mirrored into hub indices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<Value>,

    /// Any additional fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HubEvent {
    /// Convenience constructor for a target/action pair
    pub fn action(target: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Set the event category
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the acting identity
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set an explicit timestamp (Unix seconds)
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach an issuer signal
    pub fn with_iss(mut self, iss: Value) -> Self {
        self.iss = Some(iss);
        self
    }

    /// Attach free-form parameters
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Serialize to a JSON string (for JSONL)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_round_trip() {
        let event = HubEvent::action("DALS", "ping")
            .with_kind("control")
            .with_actor("operator")
            .with_timestamp(1_700_000_000.5);

        let line = event.to_json_line().unwrap();
        assert!(line.contains("\"type\":\"control\""));
        assert!(line.contains("\"target\":\"DALS\""));

        let parsed = HubEvent::from_json_line(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let line = r#"{"target":"GOAT","action":"sync","shard":7}"#;
        let event = HubEvent::from_json_line(line).unwrap();

        assert_eq!(event.extra.get("shard"), Some(&json!(7)));

        let out = event.to_json_line().unwrap();
        assert!(out.contains("\"shard\":7"));
    }

    #[test]
    fn test_absent_fields_not_serialized() {
        let event = HubEvent::action("DALS", "ping");
        let line = event.to_json_line().unwrap();

        assert!(!line.contains("outcome"));
        assert!(!line.contains("timestamp"));
        assert!(!line.contains("iss"));
    }
}
