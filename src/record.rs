//! Repository records as returned by the GitHub REST API.
//!
//! A record is kept as the raw JSON object so that fields this service never
//! reads still make it into the archive unchanged. `RepoSummary` is the typed
//! view over the handful of fields that are displayed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The raw upstream object for one repository. Never mutated after it is fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoRecord(Map<String, Value>);

/// The fields of a record that are displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub html_url: String,
}

impl RepoRecord {
    /// Wraps an upstream payload. Fails unless it is a JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Typed view of the displayed fields.
    ///
    /// An error here means the payload did not have the upstream shape.
    pub fn summary(&self) -> Result<RepoSummary, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn full_name(&self) -> Option<&str> {
        self.0.get("full_name").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_reads_upstream_fields() {
        let record = RepoRecord::from_value(json!({
            "full_name": "rust-lang/rust",
            "description": "Empowering everyone",
            "stargazers_count": 100,
            "forks_count": 10,
            "html_url": "https://github.com/rust-lang/rust",
            "language": "Rust"
        }))
        .unwrap();

        let summary = record.summary().unwrap();
        assert_eq!(summary.full_name, "rust-lang/rust");
        assert_eq!(summary.description.as_deref(), Some("Empowering everyone"));
        assert_eq!(summary.stargazers_count, 100);
        assert_eq!(summary.forks_count, 10);
    }

    #[test]
    fn test_null_description_is_allowed() {
        let record = RepoRecord::from_value(json!({
            "full_name": "a/b",
            "description": null,
            "stargazers_count": 0,
            "forks_count": 0,
            "html_url": "https://github.com/a/b"
        }))
        .unwrap();

        assert_eq!(record.summary().unwrap().description, None);
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let raw = json!({"full_name": "a/a", "stargazers_count": 1, "topics": ["x"]});
        let record = RepoRecord::from_value(raw.clone()).unwrap();

        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
        assert_eq!(record.get("topics"), Some(&json!(["x"])));
    }

    #[test]
    fn test_missing_fields_have_no_summary() {
        let record = RepoRecord::from_value(json!({"full_name": "a/a"})).unwrap();
        assert_eq!(record.full_name(), Some("a/a"));
        assert!(record.summary().is_err());
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(RepoRecord::from_value(json!([1, 2])).is_err());
        assert!(RepoRecord::from_value(json!("a/b")).is_err());
    }
}
