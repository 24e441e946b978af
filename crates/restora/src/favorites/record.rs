use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-marked job the client keeps viewable past the retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub job_id: String,
    pub group_id: String,
    /// Source URL, possibly a signed URL that has since expired.
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// A durable copy exists in the blob cache.
    #[serde(default)]
    pub is_cached: bool,
}

impl FavoriteRecord {
    pub fn new(
        job_id: impl Into<String>,
        group_id: impl Into<String>,
        url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            group_id: group_id.into(),
            url: url.into(),
            created_at,
            label: None,
            is_cached: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_without_optional_fields() {
        let json = r#"{"jobId":"j1","groupId":"g1","url":"https://h/a.png","createdAt":"2026-01-01T00:00:00Z"}"#;
        let record: FavoriteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.job_id, "j1");
        assert!(record.label.is_none());
        assert!(!record.is_cached);
    }

    #[test]
    fn test_serialize_camel_case() {
        let record = FavoriteRecord::new("j1", "g1", "https://h/a.png", Utc::now()).with_label("Restore");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["jobId"], "j1");
        assert_eq!(value["isCached"], false);
        assert_eq!(value["label"], "Restore");
    }
}
