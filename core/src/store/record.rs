use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current skill records keyed by bare skill name, in insertion order.
pub type SkillMap = IndexMap<String, SkillRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub code: String,
    pub description: String,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: String,
    pub version: u32,
    pub success_count: u64,
    pub fail_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
}

impl SkillRecord {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<String>,
        created_by_name: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            created_by: created_by.into(),
            created_by_name: created_by_name.into(),
            created_at: Utc::now().to_rfc3339(),
            version,
            success_count: 0,
            fail_count: 0,
            migrated_from: None,
        }
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.version == 0 {
            return Err("version must be at least 1".to_string());
        }
        if parse_timestamp(&self.created_at).is_none() {
            return Err(format!("created_at is not ISO-8601: {:?}", self.created_at));
        }
        if self.created_by.trim().is_empty() {
            return Err("created_by is empty".to_string());
        }
        Ok(())
    }
}

/// Accepts RFC 3339 timestamps and the offset-less form older writers produced.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn is_unsafe_skill_name(name: &str) -> bool {
    name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.trim().is_empty()
}
