/// Data models for the persisted preference document
///
/// Field names follow the on-disk JSON layout (camelCase) so documents
/// written by earlier releases load unchanged.

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Per-context history is capped at this many records (newest kept)
pub const MAX_PATTERNS_PER_CONTEXT: usize = 100;

/// Root object stored in `tool-preferences.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDocument {
    #[serde(default, deserialize_with = "lenient_patterns")]
    pub patterns: BTreeMap<String, Vec<PatternRecord>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub migration_info: MigrationInfo,
}

impl PreferenceDocument {
    /// Empty document stamped with the current time
    pub fn new() -> Self {
        Self {
            patterns: BTreeMap::new(),
            last_updated: Some(Utc::now()),
            migration_info: MigrationInfo::default(),
        }
    }

    /// What `getPreferences` hands out before anything was loaded
    pub fn unloaded() -> Self {
        Self {
            patterns: BTreeMap::new(),
            last_updated: None,
            migration_info: MigrationInfo::default(),
        }
    }

    /// Patterns filed under `context_key`, oldest first
    pub fn patterns_for(&self, context_key: &str) -> &[PatternRecord] {
        self.patterns
            .get(context_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append a record and drop the oldest entries past the cap
    pub fn push_pattern(&mut self, context_key: &str, pattern: PatternRecord) {
        let history = self.patterns.entry(context_key.to_string()).or_default();
        history.push(pattern);

        if history.len() > MAX_PATTERNS_PER_CONTEXT {
            let overflow = history.len() - MAX_PATTERNS_PER_CONTEXT;
            history.drain(..overflow);
        }
    }

    pub fn total_patterns(&self) -> usize {
        self.patterns.values().map(Vec::len).sum()
    }
}

impl Default for PreferenceDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Records whether this document came from the legacy external file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInfo {
    #[serde(default)]
    pub migrated: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub migration_date: Option<DateTime<Utc>>,
}

/// One learned interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub original: String,
    #[serde(default)]
    pub enhanced: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(deserialize_with = "required_timestamp")]
    pub timestamp: DateTime<Utc>,
    // Always true for now; nothing inspects the model result yet.
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

/// RFC 3339 strings, or epoch milliseconds as a number or numeric string
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|ts| ts.with_timezone(&Utc))
            .ok()
            .or_else(|| text.trim().parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn required_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value).ok_or_else(|| D::Error::custom(format!("unrecognized timestamp {}", value)))
}

// Unreadable optional timestamps become None rather than failing the document
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value))
}

/// Parse history one record at a time; bad records are skipped, not fatal
fn lenient_patterns<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<PatternRecord>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(contexts) = Value::deserialize(deserializer)? else {
        warn!("Stored patterns are not an object, ignoring them");
        return Ok(BTreeMap::new());
    };

    let mut patterns = BTreeMap::new();
    for (context_key, records) in contexts {
        let Value::Array(records) = records else {
            warn!(context = %context_key, "Pattern history is not a list, skipping context");
            continue;
        };

        let mut history = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<PatternRecord>(record) {
                Ok(record) => history.push(record),
                Err(e) => warn!(
                    context = %context_key,
                    index,
                    error = %e,
                    "Skipping unreadable pattern record"
                ),
            }
        }

        if !history.is_empty() {
            patterns.insert(context_key, history);
        }
    }

    Ok(patterns)
}

impl PatternRecord {
    /// Build a successful record stamped now
    pub fn new(original: &str, enhanced: &str, context: &str, tool: Option<&str>) -> Self {
        Self {
            original: original.to_string(),
            enhanced: enhanced.to_string(),
            context: context.to_string(),
            tool: tool.map(str::to_string),
            timestamp: Utc::now(),
            success: true,
        }
    }
}

/// Style and requirement guidance for one context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePreferences {
    pub style: Option<String>,
    pub requirements: Option<Vec<String>>,
}

impl StylePreferences {
    pub fn new(style: &str, requirements: &[&str]) -> Self {
        Self {
            style: Some(style.to_string()),
            requirements: Some(requirements.iter().map(|r| r.to_string()).collect()),
        }
    }

    /// Top-level override: any field `other` sets replaces ours
    pub fn overlay(self, other: StylePreferences) -> Self {
        Self {
            style: other.style.or(self.style),
            requirements: other.requirements.or(self.requirements),
        }
    }
}

/// Summary of what the store has learned
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceStats {
    pub context_count: usize,
    pub total_patterns: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub migration_info: MigrationInfo,
}

impl From<&PreferenceDocument> for PreferenceStats {
    fn from(doc: &PreferenceDocument) -> Self {
        Self {
            context_count: doc.patterns.len(),
            total_patterns: doc.total_patterns(),
            last_updated: doc.last_updated,
            migration_info: doc.migration_info.clone(),
        }
    }
}
