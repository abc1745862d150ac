use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// pytest-json-report output. Fields other than `warnings` pass through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub warnings: Vec<WarningRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarningRecord(pub Map<String, Value>);

impl WarningRecord {
    // Map keys are sorted, so field order never affects the fingerprint.
    fn fingerprint(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl Report {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading report: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing report JSON: {}", path.display()))
    }

    pub fn summary(&self) -> Option<&Map<String, Value>> {
        self.extra.get("summary").and_then(Value::as_object)
    }

    pub fn normalize(&mut self) {
        let warnings = std::mem::take(&mut self.warnings);
        self.warnings = dedup_warnings(warnings);
    }

    pub fn annotate(&mut self, key: &str, value: Value) {
        self.extra.entry(key.to_string()).or_insert(value);
    }
}

/// Keeps first occurrences; callers must not rely on the order.
pub fn dedup_warnings(warnings: Vec<WarningRecord>) -> Vec<WarningRecord> {
    let mut seen = HashSet::with_capacity(warnings.len());
    warnings
        .into_iter()
        .filter(|w| seen.insert(w.fingerprint()))
        .collect()
}
