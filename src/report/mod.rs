pub mod workbook;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One flat report row. Columns keep the order they were first set in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRow(Map<String, Value>);

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Seeds a counter at zero without disturbing an existing value.
    pub fn seed(&mut self, key: impl Into<String>) {
        self.0.entry(key.into()).or_insert(Value::from(0));
    }

    pub fn bump(&mut self, key: impl Into<String>) {
        let entry = self.0.entry(key.into()).or_insert(Value::from(0));
        let current = entry.as_u64().unwrap_or(0);
        *entry = Value::from(current + 1);
    }

    pub fn count(&self, key: &str) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn extend(&mut self, other: ReportRow) {
        self.0.extend(other.0);
    }
}
