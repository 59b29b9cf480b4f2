//! Append-only evidence store.
//!
//! Facts gathered during a run are keyed by a deterministic id, kept in
//! insertion order, and never deleted or overwritten. That append-only
//! discipline is what makes the audit trail trustworthy: a citation in a
//! later cognition step always refers to exactly the fact that was recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single fact gathered during execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceRecord {
    pub id: String,
    /// Where the fact came from (usually the tool that produced it).
    pub source: String,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

impl EvidenceRecord {
    pub fn new(id: impl Into<String>, source: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Derive the evidence id for a tool result.
///
/// Ids are `evidence_<tool>_<parameters>` with the parameters rendered as
/// compact JSON. `serde_json` maps are ordered by key, so structurally equal
/// parameter sets always produce the same id — redundancy detection and
/// citation checks agree on identity by construction.
pub fn evidence_id(tool_name: &str, parameters: &Value) -> String {
    format!("evidence_{tool_name}_{parameters}")
}

/// Insertion-ordered, append-only collection of evidence records.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    records: Vec<EvidenceRecord>,
    index: HashMap<String, usize>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns `false` without modifying the store if the id
    /// is already present — existing evidence is never overwritten.
    pub fn append(&mut self, record: EvidenceRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Record ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EvidenceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_and_get() {
        let mut store = EvidenceStore::new();
        let record = EvidenceRecord::new("ev-1", "get_weather", json!({"temperature_f": 60}));
        assert!(store.append(record));
        assert!(store.contains("ev-1"));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("ev-1").unwrap().content,
            json!({"temperature_f": 60})
        );
    }

    #[test]
    fn test_duplicate_id_is_rejected_without_overwrite() {
        let mut store = EvidenceStore::new();
        store.append(EvidenceRecord::new("ev-1", "get_weather", json!(1)));
        let accepted = store.append(EvidenceRecord::new("ev-1", "get_weather", json!(2)));
        assert!(!accepted);
        assert_eq!(store.len(), 1);
        // Original content survives.
        assert_eq!(store.get("ev-1").unwrap().content, json!(1));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut store = EvidenceStore::new();
        store.append(EvidenceRecord::new("b", "t", json!(null)));
        store.append(EvidenceRecord::new("a", "t", json!(null)));
        store.append(EvidenceRecord::new("c", "t", json!(null)));
        assert_eq!(store.ids(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_evidence_id_is_structural() {
        // Key order in the literal does not matter: serde_json maps sort keys.
        let a: Value = serde_json::from_str(r#"{"city": "Miami", "units": "f"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"units": "f", "city": "Miami"}"#).unwrap();
        assert_eq!(evidence_id("get_weather", &a), evidence_id("get_weather", &b));
        assert!(evidence_id("get_weather", &a).starts_with("evidence_get_weather_"));
    }
}
