//! Multi-cache snapshot documents.
//!
//! A snapshot is a JSON object mapping each cache's name to that cache's own
//! serialized body (a string). Keeping bodies opaque lets one corrupt cache
//! fail to restore without affecting the others.

use std::collections::BTreeMap;
use std::path::Path;

use marquee_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Named cache bodies, serialized together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDocument {
    caches: BTreeMap<String, String>,
}

impl SnapshotDocument {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the body stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, body: String) {
        self.caches.insert(name.into(), body);
    }

    /// Body stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.caches.get(name).map(String::as_str)
    }

    /// Names of all stored caches, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }

    /// Number of stored caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Whether no cache bodies are stored.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Serialize the whole document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a whole document.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::snapshot(format!("invalid snapshot document: {e}")))
    }

    /// Write the document to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!("Saved cache snapshot to {:?}", path);
        Ok(())
    }

    /// Read a document from `path`.
    ///
    /// A missing file yields an empty document. An unreadable or corrupt file
    /// is logged and also yields an empty document.
    pub fn load_or_empty(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| Self::parse(&content));

        match parsed {
            Ok(doc) => {
                info!("Loaded cache snapshot from {:?}", path);
                doc
            }
            Err(e) => {
                warn!("Ignoring cache snapshot at {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

/// Outcome of restoring several caches from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Entries restored, per cache name.
    pub restored: BTreeMap<String, usize>,
    /// Caches whose body was present but could not be parsed.
    pub failed: Vec<String>,
}

impl RestoreReport {
    /// Total entries restored across all caches.
    pub fn total(&self) -> usize {
        self.restored.values().sum()
    }

    /// Merge another report into this one.
    pub fn extend(&mut self, other: RestoreReport) {
        self.restored.extend(other.restored);
        self.failed.extend(other.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_serializes_as_flat_object() {
        let mut doc = SnapshotDocument::new();
        doc.insert("movies", r#"{"603":{}}"#.to_string());
        doc.insert("people", "{}".to_string());

        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["movies"], r#"{"603":{}}"#);
        assert_eq!(json["people"], "{}");
        assert_eq!(doc.names().collect::<Vec<_>>(), vec!["movies", "people"]);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = SnapshotDocument::parse("not json").unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut doc = SnapshotDocument::new();
        doc.insert("series", "{}".to_string());
        doc.save(&path).unwrap();

        assert_eq!(SnapshotDocument::load_or_empty(&path), doc);
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(SnapshotDocument::load_or_empty(&missing).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ truncated").unwrap();
        assert!(SnapshotDocument::load_or_empty(&corrupt).is_empty());
    }

    #[test]
    fn report_totals() {
        let mut report = RestoreReport::default();
        report.restored.insert("a".into(), 2);
        let mut other = RestoreReport::default();
        other.restored.insert("b".into(), 3);
        other.failed.push("c".into());
        report.extend(other);

        assert_eq!(report.total(), 5);
        assert_eq!(report.failed, vec!["c".to_string()]);
    }
}
