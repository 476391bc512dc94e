use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where a resolved reference comes from at link time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceLocation {
    /// A binary on disk.
    File { path: PathBuf },
    /// Provided by the host linker; nothing is read from disk.
    Host,
}

/// One binary unit needed to compile and link generated source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReference {
    /// Unit name, used as the import module name when linking.
    pub name: String,
    /// Deduplication key.
    pub identity: String,
    pub location: ReferenceLocation,
}

impl DependencyReference {
    pub fn file(name: &str, path: &Path) -> Self {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self {
            name: name.to_string(),
            identity: canonical.display().to_string(),
            location: ReferenceLocation::File { path: canonical },
        }
    }

    pub fn host(name: &str) -> Self {
        Self {
            name: name.to_string(),
            identity: format!("host:{}", name),
            location: ReferenceLocation::Host,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            ReferenceLocation::File { path } => Some(path),
            ReferenceLocation::Host => None,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.location, ReferenceLocation::Host)
    }
}

/// A unit that could not be located. Recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeMiss {
    pub unit: String,
    pub reason: String,
}

/// Ordered, identity-deduplicated set of references.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferenceSet {
    entries: Vec<DependencyReference>,
    #[serde(skip)]
    identities: HashSet<String>,
    unresolved: Vec<ProbeMiss>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `reference` unless its identity is already present. A name is the
    /// link-time module name, so the first reference with a given name wins
    /// and a later one from a different file is dropped.
    pub fn insert(&mut self, reference: DependencyReference) -> bool {
        if self.identities.contains(&reference.identity) {
            return false;
        }
        if let Some(existing) = self.get(&reference.name) {
            warn!(
                "Ignoring {} for '{}': name already bound to {}",
                reference.identity, reference.name, existing.identity
            );
            return false;
        }
        self.identities.insert(reference.identity.clone());
        self.entries.push(reference);
        true
    }

    /// Merge `other` into this set, returning how many references were new.
    pub fn extend(&mut self, other: ReferenceSet) -> usize {
        let mut added = 0;
        for reference in other.entries {
            if self.insert(reference) {
                added += 1;
            }
        }
        for miss in other.unresolved {
            self.record_miss(miss);
        }
        added
    }

    pub fn record_miss(&mut self, miss: ProbeMiss) {
        if !self.unresolved.iter().any(|m| m.unit == miss.unit) {
            self.unresolved.push(miss);
        }
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    pub fn get(&self, name: &str) -> Option<&DependencyReference> {
        self.entries.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyReference> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[DependencyReference] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn unresolved(&self) -> &[ProbeMiss] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates_by_identity() {
        let mut set = ReferenceSet::new();
        assert!(set.insert(DependencyReference::host("wasi_snapshot_preview1")));
        assert!(!set.insert(DependencyReference::host("wasi_snapshot_preview1")));
        assert_eq!(set.len(), 1);
        assert!(set.contains_identity("host:wasi_snapshot_preview1"));
    }

    #[test]
    fn test_extend_counts_new_entries_and_keeps_misses() {
        let mut left = ReferenceSet::new();
        left.insert(DependencyReference::host("a"));

        let mut right = ReferenceSet::new();
        right.insert(DependencyReference::host("a"));
        right.insert(DependencyReference::host("b"));
        right.record_miss(ProbeMiss {
            unit: "c".to_string(),
            reason: "not found".to_string(),
        });

        assert_eq!(left.extend(right), 1);
        assert_eq!(left.names(), vec!["a", "b"]);
        assert_eq!(left.unresolved().len(), 1);
        assert!(left.get("b").map(|r| r.is_host()).unwrap_or(false));
    }

    #[test]
    fn test_first_reference_keeps_its_name() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let first = dir_a.path().join("mathlib.wasm");
        let second = dir_b.path().join("mathlib.wasm");
        std::fs::write(&first, b"").unwrap();
        std::fs::write(&second, b"").unwrap();

        let mut set = ReferenceSet::new();
        assert!(set.insert(DependencyReference::file("mathlib", &first)));
        assert!(!set.insert(DependencyReference::file("mathlib", &second)));
        assert!(!set.insert(DependencyReference::host("mathlib")));

        assert_eq!(set.names(), vec!["mathlib"]);
        let kept = set.get("mathlib").unwrap();
        assert_eq!(kept.path(), Some(std::fs::canonicalize(&first).unwrap().as_path()));
    }

    #[test]
    fn test_file_reference_identity_is_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.wasm");
        std::fs::write(&path, b"").unwrap();

        let reference = DependencyReference::file("lib", &path);
        let canonical = std::fs::canonicalize(&path).unwrap();
        assert_eq!(reference.identity, canonical.display().to_string());
        assert_eq!(reference.path(), Some(canonical.as_path()));
    }
}
