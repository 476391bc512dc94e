//! Reference resolution
//!
//! Computes the transitive, deduplicated closure of binary units a generated
//! unit needs in order to compile and link. The walk is an explicit work-list
//! with a visited-name set, so reference cycles terminate and every unit is
//! visited at most once. All tracking state lives inside a single `resolve`
//! call; a resolver can be shared between threads.

pub mod probe;
pub mod reference;
pub mod unit;

pub use reference::{DependencyReference, ProbeMiss, ReferenceLocation, ReferenceSet};
pub use unit::{UnitHandle, UnitInspector, WasmInspector};

use crate::config::ResolverConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cannot resolve references of '{unit}': {reason}")]
    UnresolvableStartingPoint { unit: String, reason: String },

    #[error("Failed to inspect '{}': {reason}", .path.display())]
    Inspection { path: PathBuf, reason: String },
}

pub struct ReferenceResolver {
    config: ResolverConfig,
    inspector: Arc<dyn UnitInspector>,
    known_units: HashMap<String, UnitHandle>,
}

impl ReferenceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_inspector(config, Arc::new(WasmInspector::default()))
    }

    pub fn with_inspector(config: ResolverConfig, inspector: Arc<dyn UnitInspector>) -> Self {
        Self {
            config,
            inspector,
            known_units: HashMap::new(),
        }
    }

    /// Register a unit the process already knows about, so references to its
    /// name use this handle instead of a bare name.
    pub fn with_known_unit(mut self, unit: UnitHandle) -> Self {
        self.known_units.insert(unit.name().to_string(), unit);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The references every generated unit gets, whatever it starts from.
    pub fn baseline(&self) -> ReferenceSet {
        let mut set = ReferenceSet::new();
        for name in &self.config.baseline {
            set.insert(DependencyReference::host(name));
        }
        set
    }

    pub fn resolve(&self, start: &UnitHandle) -> Result<ReferenceSet, ResolveError> {
        let start = self.inspect_starting_point(start)?;

        let mut references = self.baseline();
        let mut visited: HashSet<String> = self.config.baseline.iter().cloned().collect();
        let mut frontier: VecDeque<UnitHandle> = VecDeque::new();

        visited.insert(start.name().to_string());
        frontier.push_back(start);

        while let Some(unit) = frontier.pop_front() {
            let Some(path) = self.locate(&unit) else {
                warn!(
                    "Could not make a reference to {}: no location and not found in hint paths {:?}",
                    unit.name(),
                    self.config.hint_paths
                );
                references.record_miss(ProbeMiss {
                    unit: unit.name().to_string(),
                    reason: "no on-disk location and not found in any hint path".to_string(),
                });
                continue;
            };

            if !references.insert(DependencyReference::file(unit.name(), &path)) {
                debug!("{} already referenced", path.display());
                continue;
            }

            let referenced = match unit.references() {
                Some(names) => names.to_vec(),
                None => match self.inspector.referenced_units(&path) {
                    Ok(names) => names,
                    Err(e) => {
                        warn!("Referencing {} without walking its dependencies: {}", unit.name(), e);
                        continue;
                    }
                },
            };

            for name in referenced {
                if visited.insert(name.clone()) {
                    let next = self
                        .known_units
                        .get(&name)
                        .cloned()
                        .unwrap_or_else(|| UnitHandle::named(&name));
                    frontier.push_back(next);
                }
            }
        }

        info!(
            "Resolved {} reference(s) from {} visited unit(s) ({} unresolved)",
            references.len(),
            visited.len(),
            references.unresolved().len()
        );
        Ok(references)
    }

    /// Validate the caller's starting unit and make its reference list explicit.
    fn inspect_starting_point(&self, start: &UnitHandle) -> Result<UnitHandle, ResolveError> {
        if start.name().trim().is_empty() {
            return Err(ResolveError::UnresolvableStartingPoint {
                unit: "<unnamed>".to_string(),
                reason: "unit handle has no name".to_string(),
            });
        }

        match (start.location(), start.references()) {
            (Some(path), None) => {
                if !path.is_file() {
                    return Err(ResolveError::UnresolvableStartingPoint {
                        unit: start.name().to_string(),
                        reason: format!("{} is not a file", path.display()),
                    });
                }
                let names = self.inspector.referenced_units(path).map_err(|e| {
                    ResolveError::UnresolvableStartingPoint {
                        unit: start.name().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(start.clone().with_references(names))
            }
            (Some(path), Some(_)) if !path.is_file() => {
                Err(ResolveError::UnresolvableStartingPoint {
                    unit: start.name().to_string(),
                    reason: format!("{} is not a file", path.display()),
                })
            }
            _ => Ok(start.clone()),
        }
    }

    fn locate(&self, unit: &UnitHandle) -> Option<PathBuf> {
        if let Some(path) = unit.location() {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            debug!("{} has a stale location {}", unit.name(), path.display());
        }
        probe::probe_hint_paths(&self.config.hint_paths, unit.name(), &self.config.extension)
    }
}
