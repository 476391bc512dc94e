use super::ResolveError;
use std::path::{Path, PathBuf};
use tracing::debug;
use wasmtime::{Engine, Module};

/// A binary unit known to the process: its name, where it lives on disk (if
/// anywhere), and the units it references (if already known).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    name: String,
    location: Option<PathBuf>,
    references: Option<Vec<String>>,
}

impl UnitHandle {
    /// A unit known only by name. Its location is probed from the hint paths.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            location: None,
            references: None,
        }
    }

    /// A unit read from `path`; the name is the file stem.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            location: Some(path),
            references: None,
        }
    }

    /// A unit that exists only in memory, with a known reference list.
    pub fn in_memory(name: &str, references: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            location: None,
            references: Some(references),
        }
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = Some(references);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn references(&self) -> Option<&[String]> {
        self.references.as_deref()
    }
}

/// Reads the reference list out of a binary unit.
pub trait UnitInspector: Send + Sync {
    fn referenced_units(&self, path: &Path) -> Result<Vec<String>, ResolveError>;
}

/// Lists the import module names of a WebAssembly module, in first-seen order.
#[derive(Clone, Default)]
pub struct WasmInspector {
    engine: Engine,
}

impl WasmInspector {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

impl UnitInspector for WasmInspector {
    fn referenced_units(&self, path: &Path) -> Result<Vec<String>, ResolveError> {
        let module =
            Module::from_file(&self.engine, path).map_err(|e| ResolveError::Inspection {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut names: Vec<String> = Vec::new();
        for import in module.imports() {
            if !names.iter().any(|n| n == import.module()) {
                names.push(import.module().to_string());
            }
        }
        debug!("{} references {:?}", path.display(), names);
        Ok(names)
    }
}
