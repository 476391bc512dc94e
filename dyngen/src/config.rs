//! Configuration for reference resolution, compilation and loading.
//!
//! Everything is an explicit value handed to the component that needs it.
//! A `GeneratorConfig` can be read from TOML:
//!
//! ```toml
//! [resolver]
//! hint_paths = ["./units", "/opt/dyngen/units"]
//!
//! [gateway]
//! warnings_as_errors = true
//!
//! [compiler]
//! kind = "rustc"
//! target = "wasm32-unknown-unknown"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding `resolver.hint_paths` (platform path-list syntax).
pub const HINT_PATHS_ENV: &str = "DYNGEN_HINT_PATHS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub resolver: ResolverConfig,
    pub gateway: GatewayConfig,
    pub compiler: CompilerConfig,
}

impl GeneratorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `DYNGEN_HINT_PATHS` if it is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = std::env::var_os(HINT_PATHS_ENV) {
            self.resolver.hint_paths = std::env::split_paths(&value).collect();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directories searched, in order, for units without an on-disk location.
    pub hint_paths: Vec<PathBuf>,
    /// Host-provided units every generated unit references. WASI preview1 is
    /// the only module the host links; standard library code is compiled into
    /// each unit, so there is no separate base library to reference.
    pub baseline: Vec<String>,
    /// File extension of unit binaries.
    pub extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            hint_paths: Vec::new(),
            baseline: vec!["wasi_snapshot_preview1".to_string()],
            extension: "wasm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Prefix of generated unit names; a random suffix keeps them unique.
    pub unit_prefix: String,
    /// Ask the compiler to escalate warnings to errors.
    pub warnings_as_errors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            unit_prefix: "unit_".to_string(),
            warnings_as_errors: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerKind {
    #[default]
    Wat,
    Rustc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub kind: CompilerKind,
    /// `rustc` executable, looked up on PATH unless absolute.
    pub rustc: PathBuf,
    pub target: String,
    pub edition: String,
    pub extra_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            kind: CompilerKind::Wat,
            rustc: PathBuf::from("rustc"),
            target: "wasm32-unknown-unknown".to_string(),
            edition: "2021".to_string(),
            extra_args: Vec::new(),
        }
    }
}
