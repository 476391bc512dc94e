//! The compiler service boundary: source text plus references in, a binary or
//! a list of diagnostics out.

use super::GatewayError;
use crate::resolver::DependencyReference;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    /// A warning the compiler was asked to treat as an error.
    pub warning_as_error: bool,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn note(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, code, message)
    }

    fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
            warning_as_error: false,
        }
    }

    /// Mark a warning as escalated when `escalate` is set.
    pub fn escalated(mut self, escalate: bool) -> Self {
        self.warning_as_error = escalate && self.severity == Severity::Warning;
        self
    }

    /// Whether this diagnostic prevents the unit from being loaded.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error || self.warning_as_error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// A unit whose exported members are called by the host.
    #[default]
    Library,
    /// A unit with a `_start` entry point.
    Command,
}

impl OutputKind {
    pub fn crate_type(&self) -> &'static str {
        match self {
            OutputKind::Library => "cdylib",
            OutputKind::Command => "bin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub unit_name: &'a str,
    pub source: &'a str,
    pub references: &'a [DependencyReference],
    pub output_kind: OutputKind,
    pub warnings_as_errors: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    pub binary: Option<Vec<u8>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerOutput {
    pub fn success(binary: Vec<u8>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            binary: Some(binary),
            diagnostics,
        }
    }

    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            binary: None,
            diagnostics,
        }
    }
}

/// A compiler front end that turns source text into a loadable binary.
///
/// Implementations report problems in the source as diagnostics and reserve
/// `Err` for failures of the service itself (missing executable, I/O).
pub trait CompilerService: Send + Sync {
    fn name(&self) -> &'static str;

    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompilerOutput, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_diagnostics() {
        assert!(Diagnostic::error("E0425", "cannot find value").is_blocking());
        assert!(!Diagnostic::warning("unused", "unused variable").is_blocking());
        assert!(Diagnostic::warning("unused", "unused variable")
            .escalated(true)
            .is_blocking());
        assert!(!Diagnostic::note("help", "consider").escalated(true).is_blocking());
    }

    #[test]
    fn test_display_includes_code() {
        let diagnostic = Diagnostic::error("E0425", "cannot find value `y` in this scope");
        assert_eq!(
            diagnostic.to_string(),
            "E0425: cannot find value `y` in this scope"
        );
    }
}
