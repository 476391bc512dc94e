//! Compilation gateway
//!
//! Hands generated source plus its resolved references to a compiler
//! service, turns blocking diagnostics into a single detailed error, and
//! loads successful output as a uniquely named [`CompiledUnit`].

pub mod compiler;
pub mod rustc;
pub mod unit;
pub mod wat;

pub use self::compiler::{
    CompileRequest, CompilerOutput, CompilerService, Diagnostic, OutputKind, Severity,
};
pub use self::rustc::RustcCompiler;
pub use self::unit::CompiledUnit;
pub use self::wat::WatCompiler;

use crate::config::{CompilerConfig, CompilerKind, GatewayConfig};
use crate::resolver::ReferenceSet;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use wasmtime::Engine;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(
        "Compilation of '{unit}' failed!\n\n{}\n\nCode:\n\n{source_text}",
        format_diagnostics(.diagnostics)
    )]
    CompilationFailed {
        unit: String,
        diagnostics: Vec<Diagnostic>,
        source_text: String,
    },

    #[error("Compiler '{compiler}' is unavailable: {reason}")]
    CompilerUnavailable { compiler: String, reason: String },

    #[error("Compiler produced no binary for '{unit}'")]
    EmptyOutput { unit: String },

    #[error("Failed to load '{unit}': {reason}")]
    LoadFailed { unit: String, reason: String },

    #[error("'{unit}' has no member '{member}'")]
    MemberNotFound { unit: String, member: String },

    #[error("Call to '{member}' in '{unit}' failed: {reason}")]
    Invocation {
        unit: String,
        member: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// The blocking diagnostics of a failed compilation, empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            GatewayError::CompilationFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the compiler service selected by `config`.
pub fn compiler_from_config(config: &CompilerConfig, engine: &Engine) -> Box<dyn CompilerService> {
    match config.kind {
        CompilerKind::Wat => Box::new(WatCompiler::new(engine.clone())),
        CompilerKind::Rustc => Box::new(RustcCompiler::from_config(config)),
    }
}

pub struct CompilationGateway {
    compiler: Box<dyn CompilerService>,
    engine: Engine,
    config: GatewayConfig,
}

impl CompilationGateway {
    pub fn new(compiler: Box<dyn CompilerService>, config: GatewayConfig) -> Self {
        Self::with_engine(Engine::default(), compiler, config)
    }

    pub fn with_engine(
        engine: Engine,
        compiler: Box<dyn CompilerService>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            compiler,
            engine,
            config,
        }
    }

    /// A gateway over the in-process WAT compiler sharing the gateway's engine.
    pub fn wat(config: GatewayConfig) -> Self {
        let engine = Engine::default();
        let compiler = Box::new(WatCompiler::new(engine.clone()));
        Self::with_engine(engine, compiler, config)
    }

    pub fn with_compiler(mut self, compiler: Box<dyn CompilerService>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn compiler_name(&self) -> &'static str {
        self.compiler.name()
    }

    pub fn compile(
        &self,
        source: &str,
        references: &ReferenceSet,
    ) -> Result<CompiledUnit, GatewayError> {
        self.compile_as(OutputKind::Library, source, references)
    }

    pub fn compile_as(
        &self,
        output_kind: OutputKind,
        source: &str,
        references: &ReferenceSet,
    ) -> Result<CompiledUnit, GatewayError> {
        let unit_name = self.next_unit_name();
        let request = CompileRequest {
            unit_name: &unit_name,
            source,
            references: references.as_slice(),
            output_kind,
            warnings_as_errors: self.config.warnings_as_errors,
        };

        debug!(
            "Compiling {} with {} against {:?}",
            unit_name,
            self.compiler.name(),
            references.names()
        );
        let output = self.compiler.compile(&request)?;

        let (blocking, rest): (Vec<Diagnostic>, Vec<Diagnostic>) = output
            .diagnostics
            .into_iter()
            .partition(Diagnostic::is_blocking);

        for diagnostic in rest.iter().filter(|d| d.severity == Severity::Warning) {
            warn!("{}: {}", unit_name, diagnostic);
        }

        if !blocking.is_empty() {
            return Err(GatewayError::CompilationFailed {
                unit: unit_name,
                diagnostics: blocking,
                source_text: source.to_string(),
            });
        }

        let Some(binary) = output.binary else {
            return Err(GatewayError::EmptyOutput { unit: unit_name });
        };

        CompiledUnit::load(&self.engine, &unit_name, &binary, references.as_slice())
    }

    fn next_unit_name(&self) -> String {
        format!("{}{}", self.config.unit_prefix, Uuid::new_v4().simple())
    }
}
