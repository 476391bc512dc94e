//! In-process WebAssembly text compiler.
//!
//! Besides parsing and validating, it checks every import against the compile
//! references so that a unit naming a symbol no reference provides fails at
//! compile time rather than at load time.

use super::compiler::{CompileRequest, CompilerOutput, CompilerService, Diagnostic, OutputKind};
use super::GatewayError;
use crate::resolver::DependencyReference;
use std::collections::{HashMap, HashSet};
use wasmtime::{Engine, Module};

#[derive(Clone, Default)]
pub struct WatCompiler {
    engine: Engine,
}

impl WatCompiler {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    fn check_imports(&self, module: &Module, references: &[DependencyReference]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut missing_modules: HashSet<String> = HashSet::new();
        let mut loaded: HashMap<String, Result<Module, String>> = HashMap::new();

        for import in module.imports() {
            let Some(reference) = references.iter().find(|r| r.name == import.module()) else {
                if missing_modules.insert(import.module().to_string()) {
                    diagnostics.push(Diagnostic::error(
                        "unresolved-module",
                        format!(
                            "module `{}` (imported for `{}`) is not among the compile references",
                            import.module(),
                            import.name()
                        ),
                    ));
                }
                continue;
            };

            // Host-provided references are checked by the linker at load time.
            let Some(path) = reference.path() else {
                continue;
            };

            let dependency = loaded
                .entry(reference.name.clone())
                .or_insert_with(|| {
                    Module::from_file(&self.engine, path).map_err(|e| format!("{:#}", e))
                });

            match dependency {
                Ok(dependency) => {
                    if !dependency.exports().any(|export| export.name() == import.name()) {
                        diagnostics.push(Diagnostic::error(
                            "unresolved-symbol",
                            format!(
                                "`{}` is not exported by `{}` ({})",
                                import.name(),
                                reference.name,
                                path.display()
                            ),
                        ));
                    }
                }
                Err(reason) => diagnostics.push(Diagnostic::error(
                    "unreadable-reference",
                    format!(
                        "reference `{}` at {} is not a valid unit: {}",
                        reference.name,
                        path.display(),
                        reason
                    ),
                )),
            }
        }

        diagnostics
    }
}

impl CompilerService for WatCompiler {
    fn name(&self) -> &'static str {
        "wat"
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompilerOutput, GatewayError> {
        let binary = match wat::parse_str(request.source) {
            Ok(binary) => binary,
            Err(e) => {
                return Ok(CompilerOutput::failed(vec![Diagnostic::error(
                    "wat-syntax",
                    e.to_string(),
                )]))
            }
        };

        let module = match Module::new(&self.engine, &binary) {
            Ok(module) => module,
            Err(e) => {
                return Ok(CompilerOutput::failed(vec![Diagnostic::error(
                    "wasm-invalid",
                    format!("{:#}", e),
                )]))
            }
        };

        let mut diagnostics = self.check_imports(&module, request.references);

        match request.output_kind {
            OutputKind::Library => {
                if module.exports().len() == 0 {
                    diagnostics.push(
                        Diagnostic::warning(
                            "no-exports",
                            format!("unit `{}` exports nothing; no member will be callable", request.unit_name),
                        )
                        .escalated(request.warnings_as_errors),
                    );
                }
            }
            OutputKind::Command => {
                if !module.exports().any(|export| export.name() == "_start") {
                    diagnostics.push(Diagnostic::error(
                        "missing-entry-point",
                        "command units must export `_start`",
                    ));
                }
            }
        }

        Ok(CompilerOutput::success(binary, diagnostics))
    }
}
