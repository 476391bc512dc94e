//! Unit generator
//!
//! Ties the pipeline together: references accumulate across calls (starting
//! from the baseline), and each `generate*` call compiles one piece of source
//! against everything referenced so far and loads it.

use crate::config::GeneratorConfig;
use crate::emitter::{Dialect, EmitError, SourceWriter};
use crate::error::Result;
use crate::gateway::{
    compiler_from_config, CompilationGateway, CompiledUnit, CompilerService, OutputKind,
};
use crate::resolver::{ReferenceResolver, ReferenceSet, UnitHandle, WasmInspector};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wasmtime::Engine;

pub struct UnitGenerator {
    resolver: ReferenceResolver,
    gateway: CompilationGateway,
    references: ReferenceSet,
}

impl UnitGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let engine = Engine::default();
        let compiler = compiler_from_config(&config.compiler, &engine);
        let resolver = ReferenceResolver::with_inspector(
            config.resolver,
            Arc::new(WasmInspector::new(engine.clone())),
        );
        let gateway = CompilationGateway::with_engine(engine, compiler, config.gateway);
        Self::from_parts(resolver, gateway)
    }

    pub fn from_parts(resolver: ReferenceResolver, gateway: CompilationGateway) -> Self {
        let references = resolver.baseline();
        Self {
            resolver,
            gateway,
            references,
        }
    }

    pub fn with_compiler(mut self, compiler: Box<dyn CompilerService>) -> Self {
        self.gateway = self.gateway.with_compiler(compiler);
        self
    }

    /// Resolve `unit` and add its closure to the accumulated references.
    /// Returns how many references were new.
    pub fn reference_unit(&mut self, unit: &UnitHandle) -> Result<usize> {
        let resolved = self.resolver.resolve(unit)?;
        let added = self.references.extend(resolved);
        info!("Referenced {} (+{} reference(s))", unit.name(), added);
        Ok(added)
    }

    pub fn reference_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        self.reference_unit(&UnitHandle::at_path(path.as_ref()))
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn gateway(&self) -> &CompilationGateway {
        &self.gateway
    }

    pub fn generate(&self, code: &str) -> Result<CompiledUnit> {
        self.generate_as(OutputKind::Library, code)
    }

    pub fn generate_as(&self, kind: OutputKind, code: &str) -> Result<CompiledUnit> {
        Ok(self.gateway.compile_as(kind, code, &self.references)?)
    }

    /// Emit source through `build` and compile the result. Unbalanced blocks
    /// fail before anything is compiled.
    pub fn generate_with<F>(&self, dialect: Dialect, build: F) -> Result<CompiledUnit>
    where
        F: FnOnce(&mut SourceWriter) -> std::result::Result<(), EmitError>,
    {
        let mut writer = SourceWriter::for_dialect(dialect);
        build(&mut writer)?;
        let source = writer.into_text()?;
        self.generate(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{MethodDef, ValueType};
    use crate::error::DynGenError;

    #[test]
    fn test_starts_with_baseline() {
        let generator = UnitGenerator::new(GeneratorConfig::default());
        assert_eq!(generator.references().names(), vec!["wasi_snapshot_preview1"]);
    }

    #[test]
    fn test_generate_with_emitted_wat() {
        let generator = UnitGenerator::new(GeneratorConfig::default());
        let add = MethodDef::new("add")
            .returns(ValueType::I32)
            .with_arg("a", ValueType::I32)
            .with_arg("b", ValueType::I32);

        let mut unit = generator
            .generate_with(Dialect::Wat, |w| {
                w.start_namespace("calc");
                {
                    let mut method = w.write_method(&add);
                    method.write_line("local.get $a");
                    method.write_line("local.get $b");
                    method.write_line("i32.add");
                }
                w.finish_block(None)
            })
            .unwrap();

        let sum: i32 = unit.call("add", (40, 2)).unwrap();
        assert_eq!(sum, 42);
    }

    #[test]
    fn test_unbalanced_emission_is_not_compiled() {
        let generator = UnitGenerator::new(GeneratorConfig::default());
        let err = generator
            .generate_with(Dialect::Wat, |w| {
                w.start_namespace("open");
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DynGenError::Emit(EmitError::UnclosedBlocks(_))));
    }

    #[test]
    fn test_reference_missing_file_fails() {
        let mut generator = UnitGenerator::new(GeneratorConfig::default());
        let err = generator.reference_file("/no/such/lib.wasm").unwrap_err();
        assert!(matches!(err, DynGenError::Resolve(_)));
        assert_eq!(generator.references().len(), 1);
    }
}
