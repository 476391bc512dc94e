//! dyngen: generate source for small units at runtime, resolve the binary
//! units they depend on, compile them and load the result in-process.
//!
//! - [`emitter`]: block-structured source writing and member declarations
//! - [`resolver`]: transitive dependency closure with hint-path probing
//! - [`gateway`]: compiler services and loading into a wasmtime store
//! - [`generator`]: the pipeline facade

pub mod config;
pub mod emitter;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod resolver;

pub use config::{CompilerConfig, CompilerKind, GatewayConfig, GeneratorConfig, ResolverConfig};
pub use emitter::{BlockGuard, Dialect, EmitError, MethodDef, SourceWriter, TypeRef, ValueType};
pub use error::{DynGenError, Result};
pub use gateway::{
    CompilationGateway, CompiledUnit, CompilerService, Diagnostic, GatewayError, OutputKind,
};
pub use generator::UnitGenerator;
pub use resolver::{DependencyReference, ReferenceResolver, ReferenceSet, ResolveError, UnitHandle};
