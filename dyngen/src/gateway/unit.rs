use super::GatewayError;
use crate::resolver::DependencyReference;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info};
use wasmtime::{Engine, Func, FuncType, Instance, Linker, Module, Store, TypedFunc, Val, WasmParams, WasmResults};
use wasmtime_wasi::sync::WasiCtxBuilder;
use wasmtime_wasi::WasiCtx;

/// Per-unit host state.
pub struct UnitState {
    wasi: WasiCtx,
}

/// A compiled unit loaded into its own store, ready for member calls.
pub struct CompiledUnit {
    name: String,
    module: Module,
    store: Store<UnitState>,
    instance: Instance,
    linked: Vec<String>,
}

impl CompiledUnit {
    pub(crate) fn load(
        engine: &Engine,
        name: &str,
        binary: &[u8],
        references: &[DependencyReference],
    ) -> Result<Self, GatewayError> {
        let load_failed = |reason: String| GatewayError::LoadFailed {
            unit: name.to_string(),
            reason,
        };

        let module =
            Module::from_binary(engine, binary).map_err(|e| load_failed(format!("{:#}", e)))?;

        let wasi = WasiCtxBuilder::new().inherit_stdio().build();
        let mut store = Store::new(engine, UnitState { wasi });
        let mut linker: Linker<UnitState> = Linker::new(engine);
        wasmtime_wasi::add_to_linker(&mut linker, |state: &mut UnitState| &mut state.wasi)
            .map_err(|e| load_failed(format!("failed to add WASI to linker: {:#}", e)))?;

        let linked = link_references(engine, &mut linker, &mut store, &module, references)
            .map_err(load_failed)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| load_failed(format!("{:#}", e)))?;

        info!("Loaded unit {} (linked: {:?})", name, linked);
        Ok(Self {
            name: name.to_string(),
            module,
            store,
            instance,
            linked,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the file references instantiated and linked into this unit.
    pub fn references(&self) -> &[String] {
        &self.linked
    }

    pub fn exports(&self) -> Vec<String> {
        self.module
            .exports()
            .map(|export| export.name().to_string())
            .collect()
    }

    pub fn member_type(&mut self, member: &str) -> Result<FuncType, GatewayError> {
        let func = self.func(member)?;
        Ok(func.ty(&self.store))
    }

    pub fn typed_func<P, R>(&mut self, member: &str) -> Result<TypedFunc<P, R>, GatewayError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.func(member)?;
        self.instance
            .get_typed_func::<P, R>(&mut self.store, member)
            .map_err(|e| self.invocation_error(member, e))
    }

    /// Call a member with statically typed parameters and results.
    pub fn call<P, R>(&mut self, member: &str, params: P) -> Result<R, GatewayError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self.typed_func::<P, R>(member)?;
        debug!("Calling {}::{}", self.name, member);
        func.call(&mut self.store, params)
            .map_err(|e| self.invocation_error(member, e))
    }

    /// Call a member with dynamically typed values.
    pub fn invoke(&mut self, member: &str, args: &[Val]) -> Result<Vec<Val>, GatewayError> {
        let func = self.func(member)?;
        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];
        debug!("Invoking {}::{} with {} argument(s)", self.name, member, args.len());
        func.call(&mut self.store, args, &mut results)
            .map_err(|e| self.invocation_error(member, e))?;
        Ok(results)
    }

    fn func(&mut self, member: &str) -> Result<Func, GatewayError> {
        self.instance
            .get_func(&mut self.store, member)
            .ok_or_else(|| GatewayError::MemberNotFound {
                unit: self.name.clone(),
                member: member.to_string(),
            })
    }

    fn invocation_error(&self, member: &str, error: anyhow::Error) -> GatewayError {
        GatewayError::Invocation {
            unit: self.name.clone(),
            member: member.to_string(),
            reason: format!("{:#}", error),
        }
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name)
            .field("exports", &self.exports())
            .field("references", &self.linked)
            .finish()
    }
}

/// Instantiate the file references `module` needs, directly or through other
/// references, and register each under its name. A reference is instantiated
/// once every module it imports from is available.
fn link_references(
    engine: &Engine,
    linker: &mut Linker<UnitState>,
    store: &mut Store<UnitState>,
    module: &Module,
    references: &[DependencyReference],
) -> Result<Vec<String>, String> {
    let mut available: HashSet<String> = references
        .iter()
        .filter(|reference| reference.is_host())
        .map(|reference| reference.name.clone())
        .collect();

    let mut pending: Vec<(String, Module)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<String> = module
        .imports()
        .map(|import| import.module().to_string())
        .collect();
    // First reference per name, the same one the compiler checks against.
    let mut by_name: HashMap<&str, &DependencyReference> = HashMap::new();
    for reference in references {
        by_name.entry(reference.name.as_str()).or_insert(reference);
    }

    while let Some(name) = frontier.pop_front() {
        if available.contains(&name) || !seen.insert(name.clone()) {
            continue;
        }
        // Unknown modules are left for the linker to report.
        let Some(path) = by_name.get(name.as_str()).and_then(|reference| reference.path()) else {
            continue;
        };
        let dependency = Module::from_file(engine, path).map_err(|e| {
            format!("failed to load reference '{}' from {}: {:#}", name, path.display(), e)
        })?;
        frontier.extend(dependency.imports().map(|import| import.module().to_string()));
        pending.push((name, dependency));
    }

    let mut linked = Vec::new();
    while !pending.is_empty() {
        // With no ready reference left (a cycle or a missing module), take the
        // first one anyway so the linker reports what is missing.
        let index = pending
            .iter()
            .position(|(_, dependency)| {
                dependency
                    .imports()
                    .all(|import| available.contains(import.module()))
            })
            .unwrap_or(0);
        let (name, dependency) = pending.remove(index);

        let instance = linker
            .instantiate(&mut *store, &dependency)
            .map_err(|e| format!("failed to instantiate reference '{}': {:#}", name, e))?;
        linker
            .instance(&mut *store, &name, instance)
            .map_err(|e| format!("failed to register reference '{}': {:#}", name, e))?;
        debug!("Linked reference {}", name);

        available.insert(name.clone());
        linked.push(name);
    }

    Ok(linked)
}
