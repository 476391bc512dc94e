//! dyngen command line
//!
//! `dyngen compile` builds a source file against resolved references, loads
//! it and optionally calls one of its members. `dyngen resolve` prints the
//! reference closure of a unit as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dyngen::config::{CompilerKind, GeneratorConfig};
use dyngen::gateway::OutputKind;
use dyngen::resolver::{ReferenceResolver, UnitHandle};
use dyngen::UnitGenerator;
use std::path::{Path, PathBuf};
use tracing::info;
use wasmtime::{Val, ValType};

#[derive(Parser, Debug)]
#[command(name = "dyngen", version, about = "Compile and load generated units")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file, load it and optionally call a member
    Compile {
        /// Source file to compile
        source: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Unit binary to reference (its dependencies are resolved too)
        #[arg(long = "reference")]
        references: Vec<PathBuf>,

        /// Directory probed for units without a location (searched before configured ones)
        #[arg(long = "hint-path")]
        hint_paths: Vec<PathBuf>,

        /// Compiler service to use
        #[arg(long, value_enum)]
        compiler: Option<CompilerArg>,

        #[arg(long, value_enum, default_value_t = KindArg::Library)]
        kind: KindArg,

        #[arg(long)]
        warnings_as_errors: bool,

        /// Exported member to call after loading
        #[arg(long)]
        invoke: Option<String>,

        /// Argument for the invoked member, converted to its parameter type
        #[arg(long = "arg", requires = "invoke", allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the reference closure of a unit as JSON
    Resolve {
        /// Unit binary to start from
        unit: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long = "hint-path")]
        hint_paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompilerArg {
    Wat,
    Rustc,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Library,
    Command,
}

fn load_config(path: Option<&Path>, hint_paths: Vec<PathBuf>) -> anyhow::Result<GeneratorConfig> {
    let mut config = match path {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    }
    .with_env_overrides();

    if !hint_paths.is_empty() {
        let configured = std::mem::take(&mut config.resolver.hint_paths);
        config.resolver.hint_paths = hint_paths.into_iter().chain(configured).collect();
    }
    Ok(config)
}

fn parse_arg(raw: &str, ty: &ValType) -> anyhow::Result<Val> {
    let value = match ty {
        ValType::I32 => Val::I32(raw.parse().with_context(|| format!("'{}' is not an i32", raw))?),
        ValType::I64 => Val::I64(raw.parse().with_context(|| format!("'{}' is not an i64", raw))?),
        ValType::F32 => {
            let v: f32 = raw.parse().with_context(|| format!("'{}' is not an f32", raw))?;
            Val::F32(v.to_bits())
        }
        ValType::F64 => {
            let v: f64 = raw.parse().with_context(|| format!("'{}' is not an f64", raw))?;
            Val::F64(v.to_bits())
        }
        other => anyhow::bail!("parameters of type {:?} cannot be passed from the command line", other),
    };
    Ok(value)
}

fn format_val(value: &Val) -> String {
    match value {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{:?}", other),
    }
}

#[allow(clippy::too_many_arguments)]
fn compile(
    source: PathBuf,
    config: Option<PathBuf>,
    references: Vec<PathBuf>,
    hint_paths: Vec<PathBuf>,
    compiler: Option<CompilerArg>,
    kind: KindArg,
    warnings_as_errors: bool,
    invoke: Option<String>,
    args: Vec<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config.as_deref(), hint_paths)?;
    if let Some(compiler) = compiler {
        config.compiler.kind = match compiler {
            CompilerArg::Wat => CompilerKind::Wat,
            CompilerArg::Rustc => CompilerKind::Rustc,
        };
    }
    if warnings_as_errors {
        config.gateway.warnings_as_errors = true;
    }
    let output_kind = match kind {
        KindArg::Library => OutputKind::Library,
        KindArg::Command => OutputKind::Command,
    };

    let mut generator = UnitGenerator::new(config);
    for reference in &references {
        generator.reference_file(reference)?;
    }

    let code = std::fs::read_to_string(&source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    let mut unit = generator.generate_as(output_kind, &code)?;
    info!("Loaded {} with exports {:?}", unit.name(), unit.exports());
    println!("{}", unit.name());

    let member = match (invoke, output_kind) {
        (Some(member), _) => member,
        (None, OutputKind::Command) => "_start".to_string(),
        (None, OutputKind::Library) => return Ok(()),
    };

    let ty = unit.member_type(&member)?;
    if ty.params().len() != args.len() {
        anyhow::bail!(
            "'{}' takes {} argument(s), {} given",
            member,
            ty.params().len(),
            args.len()
        );
    }
    let values = args
        .iter()
        .zip(ty.params())
        .map(|(raw, ty)| parse_arg(raw, &ty))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let results = unit.invoke(&member, &values)?;
    for result in &results {
        println!("{}", format_val(result));
    }
    Ok(())
}

fn resolve(unit: PathBuf, config: Option<PathBuf>, hint_paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_deref(), hint_paths)?;
    let resolver = ReferenceResolver::new(config.resolver);
    let references = resolver.resolve(&UnitHandle::at_path(unit))?;
    println!("{}", serde_json::to_string_pretty(&references)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("dyngen=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            source,
            config,
            references,
            hint_paths,
            compiler,
            kind,
            warnings_as_errors,
            invoke,
            args,
        } => compile(
            source,
            config,
            references,
            hint_paths,
            compiler,
            kind,
            warnings_as_errors,
            invoke,
            args,
        ),
        Commands::Resolve {
            unit,
            config,
            hint_paths,
        } => resolve(unit, config, hint_paths),
    }
}
