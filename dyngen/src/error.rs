use crate::config::ConfigError;
use crate::emitter::EmitError;
use crate::gateway::GatewayError;
use crate::resolver::ResolveError;
use thiserror::Error;

/// Any failure along the generate pipeline.
#[derive(Debug, Error)]
pub enum DynGenError {
    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, DynGenError>;
