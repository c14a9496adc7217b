//! Error types for pools, registries and primitive factories

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Algorithm '{0}' is not supported by any provider")]
    AlgorithmUnavailable(String),

    #[error("Provider '{0}' is not registered")]
    ProviderUnavailable(String),

    #[error("Resource could not be created: {0}")]
    FactoryError(String),

    #[error("Pool is exhausted - no idle resources and no capacity left")]
    PoolExhausted,

    #[error("Timed out after {0:?} waiting for a resource")]
    PoolTimeout(Duration),

    #[error("No pool is registered for key '{0}'")]
    UnknownPool(String),

    #[error("Resource does not belong to this pool")]
    ForeignResource,

    #[error("Resource is not currently borrowed from this pool")]
    DoubleReturn,

    #[error("Pool is closed")]
    PoolClosed,
}

pub type PoolResult<T> = Result<T, PoolError>;
