use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error taxonomy for the access gateway.
///
/// Maintenance "no record" and permission denial are deliberately absent:
/// both are states the caller renders, never errors that cross the boundary.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create connection pool: {0}")]
    PoolCreation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Plan/billing query failure. Absorbed by the plan resolver, which
    /// fails closed to the non-Pro tier instead of propagating.
    #[error("Plan lookup failed: {0}")]
    Lookup(String),

    /// The chat router call itself failed. Carries the remote error message.
    #[error("Chat router error: {0}")]
    Transport(String),

    /// The chat router answered successfully but returned no payload.
    #[error("Chat router returned an empty response")]
    EmptyResponse,
}
