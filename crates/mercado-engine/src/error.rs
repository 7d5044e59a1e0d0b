//! # Engine Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EngineError                                      │
//! │                                                                         │
//! │  Core(CoreError)   - lifecycle precondition failed; nothing was written │
//! │  Db(DbError)       - storage failed; the transaction was rolled back    │
//! │  Config errors     - invalid or unreadable configuration               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use mercado_core::CoreError;
use mercado_db::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Surfaced to callers verbatim.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSaveFailed(String),
}

impl EngineError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::Core(CoreError::not_found(entity, id))
    }

    /// The domain error, when this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            EngineError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<mercado_core::ValidationError> for EngineError {
    fn from(err: mercado_core::ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
