//! Error taxonomy shared by the store, the orchestrator, and the surfaces.

use crawl_harness_core::models::UnknownPlatform;
use crawl_harness_core::schema::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported platform: '{0}'")]
    InvalidPlatform(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("a crawler task is already running ({running}); try again once it finishes")]
    Conflict { running: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidPlatform(_) => "invalid_platform",
            Error::InvalidInput(_) | Error::Decode(_) => "invalid_input",
            Error::Conflict { .. } => "conflict",
            Error::NotFound(_) => "not_found",
            Error::Persistence(_) => "persistence",
            Error::Schema(_) | Error::Io(_) => "internal",
        }
    }
}

impl From<UnknownPlatform> for Error {
    fn from(e: UnknownPlatform) -> Self {
        Error::InvalidPlatform(e.0)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
