use thiserror::Error;

/// All errors produced by vigil-core.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("search asset not found: {path}")]
    AssetMissing { path: std::path::PathBuf },

    #[error("search '{0}' is already registered")]
    DuplicateSearch(String),

    #[error("unknown search '{0}'")]
    UnknownSearch(String),

    #[error("decoder error: {0}")]
    Engine(String),

    #[error("session is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VigilError>;
