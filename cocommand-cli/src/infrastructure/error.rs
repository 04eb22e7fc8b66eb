use cocommand_sync::SessionError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema generation failed: {0}")]
    SchemaGeneration(String),

    #[error("Invalid schema directory: {path}")]
    InvalidSchemaDirectory { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl CliError {
    pub fn invalid_directory(path: PathBuf) -> Self {
        CliError::InvalidSchemaDirectory { path }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
