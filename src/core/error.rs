use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoatfishError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, GoatfishError>;
