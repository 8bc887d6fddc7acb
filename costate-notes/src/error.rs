//! Error types for the notes store

use libcostate::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotesError>;

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository error: {0}")]
    Repository(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts() {
        let err: NotesError = StoreError::ConcurrentAccess.into();
        assert!(matches!(err, NotesError::Store(StoreError::ConcurrentAccess)));
        assert_eq!(
            err.to_string(),
            "Store error: Concurrent access: store is locked by another execution context"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = NotesError::from(ConfigError::MissingField("config directory".to_string()));
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field: config directory"
        );
    }

    #[test]
    fn test_repository_error_display() {
        let err = NotesError::Repository("note 7 not found".to_string());
        assert_eq!(err.to_string(), "Repository error: note 7 not found");
    }
}
