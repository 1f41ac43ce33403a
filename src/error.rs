//! Error types for the migration engine

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Row contains fields not in template {template}: {}", fields.join(", "))]
    UnknownFields {
        template: String,
        fields: Vec<String>,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("PDF merge failed: {0}")]
    Pdf(String),

    #[error("Image derivative failed: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap any displayable XML reader/writer error
    pub fn xml(err: impl std::fmt::Display) -> Self {
        AppError::Xml(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
