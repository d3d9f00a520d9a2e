//! Error types for kompass.

use thiserror::Error;

use crate::models::Theme;

/// Result type alias using kompass's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kompass operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Page not found
    #[error("Page not found: {0}")]
    PageNotFound(i64),

    /// Organization not found
    #[error("Organization not found: {0}")]
    OrganizationNotFound(i64),

    /// An organization has no root page for a theme
    #[error("Organization {organization_id} has no root page for theme {theme}")]
    RootPageNotFound { organization_id: i64, theme: Theme },

    /// File attachment missing for a page
    #[error("File attachment not found for page: {0}")]
    FileNotFound(i64),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether this error means a lookup came back empty.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::PageNotFound(_)
                | Error::OrganizationNotFound(_)
                | Error::RootPageNotFound { .. }
                | Error::FileNotFound(_)
                | Error::Database(sqlx::Error::RowNotFound)
        )
    }
}
