//! # Error Types
//!
//! The gateway classifies failures into user errors (bad input, 4xx),
//! missing resources, and internal failures (store, bus, upstream
//! connections). Every pipeline primitive returns `Result<T>` carrying one
//! of these.

/// Custom result type for Okapi operations
pub type Result<T> = std::result::Result<T, OkapiError>;

/// Main error type for the Okapi gateway
#[derive(thiserror::Error, Debug)]
pub enum OkapiError {
    /// Bad input from the caller (4xx class)
    #[error("{message}")]
    User { message: String },

    /// Authentication / tenant problems
    #[error("{message}")]
    Forbidden { message: String },

    /// Unknown module, tenant or deployment
    #[error("{message}")]
    NotFound { message: String },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal gateway errors (bus, upstream connection, unclassified)
    #[error("{message}")]
    Internal { message: String },
}

impl OkapiError {
    /// Create a user (bad request) error
    pub fn user<S: Into<String>>(message: S) -> Self {
        Self::User { message: message.into() }
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            OkapiError::User { .. } => 400,
            OkapiError::Forbidden { .. } => 403,
            OkapiError::NotFound { .. } => 404,
            OkapiError::Serialization { .. } => 400,
            OkapiError::Database { .. }
            | OkapiError::Io { .. }
            | OkapiError::Config { .. }
            | OkapiError::Internal { .. } => 500,
        }
    }
}

impl From<sqlx::Error> for OkapiError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for OkapiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<std::io::Error> for OkapiError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = OkapiError::user("bad module descriptor");
        assert!(matches!(error, OkapiError::User { .. }));
        assert_eq!(error.to_string(), "bad module descriptor");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OkapiError::user("x").status_code(), 400);
        assert_eq!(OkapiError::forbidden("x").status_code(), 403);
        assert_eq!(OkapiError::not_found("x").status_code(), 404);
        assert_eq!(OkapiError::config("x").status_code(), 500);
        assert_eq!(OkapiError::internal("x").status_code(), 500);
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let okapi_error: OkapiError = io_error.into();
        assert!(matches!(okapi_error, OkapiError::Io { .. }));
        assert_eq!(okapi_error.status_code(), 500);

        let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let okapi_error: OkapiError = json_error.into();
        assert!(matches!(okapi_error, OkapiError::Serialization { .. }));
        assert_eq!(okapi_error.status_code(), 400);
    }
}
