use thiserror::Error;

/// Main error type for chunkheat
#[derive(Error, Debug)]
pub enum ChunkheatError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error while {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl ChunkheatError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a database error
    pub fn database(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Check if error is recoverable (the caller can ignore or retry the request)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChunkheatError::NotFound { .. } => true,
            ChunkheatError::InvalidInput { .. } => true,
            ChunkheatError::Json { .. } => true,
            ChunkheatError::Database { .. } => false,
            ChunkheatError::Configuration { .. } => false,
            _ => true,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ChunkheatError::NotFound { entity, id } => {
                format!("🔎 No {} with id {}", entity, id)
            }
            ChunkheatError::Database { .. } => {
                "💾 Database error occurred. Nothing was written.".to_string()
            }
            ChunkheatError::FileIO { path, .. } => {
                format!("📁 Could not access {}. Check the path and permissions.", path)
            }
            ChunkheatError::Json { context, .. } => {
                format!("📄 Malformed JSON while {}.", context)
            }
            ChunkheatError::Configuration { message } => {
                format!("⚙️  Bad configuration: {}", message)
            }
            ChunkheatError::InvalidInput { message } => format!("❌ {}", message),
            _ => "🔥 Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type ChunkheatResult<T> = Result<T, ChunkheatError>;

/// Attach a path to I/O failures
pub trait IoContext<T> {
    fn with_path(self, path: &std::path::Path) -> ChunkheatResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> ChunkheatResult<T> {
        self.map_err(|e| ChunkheatError::file_io(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_recoverable() {
        let err = ChunkheatError::not_found("chunk", "abc");
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "chunk not found: abc");
        assert!(err.user_message().contains("abc"));
    }

    #[test]
    fn test_database_error_is_fatal() {
        let err = ChunkheatError::database("record interaction", sqlx::Error::RowNotFound);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_io_context_keeps_path() {
        let res: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.with_path(std::path::Path::new("/tmp/frags.json")).unwrap_err();
        assert!(matches!(
            err,
            ChunkheatError::FileIO { ref path, .. } if path == "/tmp/frags.json"
        ));
    }
}
