//! Error types for the extension lifecycle manager.

/// Extension lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Failed to resolve extension {id}: {reason}")]
    Resolve { id: String, reason: String },

    #[error("Failed to install extension {id}: {reason}")]
    Install { id: String, reason: String },

    #[error("Failed to uninstall extension {id}: {reason}")]
    Uninstall { id: String, reason: String },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("Job failed to complete: {0}")]
    JobFailed(String),

    #[error("Context not found: {0}")]
    ContextNotFound(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtensionError {
    pub fn resolve(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolve {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn install(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Install {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn uninstall(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Uninstall {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for extension operations
pub type Result<T> = std::result::Result<T, ExtensionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtensionError::resolve("org.example:app", "not in any repository");
        assert_eq!(
            err.to_string(),
            "Failed to resolve extension org.example:app: not in any repository"
        );

        let err = ExtensionError::ClassNotFound("org.example.Foo".to_string());
        assert!(err.to_string().contains("Class not found"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ExtensionError = io.into();
        assert!(matches!(err, ExtensionError::Io(_)));
    }
}
