/// Error types for gemini-mcp
///
/// Every fallible operation in the crate returns `Result<T>`.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for gemini-mcp operations
#[derive(Error, Debug)]
pub enum GeminiError {
    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport errors talking to the model API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend kind not recognised
    #[error("Unsupported storage type: {0}. Supported types: json, memory")]
    UnsupportedStorage(String),

    /// Durable storage could not be read or parsed
    #[error("Failed to read storage at {path}: {reason}")]
    StorageRead { path: String, reason: String },

    /// Durable storage could not be written
    #[error("Failed to write storage at {path}: {reason}")]
    StorageWrite { path: String, reason: String },

    /// Preferences store used before `initialize()`
    #[error("Preferences store is not initialized")]
    NotInitialized,

    /// Tool arguments failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The model API returned an error or an unusable response
    #[error("Model error: {0}")]
    Model(String),

    /// No tool registered under that name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Result type alias for gemini-mcp operations
pub type Result<T> = std::result::Result<T, GeminiError>;

/// Convert GeminiError to a user-friendly error message
impl GeminiError {
    pub fn user_message(&self) -> String {
        match self {
            GeminiError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            GeminiError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            GeminiError::Http(e) => {
                format!("Could not reach the Gemini API. Details: {}", e)
            }
            GeminiError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            GeminiError::UnsupportedStorage(kind) => {
                format!("Storage type '{}' is not supported (use json or memory)", kind)
            }
            GeminiError::StorageRead { path, reason } => {
                format!("Could not read preferences from {}: {}", path, reason)
            }
            GeminiError::StorageWrite { path, reason } => {
                format!("Could not save preferences to {}: {}", path, reason)
            }
            GeminiError::NotInitialized => {
                "Preferences have not been loaded yet".to_string()
            }
            GeminiError::InvalidArgument(msg) => msg.clone(),
            GeminiError::Model(msg) => {
                format!("Gemini request failed: {}", msg)
            }
            GeminiError::UnknownTool(name) => {
                format!("Tool '{}' does not exist", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = GeminiError::UnknownTool("gemini-paint".to_string());
        assert!(err.user_message().contains("gemini-paint"));

        let err = GeminiError::StorageWrite {
            path: "/data/tool-preferences.json".to_string(),
            reason: "read-only file system".to_string(),
        };
        assert!(err.user_message().contains("read-only"));
    }

    #[test]
    fn test_error_display() {
        let err = GeminiError::UnsupportedStorage("bogus".to_string());
        let display = format!("{}", err);
        assert!(display.contains("bogus"));
        assert!(display.contains("json, memory"));
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{oops");
        let err: GeminiError = parse.unwrap_err().into();
        assert!(matches!(err, GeminiError::Serialization(_)));
    }
}
