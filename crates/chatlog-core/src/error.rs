//! Error taxonomy for chat log persistence.

/// Errors produced by chat log operations.
///
/// Only [`ChatLogError::InvalidStream`] reaches callers of the history
/// façade; the other variants are absorbed and reported to the installed
/// observer.
#[derive(Debug, thiserror::Error)]
pub enum ChatLogError {
    #[error("malformed log data: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("entry is not serializable: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("storage io error at {path}: {source}")]
    StorageIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid stream identifier: {0}")]
    InvalidStream(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatLogError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Short, stable label for the error class (used in structured logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::StorageIo { .. } => "storage_io",
            Self::InvalidStream(_) => "invalid_stream",
            Self::Config(_) => "config",
        }
    }
}

/// Result type for chat log operations.
pub type Result<T> = std::result::Result<T, ChatLogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_stream_display() {
        let err = ChatLogError::InvalidStream("ai_3".to_string());
        assert!(err.to_string().contains("invalid stream identifier"));
        assert!(err.to_string().contains("ai_3"));
        assert_eq!(err.kind(), "invalid_stream");
    }

    #[test]
    fn test_storage_io_display_names_path() {
        let err = ChatLogError::io(
            "chat_logs/chat_history.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("chat_logs/chat_history.json"));
        assert!(msg.contains("denied"));
        assert_eq!(err.kind(), "storage_io");
    }

    #[test]
    fn test_decode_error_kind() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ChatLogError::Decode(json_err);
        assert!(err.to_string().contains("malformed log data"));
        assert_eq!(err.kind(), "decode");
    }
}
