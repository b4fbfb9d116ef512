//! Error types for the waitline service
//!
//! The core uses a typed error so that callers can tell a client-correctable
//! rejection apart from an unreachable authoritative store. Edges of the
//! application (configuration, bootstrap) use `anyhow`.

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, QueueError>;

/// Error kinds produced by queue operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("Queue not found: {queue_id}")]
    NotFound { queue_id: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Authoritative store unreachable: {message}")]
    Transport { message: String },

    #[error("Local storage error: {message}")]
    Storage { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl QueueError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the failure means the authoritative store could not be reached
    /// and the operation may be replayed against the local mirror.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Stable machine-readable name, used on the wire by the HTTP binding
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Transport { .. } => "transport",
            Self::Storage { .. } => "storage",
            Self::Internal { .. } => "internal",
        }
    }

    /// The message without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation { reason }
            | Self::InvalidOperation { reason }
            | Self::Forbidden { reason } => reason,
            Self::NotFound { queue_id } => queue_id,
            Self::Transport { message } | Self::Storage { message } | Self::Internal { message } => {
                message
            }
        }
    }

    /// Rebuild an error from its wire kind and message
    pub fn from_kind(kind: &str, message: String) -> Option<Self> {
        match kind {
            "validation" => Some(Self::Validation { reason: message }),
            "invalid_operation" => Some(Self::InvalidOperation { reason: message }),
            "not_found" => Some(Self::NotFound { queue_id: message }),
            "forbidden" => Some(Self::Forbidden { reason: message }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_fallback_worthy() {
        assert!(QueueError::transport("connection refused").is_transport());
        assert!(!QueueError::validation("memberId required").is_transport());
        assert!(!QueueError::storage("disk full").is_transport());
        assert!(!QueueError::NotFound {
            queue_id: "x".to_string()
        }
        .is_transport());
    }

    #[test]
    fn test_kind_round_trip_for_client_errors() {
        let err = QueueError::InvalidOperation {
            reason: "default queue cannot be deleted".to_string(),
        };
        let rebuilt = QueueError::from_kind(err.kind(), "default queue cannot be deleted".into());
        assert_eq!(rebuilt, Some(err));

        assert!(QueueError::from_kind("transport", "x".into()).is_none());

        let missing = QueueError::NotFound {
            queue_id: "ghost".to_string(),
        };
        assert_eq!(
            QueueError::from_kind(missing.kind(), missing.detail().to_string()),
            Some(missing)
        );
    }
}
