//! Error types for key-value store access.

/// Errors raised by a [`KvStore`](crate::KvStore) implementation.
///
/// These never reach callers of [`CacheClient`](crate::CacheClient): the
/// client logs them and degrades to a miss, `false` or a default value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("command {command} failed: {reason}")]
    Command { command: String, reason: String },

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store has been marked unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Creates a new connection error.
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    /// Creates a new command error.
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error means the store itself is unreachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::command("SMEMBERS", "WRONGTYPE");
        assert_eq!(err.to_string(), "command SMEMBERS failed: WRONGTYPE");
    }

    #[test]
    fn test_transport_classification() {
        assert!(StoreError::connection("refused").is_transport());
        assert!(StoreError::Unavailable("down".into()).is_transport());
        assert!(!StoreError::command("GET", "boom").is_transport());
    }
}
