use thiserror::Error;

/// Storage-backend failures. Quota exhaustion is distinguished because the
/// seen-cache reacts to it by evicting and retrying once.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error taxonomy for the sync engine.
///
/// `Cancelled` and `Busy` are control-flow signals: the facade swallows them
/// and never surfaces them to the presentation layer. `Retryable` failures
/// are retried with backoff by the fetch loop before being surfaced.
/// Reconciliation outcomes are not part of this enum: no operation returns
/// them, they flow through `SyncEvent` notifications instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("operation cancelled")]
    Cancelled,

    /// A fetch is already in flight for this consumer (single-flight guard).
    #[error("a fetch is already in flight")]
    Busy,

    /// Network-level or 5xx-class failure. Eligible for automatic retry.
    #[error("transient transport failure: {source}")]
    Retryable {
        #[source]
        source: anyhow::Error,
    },

    /// 4xx-class or validation failure. Never retried.
    #[error("request rejected ({status}): {message}")]
    Terminal { status: u16, message: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

impl SyncError {
    pub fn retryable(source: impl Into<anyhow::Error>) -> Self {
        SyncError::Retryable {
            source: source.into(),
        }
    }

    pub fn terminal(status: u16, message: impl Into<String>) -> Self {
        SyncError::Terminal {
            status,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SyncError::retryable(anyhow::anyhow!("socket closed")).is_retryable());
        assert!(!SyncError::terminal(400, "bad cursor").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(SyncError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_display_includes_status() {
        let err = SyncError::terminal(422, "validation failed");
        assert_eq!(err.to_string(), "request rejected (422): validation failed");
    }
}
