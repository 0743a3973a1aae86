//! Remote store error types.

use crate::error::ErrorKind;

/// Errors returned by remote store operations and commit orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Credential rejected or no access to the repository
    Auth(String),
    /// Path, ref or object does not exist
    NotFound(String),
    /// Stale version token or non-fast-forward ref update
    Conflict(String),
    /// Request rejected as malformed
    Validation(String),
    /// A batch commit was requested with no files
    EmptyBatch,
    /// Network failure or server-side error
    Transient(String),
    /// Response could not be understood
    Protocol(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Auth(_) => ErrorKind::Auth,
            RemoteError::NotFound(_) => ErrorKind::NotFound,
            RemoteError::Conflict(_) => ErrorKind::Conflict,
            RemoteError::Validation(_) | RemoteError::EmptyBatch => ErrorKind::Validation,
            RemoteError::Transient(_) | RemoteError::Protocol(_) => ErrorKind::TransientNetwork,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict(_))
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Auth(e) => write!(f, "Authentication failed: {}", e),
            RemoteError::NotFound(what) => write!(f, "Not found: {}", what),
            RemoteError::Conflict(e) => write!(
                f,
                "Conflict: {}. The remote changed since it was read; reload and try again.",
                e
            ),
            RemoteError::Validation(e) => write!(f, "Rejected: {}", e),
            RemoteError::EmptyBatch => write!(f, "No files provided for batch commit."),
            RemoteError::Transient(e) => write!(f, "Network error: {}", e),
            RemoteError::Protocol(e) => write!(f, "Unexpected response: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(RemoteError::EmptyBatch.kind(), ErrorKind::Validation);
        assert_eq!(RemoteError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            RemoteError::Protocol("bad json".into()).kind(),
            ErrorKind::TransientNetwork
        );
    }

    #[test]
    fn test_display_mentions_retry_for_conflict() {
        let msg = RemoteError::Conflict("ref moved".into()).to_string();
        assert!(msg.contains("ref moved"));
        assert!(msg.contains("try again"));
    }
}
