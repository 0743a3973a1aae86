//! Error taxonomy shared by the engine.

use crate::remote::RemoteError;
use crate::repo_address::RepoAddressError;
use crate::store::StoreError;

/// Coarse classification every error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credential or no access to the repository
    Auth,
    /// Missing path or ref
    NotFound,
    /// Stale version token or non-fast-forward update
    Conflict,
    /// Input rejected before or by the remote
    Validation,
    /// Network failure; surfaced as-is, never retried
    TransientNetwork,
    /// Local database failure
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Storage => "storage",
        };
        write!(f, "{}", name)
    }
}

/// Errors returned by [`Engine`](crate::Engine), [`Session`](crate::Session)
/// and [`EditorSession`](crate::EditorSession).
#[derive(Debug)]
pub enum EngineError {
    Remote(RemoteError),
    Store(StoreError),
    InvalidAddress(RepoAddressError),
    /// No credential is stored
    NotSignedIn,
    /// The editor session was closed
    DocumentNotOpen,
    /// An upload that must be an image had another MIME type
    NotAnImage(String),
    /// A metadata key that would not survive serialization
    InvalidKey(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Remote(e) => e.kind(),
            EngineError::Store(e) => e.kind(),
            EngineError::InvalidAddress(e) => e.kind(),
            EngineError::NotSignedIn => ErrorKind::Auth,
            EngineError::DocumentNotOpen
            | EngineError::NotAnImage(_)
            | EngineError::InvalidKey(_) => ErrorKind::Validation,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Remote(e) => write!(f, "{}", e),
            EngineError::Store(e) => write!(f, "{}", e),
            EngineError::InvalidAddress(e) => write!(f, "{}", e),
            EngineError::NotSignedIn => {
                write!(f, "Not signed in. Run 'loomsync auth login <owner/repo>' first.")
            }
            EngineError::DocumentNotOpen => write!(f, "Document is not open"),
            EngineError::NotAnImage(mime) => {
                write!(f, "Please choose an image file (got {}).", mime)
            }
            EngineError::InvalidKey(key) => write!(
                f,
                "Invalid field name '{}'. Use letters, digits and underscores.",
                key
            ),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Remote(e) => Some(e),
            EngineError::Store(e) => Some(e),
            EngineError::InvalidAddress(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RemoteError> for EngineError {
    fn from(e: RemoteError) -> Self {
        EngineError::Remote(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

impl From<RepoAddressError> for EngineError {
    fn from(e: RepoAddressError) -> Self {
        EngineError::InvalidAddress(e)
    }
}
