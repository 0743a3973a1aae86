//! Value types exchanged with a remote object store.

use serde::{Deserialize, Serialize};

/// Identifier of a blob, tree or commit in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque optimistic-concurrency token for a remote file.
///
/// Tokens are compared for equality only; they carry no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a non-recursive directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub version_token: VersionToken,
    pub kind: EntryKind,
}

/// A file as fetched from the remote, content already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileSnapshot {
    pub path: String,
    pub content: String,
    pub version_token: VersionToken,
    /// Transport encoding the content arrived in.
    pub encoding: String,
}

/// A successfully created commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub commit_id: ObjectId,
    pub url: String,
}

/// Outcome of a single-file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    /// Token the file now carries; pass it to the next update.
    pub version_token: VersionToken,
    pub commit: CommitResult,
}

/// Path/blob pair overlaid onto a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOverlayEntry {
    pub path: String,
    pub blob_id: ObjectId,
}
