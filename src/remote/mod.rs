//! Remote content store.
//!
//! The remote is a git-style object graph (blobs, trees, commits, refs)
//! with a file-level read/write layer on top. Two implementations exist:
//!
//! - [`GitHubStore`] talks to the GitHub REST API.
//! - [`MemoryStore`] keeps the whole graph in process.
//!
//! Every operation is a single round trip. Nothing here retries; errors
//! are reported to the caller as a [`RemoteError`].

mod error;
mod github;
mod memory;
mod types;
mod walk;

pub use error::RemoteError;
pub use github::{GitHubStore, GITHUB_API_URL, GITHUB_WEB_URL};
pub use memory::MemoryStore;
pub use types::{
    CommitResult, EntryKind, ObjectId, PutResult, RemoteFileSnapshot, TreeEntry,
    TreeOverlayEntry, VersionToken,
};
pub use walk::list_tree_recursive;

use async_trait::async_trait;

use crate::repo_address::RepoAddress;

/// Operations offered by a remote content store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns true if `token` can read and write `address`.
    async fn check_access(&self, address: &RepoAddress, token: &str) -> Result<bool, RemoteError>;

    /// Lists one directory level. Use [`list_tree_recursive`] for a full walk.
    async fn list_tree(&self, path: &str) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Fetches and decodes a file.
    async fn get_file(&self, path: &str) -> Result<RemoteFileSnapshot, RemoteError>;

    /// Creates (`expected == None`) or updates a file from raw bytes.
    ///
    /// Fails with [`RemoteError::Conflict`] if the remote token differs
    /// from `expected`, including when creating a path that already exists.
    async fn put_file_bytes(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        expected: Option<&VersionToken>,
    ) -> Result<PutResult, RemoteError>;

    /// Creates or updates a text file.
    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: Option<&VersionToken>,
    ) -> Result<PutResult, RemoteError> {
        self.put_file_bytes(path, content.as_bytes(), message, expected)
            .await
    }

    async fn delete_file(
        &self,
        path: &str,
        version_token: &VersionToken,
        message: &str,
    ) -> Result<(), RemoteError>;

    /// Stores base64 content as a blob. Identical content yields the same id.
    async fn create_blob(&self, content_base64: &str) -> Result<ObjectId, RemoteError>;

    /// Returns the commit a branch points at.
    async fn get_ref(&self, branch: &str) -> Result<ObjectId, RemoteError>;

    /// Returns the tree of a commit.
    async fn get_commit_tree(&self, commit: &ObjectId) -> Result<ObjectId, RemoteError>;

    /// Builds a tree from `base` with `entries` added or replaced.
    async fn create_tree(
        &self,
        base: &ObjectId,
        entries: &[TreeOverlayEntry],
    ) -> Result<ObjectId, RemoteError>;

    async fn create_commit(
        &self,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError>;

    /// Moves `branch` to `new`, failing with a conflict unless it still
    /// points at `expected_prior`.
    async fn update_ref(
        &self,
        branch: &str,
        new: &ObjectId,
        expected_prior: &ObjectId,
    ) -> Result<(), RemoteError>;

    /// Browser URL for a commit.
    fn commit_url(&self, commit: &ObjectId) -> String;
}
