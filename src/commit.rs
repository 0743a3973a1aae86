//! Atomic multi-file commits.
//!
//! [`Committer::commit_batch`] turns a set of files into exactly one commit
//! on a branch, or leaves the branch untouched:
//!
//! 1. read the branch head and its tree
//! 2. upload every file as a blob (concurrently, bounded)
//! 3. overlay the blobs onto the head tree
//! 4. commit the new tree with the head as sole parent
//! 5. move the branch, asserting it still points at the head read in 1
//!
//! Failures before step 5 leave only unreferenced objects behind. A conflict
//! in step 5 means another writer moved the branch; the caller has to start
//! over from a fresh head.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::remote::{
    CommitResult, PutResult, RemoteError, RemoteStore, TreeOverlayEntry, VersionToken,
};

/// Default number of blob uploads in flight.
pub const DEFAULT_BLOB_CONCURRENCY: usize = 4;

/// A file staged for a batch commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: String,
    pub content_base64: String,
}

impl BatchFile {
    pub fn new(path: impl Into<String>, content_base64: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_base64: content_base64.into(),
        }
    }

    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        use base64::{engine::general_purpose::STANDARD, Engine};
        Self::new(path, STANDARD.encode(text.as_bytes()))
    }
}

/// Publishes files to a remote store.
#[derive(Clone)]
pub struct Committer {
    remote: Arc<dyn RemoteStore>,
    blob_concurrency: usize,
}

impl Committer {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            blob_concurrency: DEFAULT_BLOB_CONCURRENCY,
        }
    }

    pub fn with_blob_concurrency(mut self, concurrency: usize) -> Self {
        self.blob_concurrency = concurrency.max(1);
        self
    }

    /// Commits `files` to `branch` as one commit.
    pub async fn commit_batch(
        &self,
        branch: &str,
        message: &str,
        files: &[BatchFile],
    ) -> Result<CommitResult, RemoteError> {
        if files.is_empty() {
            return Err(RemoteError::EmptyBatch);
        }

        let head = self.remote.get_ref(branch).await?;
        let base_tree = self.remote.get_commit_tree(&head).await?;
        tracing::debug!("Batch of {} file(s) on {} at {}", files.len(), branch, head);

        let entries: Vec<TreeOverlayEntry> = stream::iter(files)
            .map(|file| async move {
                let blob_id = self
                    .remote
                    .create_blob(&file.content_base64)
                    .await
                    .map_err(|e| blob_error(&file.path, e))?;
                tracing::debug!("Blob {} for {}", blob_id, file.path);
                Ok::<_, RemoteError>(TreeOverlayEntry {
                    path: file.path.clone(),
                    blob_id,
                })
            })
            .buffered(self.blob_concurrency)
            .try_collect()
            .await?;

        let tree = self.remote.create_tree(&base_tree, &entries).await?;
        tracing::debug!("Tree {}", tree);

        let commit = self
            .remote
            .create_commit(message, &tree, std::slice::from_ref(&head))
            .await?;
        tracing::debug!("Commit {}", commit);

        if let Err(e) = self.remote.update_ref(branch, &commit, &head).await {
            if e.is_conflict() {
                tracing::warn!("Branch {} moved since {}; batch not applied", branch, head);
            }
            return Err(e);
        }

        tracing::info!("Committed {} file(s) to {} as {}", files.len(), branch, commit);
        Ok(CommitResult {
            url: self.remote.commit_url(&commit),
            commit_id: commit,
        })
    }

    /// Creates or updates a single file in one call.
    pub async fn publish_one(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: Option<&VersionToken>,
    ) -> Result<PutResult, RemoteError> {
        let result = self.remote.put_file(path, content, message, expected).await;
        match &result {
            Ok(put) => tracing::info!("Published {} as {}", path, put.commit.commit_id),
            Err(e) if e.is_conflict() => tracing::warn!("Stale version of {}; not published", path),
            Err(_) => {}
        }
        result
    }
}

/// Adds the file path to a blob failure while keeping its kind.
fn blob_error(path: &str, e: RemoteError) -> RemoteError {
    let context = |msg: String| format!("blob for {}: {}", path, msg);
    match e {
        RemoteError::Auth(m) => RemoteError::Auth(context(m)),
        RemoteError::NotFound(m) => RemoteError::NotFound(context(m)),
        RemoteError::Conflict(m) => RemoteError::Conflict(context(m)),
        RemoteError::Validation(m) => RemoteError::Validation(context(m)),
        RemoteError::Transient(m) => RemoteError::Transient(context(m)),
        RemoteError::Protocol(m) => RemoteError::Protocol(context(m)),
        RemoteError::EmptyBatch => RemoteError::EmptyBatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use crate::repo_address::RepoAddress;

    fn setup() -> (Arc<MemoryStore>, Committer) {
        let store = Arc::new(MemoryStore::new(RepoAddress::new("acme", "site")));
        store.seed_file("README.md", "readme");
        store.seed_file("src/content/pages/index.md", "index");
        let committer = Committer::new(store.clone()).with_blob_concurrency(2);
        (store, committer)
    }

    #[tokio::test]
    async fn test_batch_is_one_commit_with_all_paths() {
        let (store, committer) = setup();
        let before = store.commits_created();
        let head = store.head("main").unwrap();

        let files = vec![
            BatchFile::from_text("src/content/pages/a.md", "a"),
            BatchFile::from_text("src/content/pages/b.md", "b"),
            BatchFile::from_text("public/images/c.png", "c"),
        ];
        let result = committer.commit_batch("main", "Add three", &files).await.unwrap();

        assert_eq!(store.commits_created(), before + 1);
        assert_eq!(store.head("main"), Some(result.commit_id.clone()));
        assert_eq!(store.parents_of(&result.commit_id), vec![head]);
        assert_eq!(store.message_of(&result.commit_id).as_deref(), Some("Add three"));

        let mut changed = store.changed_paths(&result.commit_id);
        changed.sort();
        assert_eq!(
            changed,
            vec!["public/images/c.png", "src/content/pages/a.md", "src/content/pages/b.md"]
        );

        let paths = store.paths_at(&result.commit_id);
        assert!(paths.contains(&"README.md".to_string()));
        assert!(paths.contains(&"src/content/pages/index.md".to_string()));
        assert_eq!(paths.len(), 5);
        assert_eq!(result.url, store.commit_url(&result.commit_id));
    }

    #[tokio::test]
    async fn test_empty_batch_fails_before_any_call() {
        let (store, committer) = setup();
        let before = store.commits_created();

        let err = committer.commit_batch("main", "Nothing", &[]).await.unwrap_err();
        assert_eq!(err, RemoteError::EmptyBatch);
        assert_eq!(store.commits_created(), before);
    }

    #[tokio::test]
    async fn test_blob_failure_leaves_ref_unchanged() {
        let (store, committer) = setup();
        let head = store.head("main").unwrap();
        store.fail_blobs_after(1);

        let files = vec![
            BatchFile::from_text("a.md", "a"),
            BatchFile::from_text("b.md", "b"),
        ];
        let err = committer.commit_batch("main", "Partial", &files).await.unwrap_err();

        assert!(matches!(err, RemoteError::Transient(_)));
        assert_eq!(store.head("main"), Some(head));
        assert!(store.read_file("a.md").is_none());
    }

    #[tokio::test]
    async fn test_moved_branch_is_conflict() {
        let (store, committer) = setup();

        // Another writer lands a commit between our head read and ref update.
        let head = store.get_ref("main").await.unwrap();
        let tree = store.get_commit_tree(&head).await.unwrap();
        store.seed_file("other.md", "other");
        let commit = store.create_commit("Ours", &tree, &[head.clone()]).await.unwrap();
        let err = store.update_ref("main", &commit, &head).await.unwrap_err();
        assert!(err.is_conflict());

        // A fresh run from the new head succeeds.
        let files = vec![BatchFile::from_text("a.md", "a")];
        committer.commit_batch("main", "Retry", &files).await.unwrap();
        assert_eq!(store.read_file("other.md").as_deref(), Some(&b"other"[..]));
        assert_eq!(store.read_file("a.md").as_deref(), Some(&b"a"[..]));
    }

    #[tokio::test]
    async fn test_unknown_branch_is_not_found() {
        let (_store, committer) = setup();
        let files = vec![BatchFile::from_text("a.md", "a")];
        let err = committer.commit_batch("gone", "x", &files).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_publish_one_with_stale_token_is_conflict() {
        let (store, committer) = setup();
        let stale = store.seed_file("pages/about.md", "v1");
        store.seed_file("pages/about.md", "v2");

        let err = committer
            .publish_one("pages/about.md", "mine", "Update about.md", Some(&stale))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.read_file("pages/about.md").as_deref(), Some(&b"v2"[..]));
    }

    #[tokio::test]
    async fn test_publish_one_returns_new_token() {
        let (store, committer) = setup();
        let token = store.seed_file("pages/about.md", "v1");

        let put = committer
            .publish_one("pages/about.md", "v2", "Update about.md", Some(&token))
            .await
            .unwrap();

        assert_ne!(put.version_token, token);
        let snapshot = store.get_file("pages/about.md").await.unwrap();
        assert_eq!(snapshot.version_token, put.version_token);
        assert_eq!(snapshot.content, "v2");
    }
}
