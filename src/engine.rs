//! Document-level operations over a remote store and the draft cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::assets::{self, StagedAsset, StagedImage};
use crate::commit::{BatchFile, Committer, DEFAULT_BLOB_CONCURRENCY};
use crate::error::EngineError;
use crate::frontmatter::{self, Metadata};
use crate::remote::{
    list_tree_recursive, CommitResult, RemoteError, RemoteStore, TreeEntry, VersionToken,
};
use crate::store::{Draft, DraftCache, LocalStore};

/// Tunables for an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub branch: String,
    pub content_dirs: Vec<String>,
    pub assets_dir: String,
    pub autosave_delay: Duration,
    pub list_concurrency: usize,
    pub blob_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            content_dirs: vec![
                "src/content/pages".to_string(),
                "src/content/posts".to_string(),
            ],
            assets_dir: "public/images".to_string(),
            autosave_delay: Duration::from_millis(1000),
            list_concurrency: 4,
            blob_concurrency: DEFAULT_BLOB_CONCURRENCY,
        }
    }
}

/// A document as loaded for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedDocument {
    pub path: String,
    pub body: String,
    pub metadata: Metadata,
    /// Remote token the next update must present; `None` if the file does
    /// not exist remotely yet.
    pub version_token: Option<VersionToken>,
    /// True if the content came from a local draft.
    pub from_draft: bool,
}

/// A document ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDocument {
    pub path: String,
    pub metadata: Metadata,
    pub body: String,
    pub version_token: Option<VersionToken>,
}

impl StagedDocument {
    pub fn render(&self) -> String {
        frontmatter::serialize_document(&self.metadata, &self.body)
    }
}

pub struct Engine {
    remote: Arc<dyn RemoteStore>,
    drafts: DraftCache,
    committer: Committer,
    options: EngineOptions,
}

impl Engine {
    pub fn new(remote: Arc<dyn RemoteStore>, store: &LocalStore, options: EngineOptions) -> Self {
        let committer =
            Committer::new(remote.clone()).with_blob_concurrency(options.blob_concurrency);
        Self {
            remote,
            drafts: store.drafts(),
            committer,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn drafts(&self) -> &DraftCache {
        &self.drafts
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Loads a document, preferring a saved draft over the remote content.
    ///
    /// The remote file is fetched either way so its version token is known.
    /// With a draft present, a missing or unreachable remote file yields the
    /// draft without a token.
    pub async fn open_document(&self, path: &str) -> Result<OpenedDocument, EngineError> {
        let draft = self.drafts.load(path).await?.filter(Draft::is_saved);

        let snapshot = match self.remote.get_file(path).await {
            Ok(snapshot) => Some(snapshot),
            Err(e @ (RemoteError::NotFound(_) | RemoteError::Transient(_))) if draft.is_some() => {
                tracing::warn!("Opening {} from draft only: {}", path, e);
                None
            }
            Err(e) => return Err(e.into()),
        };
        let version_token = snapshot.as_ref().map(|s| s.version_token.clone());

        if let Some(draft) = draft {
            tracing::debug!("Opened {} from draft saved at {}", path, draft.saved_at);
            return Ok(OpenedDocument {
                path: path.to_string(),
                body: draft.content,
                metadata: draft.metadata,
                version_token,
                from_draft: true,
            });
        }

        let parsed = snapshot
            .map(|s| frontmatter::parse_document(&s.content))
            .unwrap_or_else(|| frontmatter::parse_document(""));

        Ok(OpenedDocument {
            path: path.to_string(),
            body: parsed.body,
            metadata: parsed.metadata,
            version_token,
            from_draft: false,
        })
    }

    /// Wraps raw bytes for inclusion in the next commit.
    pub fn stage_asset(&self, path: &str, bytes: &[u8]) -> StagedAsset {
        StagedAsset::new(path, bytes)
    }

    /// Stages an image under the configured assets directory.
    pub fn stage_image(
        &self,
        original_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<StagedImage, EngineError> {
        assets::stage_image(&self.options.assets_dir, original_name, mime, bytes, Utc::now())
            .ok_or_else(|| EngineError::NotAnImage(mime.to_string()))
    }

    /// Publishes a document and its assets as one commit.
    ///
    /// Without assets this is a single file update guarded by the
    /// document's version token. With assets, the token is checked against
    /// the remote first and everything goes out in one batch commit, assets
    /// before the document. The draft is cleared on success.
    pub async fn publish(
        &self,
        document: &StagedDocument,
        assets: &[StagedAsset],
        message: &str,
    ) -> Result<CommitResult, EngineError> {
        let content = document.render();

        let result = if assets.is_empty() {
            self.committer
                .publish_one(
                    &document.path,
                    &content,
                    message,
                    document.version_token.as_ref(),
                )
                .await?
                .commit
        } else {
            self.check_version(document).await?;

            let mut files: Vec<BatchFile> = assets.iter().map(StagedAsset::to_batch_file).collect();
            files.push(BatchFile::from_text(document.path.clone(), &content));
            self.committer
                .commit_batch(&self.options.branch, message, &files)
                .await?
        };

        if let Err(e) = self.drafts.clear(&document.path).await {
            tracing::warn!("Published {} but could not clear its draft: {}", document.path, e);
        }

        Ok(result)
    }

    /// Fails with a conflict unless the remote token of the document still
    /// matches the one it was opened with.
    async fn check_version(&self, document: &StagedDocument) -> Result<(), EngineError> {
        let current = match self.remote.get_file(&document.path).await {
            Ok(snapshot) => Some(snapshot.version_token),
            Err(RemoteError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        if current != document.version_token {
            tracing::warn!("Stale version of {}; not published", document.path);
            return Err(RemoteError::Conflict(format!(
                "{} changed on the remote",
                document.path
            ))
            .into());
        }
        Ok(())
    }

    /// Current remote token of `path`.
    pub async fn fetch_version_token(&self, path: &str) -> Result<VersionToken, EngineError> {
        Ok(self.remote.get_file(path).await?.version_token)
    }

    /// Files under every content directory, in configured order.
    ///
    /// A directory that cannot be listed contributes nothing.
    pub async fn list_documents(&self) -> Vec<TreeEntry> {
        let mut documents = Vec::new();
        for dir in &self.options.content_dirs {
            match list_tree_recursive(self.remote.as_ref(), dir, self.options.list_concurrency)
                .await
            {
                Ok(entries) => documents.extend(entries),
                Err(e) => tracing::warn!("Skipping {}: {}", dir, e),
            }
        }
        documents
    }

    pub async fn save_draft(
        &self,
        path: &str,
        body: &str,
        metadata: &Metadata,
    ) -> Result<Draft, EngineError> {
        let draft = Draft::new(path, body, metadata.clone());
        self.drafts.save(path, &draft).await?;
        Ok(draft)
    }

    pub async fn discard_draft(&self, path: &str) -> Result<(), EngineError> {
        self.drafts.clear(path).await?;
        Ok(())
    }

    /// Deletes a file at its current remote version and drops its draft.
    pub async fn delete_document(&self, path: &str, message: &str) -> Result<(), EngineError> {
        let token = self.fetch_version_token(path).await?;
        self.remote.delete_file(path, &token, message).await?;
        self.drafts.clear(path).await?;
        tracing::info!("Deleted {}", path);
        Ok(())
    }
}

/// Default commit message for a document path.
pub fn default_commit_message(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    format!("Update {}", file_name)
}
