//! Editing state for one open document.
//!
//! An [`EditorSession`] owns the in-memory copy of a document. Every edit
//! marks it dirty and restarts the autosave timer; when the timer fires the
//! current body and metadata are written to the draft cache. Publishing
//! sends the document and any staged assets to the remote and, on success,
//! drops the draft.

mod autosave;

pub use autosave::Autosave;

use std::sync::Arc;

use crate::assets::StagedAsset;
use crate::engine::{default_commit_message, Engine, StagedDocument};
use crate::error::EngineError;
use crate::frontmatter::{self, MetaValue, Metadata};
use crate::remote::{CommitResult, VersionToken};
use crate::store::Draft;

pub struct EditorSession {
    engine: Arc<Engine>,
    autosave: Autosave,
    open: bool,
    path: String,
    version_token: Option<VersionToken>,
    body: String,
    metadata: Metadata,
    dirty: bool,
    from_draft: bool,
    staged_assets: Vec<StagedAsset>,
    commit_message: String,
}

impl EditorSession {
    /// Opens `path` for editing. A saved draft wins over the remote copy.
    pub async fn open(engine: Arc<Engine>, path: &str) -> Result<Self, EngineError> {
        let doc = engine.open_document(path).await?;
        let autosave = Autosave::new(engine.options().autosave_delay);

        Ok(Self {
            engine,
            autosave,
            open: true,
            commit_message: default_commit_message(path),
            path: doc.path,
            version_token: doc.version_token,
            body: doc.body,
            metadata: doc.metadata,
            dirty: false,
            from_draft: doc.from_draft,
            staged_assets: Vec::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn version_token(&self) -> Option<&VersionToken> {
        self.version_token.as_ref()
    }

    /// True when there are edits that have not been published.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn from_draft(&self) -> bool {
        self.from_draft
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn staged_assets(&self) -> &[StagedAsset] {
        &self.staged_assets
    }

    pub fn commit_message(&self) -> &str {
        &self.commit_message
    }

    pub fn set_commit_message(&mut self, message: impl Into<String>) {
        self.commit_message = message.into();
    }

    pub fn title(&self) -> String {
        let file_name = self.path.rsplit('/').next().unwrap_or(&self.path);
        frontmatter::document_title(&self.metadata, file_name)
    }

    /// The full document text as it would be published.
    pub fn render(&self) -> String {
        frontmatter::serialize_document(&self.metadata, &self.body)
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.body = body.into();
        self.touch();
        Ok(())
    }

    pub fn set_field(
        &mut self,
        key: &str,
        value: impl Into<MetaValue>,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;
        if !frontmatter::is_valid_key(key) {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        self.metadata.insert(key, value);
        self.touch();
        Ok(())
    }

    pub fn remove_field(&mut self, key: &str) -> Result<Option<MetaValue>, EngineError> {
        self.ensure_open()?;
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    /// Queues a binary file for the next publish.
    pub fn stage_asset(&mut self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.staged_assets.push(self.engine.stage_asset(path, bytes));
        self.dirty = true;
        Ok(())
    }

    /// Queues an image and appends a markdown reference to the body.
    /// Returns the repository path the image will be written to.
    pub fn stage_image(
        &mut self,
        original_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, EngineError> {
        self.ensure_open()?;
        let staged = self.engine.stage_image(original_name, mime, bytes)?;
        let path = staged.asset.path.clone();

        self.body.push_str(&staged.markdown);
        self.staged_assets.push(staged.asset);
        self.touch();

        tracing::debug!("Staged image {} for {}", path, self.path);
        Ok(path)
    }

    /// Writes the draft immediately instead of waiting for the timer.
    pub async fn save_now(&mut self) -> Result<Draft, EngineError> {
        self.ensure_open()?;
        self.autosave.settle().await;
        self.engine
            .save_draft(&self.path, &self.body, &self.metadata)
            .await
    }

    /// Publishes the document with its staged assets.
    ///
    /// On failure nothing local changes and pending edits are rescheduled
    /// for autosave.
    pub async fn publish(&mut self) -> Result<CommitResult, EngineError> {
        self.ensure_open()?;
        // A draft write still in flight must land before the draft is cleared.
        self.autosave.settle().await;

        let document = StagedDocument {
            path: self.path.clone(),
            metadata: self.metadata.clone(),
            body: self.body.clone(),
            version_token: self.version_token.clone(),
        };

        let result = match self
            .engine
            .publish(&document, &self.staged_assets, &self.commit_message)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                if self.dirty {
                    self.schedule_autosave();
                }
                return Err(e);
            }
        };

        match self.engine.fetch_version_token(&self.path).await {
            Ok(token) => self.version_token = Some(token),
            Err(e) => tracing::warn!(
                "Published {} but could not refresh its version: {}",
                self.path,
                e
            ),
        }

        self.dirty = false;
        self.from_draft = false;
        self.staged_assets.clear();
        tracing::info!("Published {} ({})", self.path, result.commit_id);
        Ok(result)
    }

    /// Ends the session. A pending autosave is dropped, not flushed; the
    /// last saved draft stays as it is.
    pub fn close(&mut self) {
        self.autosave.cancel();
        self.staged_assets.clear();
        self.open = false;
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.open {
            Ok(())
        } else {
            Err(EngineError::DocumentNotOpen)
        }
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.schedule_autosave();
    }

    fn schedule_autosave(&mut self) {
        let drafts = self.engine.drafts().clone();
        let path = self.path.clone();
        let body = self.body.clone();
        let metadata = self.metadata.clone();

        self.autosave.schedule(async move {
            let draft = Draft::new(path.clone(), body, metadata);
            if let Err(e) = drafts.save(&path, &draft).await {
                tracing::warn!("Autosave of {} failed: {}", path, e);
            }
        });
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("path", &self.path)
            .field("open", &self.open)
            .field("dirty", &self.dirty)
            .field("staged_assets", &self.staged_assets.len())
            .finish_non_exhaustive()
    }
}
