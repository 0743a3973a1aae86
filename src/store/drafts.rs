use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{KvStore, StoreError};
use crate::frontmatter::Metadata;

const DRAFT_PREFIX: &str = "draft:";

/// Unpublished edit of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub path: String,
    /// Document body, without the frontmatter header
    pub content: String,
    pub metadata: Metadata,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(path: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            metadata,
            saved_at: Utc::now(),
        }
    }

    /// A draft with no save time (epoch or earlier) is ignored on open.
    pub fn is_saved(&self) -> bool {
        self.saved_at.timestamp_millis() > 0
    }
}

fn draft_key(path: &str) -> String {
    format!("{}{}", DRAFT_PREFIX, path)
}

/// One draft slot per document path.
#[derive(Clone, Debug)]
pub struct DraftCache {
    kv: KvStore,
}

impl DraftCache {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Stores `draft` under `path`, overwriting what was there.
    pub async fn save(&self, path: &str, draft: &Draft) -> Result<(), StoreError> {
        self.kv.put(&draft_key(path), draft).await?;
        tracing::debug!("Saved draft for {}", path);
        Ok(())
    }

    pub async fn load(&self, path: &str) -> Result<Option<Draft>, StoreError> {
        self.kv.get(&draft_key(path)).await
    }

    pub async fn clear(&self, path: &str) -> Result<(), StoreError> {
        if self.kv.delete(&draft_key(path)).await? {
            tracing::debug!("Cleared draft for {}", path);
        }
        Ok(())
    }

    /// Paths with a stored draft, sorted.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let keys = self.kv.keys_with_prefix(DRAFT_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(DRAFT_PREFIX).map(str::to_string))
            .collect())
    }
}
