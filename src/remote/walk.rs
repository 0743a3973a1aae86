//! Recursive directory listing.

use futures::stream::{self, StreamExt, TryStreamExt};

use super::{EntryKind, RemoteError, RemoteStore, TreeEntry};

/// Lists every file below `root`, sorted by path.
///
/// Directories are walked level by level from a worklist; each level is
/// listed with at most `concurrency` requests in flight.
pub async fn list_tree_recursive(
    remote: &dyn RemoteStore,
    root: &str,
    concurrency: usize,
) -> Result<Vec<TreeEntry>, RemoteError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_string()];

    while !pending.is_empty() {
        let level = std::mem::take(&mut pending);
        tracing::debug!("Listing {} director(ies)", level.len());

        let listings: Vec<Vec<TreeEntry>> = stream::iter(level.iter())
            .map(|dir| remote.list_tree(dir))
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        for entry in listings.into_iter().flatten() {
            match entry.kind {
                EntryKind::File => files.push(entry),
                EntryKind::Directory => pending.push(entry.path),
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use crate::repo_address::RepoAddress;

    fn store() -> MemoryStore {
        let store = MemoryStore::new(RepoAddress::new("acme", "site"));
        store.seed_file("src/content/pages/about.md", "about");
        store.seed_file("src/content/pages/team/alice.md", "alice");
        store.seed_file("src/content/pages/team/deep/bob.md", "bob");
        store.seed_file("src/content/posts/hello.md", "hello");
        store.seed_file("README.md", "readme");
        store
    }

    #[tokio::test]
    async fn test_walks_nested_directories() {
        let store = store();
        let files = list_tree_recursive(&store, "src/content/pages", 2)
            .await
            .unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "src/content/pages/about.md",
                "src/content/pages/team/alice.md",
                "src/content/pages/team/deep/bob.md",
            ]
        );
        assert!(files.iter().all(|f| f.kind == EntryKind::File));
    }

    #[tokio::test]
    async fn test_walk_from_root() {
        let store = store();
        let files = list_tree_recursive(&store, "", 1).await.unwrap();
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_root_is_not_found() {
        let store = store();
        let err = list_tree_recursive(&store, "nope", 4).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }
}
