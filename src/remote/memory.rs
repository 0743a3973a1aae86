//! In-process remote store.
//!
//! Holds a complete object graph in memory:
//!
//! ```text
//! blobs:   id -> bytes
//! trees:   id -> { full path -> blob id }
//! commits: id -> { tree, parents, message }
//! refs:    branch -> commit id
//! ```
//!
//! Object ids are sha256 digests over a `"<kind> <len>\0"` header plus the
//! object body, so identical content always maps to the same id. File-level
//! writes behave like a hosted contents API: each put or delete becomes its
//! own commit on the default branch.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

use super::{
    CommitResult, EntryKind, ObjectId, PutResult, RemoteError, RemoteFileSnapshot, RemoteStore,
    TreeEntry, TreeOverlayEntry, VersionToken,
};
use crate::repo_address::RepoAddress;

type Tree = BTreeMap<String, ObjectId>;

#[derive(Debug, Clone)]
struct CommitObject {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    message: String,
}

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<ObjectId, Vec<u8>>,
    trees: HashMap<ObjectId, Tree>,
    commits: HashMap<ObjectId, CommitObject>,
    refs: HashMap<String, ObjectId>,
    /// Tokens granted access; `None` grants everyone.
    allowed_tokens: Option<HashSet<String>>,
    /// Remaining successful blob creations before every further one fails.
    blob_budget: Option<usize>,
    commits_created: usize,
}

/// A remote store that lives entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    address: RepoAddress,
    default_branch: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates a repository with one empty commit on `main`.
    pub fn new(address: RepoAddress) -> Self {
        Self::with_branch(address, "main")
    }

    pub fn with_branch(address: RepoAddress, branch: &str) -> Self {
        let mut state = State::default();
        let tree = state.put_tree(Tree::new());
        let root = state.put_commit("Initial commit", tree, Vec::new());
        state.refs.insert(branch.to_string(), root);

        Self {
            address,
            default_branch: branch.to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn address(&self) -> &RepoAddress {
        &self.address
    }

    /// Restricts access to the listed tokens.
    pub fn allow_tokens<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().allowed_tokens = Some(tokens.into_iter().map(Into::into).collect());
    }

    /// Lets the next `n` blob creations succeed and fails every one after.
    pub fn fail_blobs_after(&self, n: usize) {
        self.state().blob_budget = Some(n);
    }

    /// Writes a file straight to the default branch.
    pub fn seed_file(&self, path: &str, content: impl AsRef<[u8]>) -> VersionToken {
        let mut state = self.state();
        let head = state.refs[&self.default_branch].clone();
        let mut tree = state.tree_of(&head).cloned().unwrap_or_default();
        let blob = state.put_blob(content.as_ref().to_vec());
        tree.insert(path.to_string(), blob.clone());
        let tree_id = state.put_tree(tree);
        let commit = state.put_commit(&format!("Seed {}", path), tree_id, vec![head]);
        state.refs.insert(self.default_branch.clone(), commit);
        VersionToken::new(blob.as_str())
    }

    /// Head commit of `branch`, if the branch exists.
    pub fn head(&self, branch: &str) -> Option<ObjectId> {
        self.state().refs.get(branch).cloned()
    }

    /// Total commits created, counting the initial one and seeds.
    pub fn commits_created(&self) -> usize {
        self.state().commits_created
    }

    /// Raw bytes of `path` on the default branch.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state();
        let head = state.refs.get(&self.default_branch)?;
        let blob = state.tree_of(head)?.get(path)?;
        state.blobs.get(blob).cloned()
    }

    /// Every file path in the tree of `commit`.
    pub fn paths_at(&self, commit: &ObjectId) -> Vec<String> {
        let state = self.state();
        state
            .tree_of(commit)
            .map(|tree| tree.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Paths whose content differs between a commit and its first parent.
    pub fn changed_paths(&self, commit: &ObjectId) -> Vec<String> {
        let state = self.state();
        let Some(obj) = state.commits.get(commit) else {
            return Vec::new();
        };
        let empty = Tree::new();
        let after = state.trees.get(&obj.tree).unwrap_or(&empty);
        let before = obj
            .parents
            .first()
            .and_then(|p| state.tree_of(p))
            .unwrap_or(&empty);

        let all: BTreeSet<&String> = after.keys().chain(before.keys()).collect();
        all.into_iter()
            .filter(|path| after.get(*path) != before.get(*path))
            .cloned()
            .collect()
    }

    /// Parents of `commit`.
    pub fn parents_of(&self, commit: &ObjectId) -> Vec<ObjectId> {
        self.state()
            .commits
            .get(commit)
            .map(|c| c.parents.clone())
            .unwrap_or_default()
    }

    /// Message of `commit`.
    pub fn message_of(&self, commit: &ObjectId) -> Option<String> {
        self.state().commits.get(commit).map(|c| c.message.clone())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit_file_change(
        &self,
        state: &mut State,
        path: &str,
        blob: Option<ObjectId>,
        message: &str,
    ) -> Result<ObjectId, RemoteError> {
        let head = state
            .refs
            .get(&self.default_branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", self.default_branch)))?;
        let mut tree = state.tree_of(&head).cloned().unwrap_or_default();
        match blob {
            Some(blob) => tree.insert(path.to_string(), blob),
            None => tree.remove(path),
        };
        let tree_id = state.put_tree(tree);
        let commit = state.put_commit(message, tree_id, vec![head]);
        state
            .refs
            .insert(self.default_branch.clone(), commit.clone());
        Ok(commit)
    }

    fn head_tree(&self, state: &State) -> Result<Tree, RemoteError> {
        let head = state
            .refs
            .get(&self.default_branch)
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", self.default_branch)))?;
        Ok(state.tree_of(head).cloned().unwrap_or_default())
    }
}

impl State {
    fn put_blob(&mut self, content: Vec<u8>) -> ObjectId {
        let id = object_id("blob", &content);
        self.blobs.entry(id.clone()).or_insert(content);
        id
    }

    fn put_tree(&mut self, tree: Tree) -> ObjectId {
        let id = object_id("tree", &encode_tree(&tree));
        self.trees.entry(id.clone()).or_insert(tree);
        id
    }

    fn put_commit(&mut self, message: &str, tree: ObjectId, parents: Vec<ObjectId>) -> ObjectId {
        let mut body = format!("tree {}\n", tree);
        for parent in &parents {
            body.push_str(&format!("parent {}\n", parent));
        }
        // Sequence number stands in for the author timestamp.
        body.push_str(&format!("seq {}\n\n{}", self.commits_created, message));

        let id = object_id("commit", body.as_bytes());
        self.commits.insert(
            id.clone(),
            CommitObject {
                tree,
                parents,
                message: message.to_string(),
            },
        );
        self.commits_created += 1;
        id
    }

    fn tree_of(&self, commit: &ObjectId) -> Option<&Tree> {
        let commit = self.commits.get(commit)?;
        self.trees.get(&commit.tree)
    }
}

fn object_id(kind: &str, body: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(format!("{} {}\0", kind, body.len()).as_bytes());
    hasher.update(body);
    ObjectId::new(format!("{:x}", hasher.finalize()))
}

fn encode_tree(tree: &Tree) -> Vec<u8> {
    let mut out = Vec::new();
    for (path, blob) in tree {
        out.extend_from_slice(path.as_bytes());
        out.push(0);
        out.extend_from_slice(blob.as_str().as_bytes());
        out.push(b'\n');
    }
    out
}

fn token_of(blob: &ObjectId) -> VersionToken {
    VersionToken::new(blob.as_str())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn check_access(&self, address: &RepoAddress, token: &str) -> Result<bool, RemoteError> {
        if address != &self.address {
            return Ok(false);
        }
        Ok(match &self.state().allowed_tokens {
            Some(tokens) => tokens.contains(token),
            None => true,
        })
    }

    async fn list_tree(&self, path: &str) -> Result<Vec<TreeEntry>, RemoteError> {
        let state = self.state();
        let tree = self.head_tree(&state)?;
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path.trim_end_matches('/'))
        };

        let mut files = Vec::new();
        let mut dirs: BTreeMap<String, Tree> = BTreeMap::new();
        let mut found = path.is_empty();

        for (file_path, blob) in &tree {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            found = true;
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.entry(dir.to_string())
                        .or_default()
                        .insert(file_path.clone(), blob.clone());
                }
                None => files.push(TreeEntry {
                    name: rest.to_string(),
                    path: file_path.clone(),
                    version_token: token_of(blob),
                    kind: EntryKind::File,
                }),
            }
        }

        if !found {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        let mut entries: Vec<TreeEntry> = dirs
            .into_iter()
            .map(|(name, subtree)| TreeEntry {
                path: format!("{}{}", prefix, name),
                version_token: VersionToken::new(object_id("tree", &encode_tree(&subtree)).as_str()),
                name,
                kind: EntryKind::Directory,
            })
            .collect();
        entries.extend(files);
        Ok(entries)
    }

    async fn get_file(&self, path: &str) -> Result<RemoteFileSnapshot, RemoteError> {
        let state = self.state();
        let tree = self.head_tree(&state)?;
        let blob = tree
            .get(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        let bytes = state
            .blobs
            .get(blob)
            .ok_or_else(|| RemoteError::NotFound(format!("blob {}", blob)))?;

        Ok(RemoteFileSnapshot {
            path: path.to_string(),
            content: String::from_utf8_lossy(bytes).into_owned(),
            version_token: token_of(blob),
            encoding: "base64".to_string(),
        })
    }

    async fn put_file_bytes(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        expected: Option<&VersionToken>,
    ) -> Result<PutResult, RemoteError> {
        let mut state = self.state();
        let tree = self.head_tree(&state)?;
        let current = tree.get(path).map(token_of);

        if current.as_ref() != expected {
            return Err(RemoteError::Conflict(match (&current, expected) {
                (Some(_), None) => format!("{} already exists", path),
                (None, Some(_)) => format!("{} no longer exists", path),
                _ => format!("{} does not match the expected version", path),
            }));
        }

        let blob = state.put_blob(content.to_vec());
        let commit = self.commit_file_change(&mut state, path, Some(blob.clone()), message)?;

        Ok(PutResult {
            version_token: token_of(&blob),
            commit: CommitResult {
                url: self.commit_url(&commit),
                commit_id: commit,
            },
        })
    }

    async fn delete_file(
        &self,
        path: &str,
        version_token: &VersionToken,
        message: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        let tree = self.head_tree(&state)?;
        let current = tree
            .get(path)
            .map(token_of)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;

        if &current != version_token {
            return Err(RemoteError::Conflict(format!(
                "{} does not match the expected version",
                path
            )));
        }

        self.commit_file_change(&mut state, path, None, message)?;
        Ok(())
    }

    async fn create_blob(&self, content_base64: &str) -> Result<ObjectId, RemoteError> {
        let bytes = STANDARD
            .decode(content_base64.replace('\n', ""))
            .map_err(|e| RemoteError::Validation(format!("invalid base64 content: {}", e)))?;

        let mut state = self.state();
        if let Some(budget) = state.blob_budget.as_mut() {
            if *budget == 0 {
                return Err(RemoteError::Transient("blob upload failed".to_string()));
            }
            *budget -= 1;
        }
        Ok(state.put_blob(bytes))
    }

    async fn get_ref(&self, branch: &str) -> Result<ObjectId, RemoteError> {
        self.state()
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", branch)))
    }

    async fn get_commit_tree(&self, commit: &ObjectId) -> Result<ObjectId, RemoteError> {
        self.state()
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| RemoteError::NotFound(format!("commit {}", commit)))
    }

    async fn create_tree(
        &self,
        base: &ObjectId,
        entries: &[TreeOverlayEntry],
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state();
        let mut tree = state
            .trees
            .get(base)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("tree {}", base)))?;

        for entry in entries {
            if !state.blobs.contains_key(&entry.blob_id) {
                return Err(RemoteError::Validation(format!(
                    "unknown blob {} for {}",
                    entry.blob_id, entry.path
                )));
            }
            tree.insert(entry.path.clone(), entry.blob_id.clone());
        }

        Ok(state.put_tree(tree))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state();
        if !state.trees.contains_key(tree) {
            return Err(RemoteError::Validation(format!("unknown tree {}", tree)));
        }
        if let Some(missing) = parents.iter().find(|p| !state.commits.contains_key(*p)) {
            return Err(RemoteError::Validation(format!("unknown parent {}", missing)));
        }
        Ok(state.put_commit(message, tree.clone(), parents.to_vec()))
    }

    async fn update_ref(
        &self,
        branch: &str,
        new: &ObjectId,
        expected_prior: &ObjectId,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        let current = state
            .refs
            .get(branch)
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", branch)))?;

        if current != expected_prior {
            return Err(RemoteError::Conflict(format!(
                "update to {} is not a fast forward",
                branch
            )));
        }
        if !state.commits.contains_key(new) {
            return Err(RemoteError::Validation(format!("unknown commit {}", new)));
        }

        state.refs.insert(branch.to_string(), new.clone());
        Ok(())
    }

    fn commit_url(&self, commit: &ObjectId) -> String {
        format!("memory://{}/commit/{}", self.address, commit)
    }
}
