//! Draft caching and atomic publishing for content kept in a git repository.
//!
//! Documents are markdown files with a frontmatter header. Edits are cached
//! locally as drafts until published; publishing writes the document, and
//! any images staged with it, as a single commit guarded by optimistic
//! concurrency checks.

pub mod assets;
pub mod commit;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod frontmatter;
pub mod remote;
pub mod repo_address;
pub mod session;
pub mod store;

pub use commit::{BatchFile, Committer};
pub use config::Config;
pub use editor::EditorSession;
pub use engine::{Engine, EngineOptions, OpenedDocument, StagedDocument};
pub use error::{EngineError, ErrorKind};
pub use frontmatter::{MetaValue, Metadata};
pub use remote::{CommitResult, GitHubStore, MemoryStore, RemoteError, RemoteStore};
pub use repo_address::RepoAddress;
pub use session::Session;
pub use store::{Credential, Draft, LocalStore};
