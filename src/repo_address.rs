//! Repository address parsing.
//!
//! Accepts either a bare `owner/repo` or any URL whose last two path
//! segments are the owner and repository, e.g.
//! `https://github.com/acme/site.git/` or `git@github.com:acme/site.git`.

use serde::{Deserialize, Serialize};

/// The owner/repository pair a session works against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoAddress {
    pub owner: String,
    pub repo: String,
}

/// Errors from [`RepoAddress::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoAddressError {
    /// The input does not end in `owner/repo`.
    InvalidFormat(String),
}

impl std::fmt::Display for RepoAddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoAddressError::InvalidFormat(input) => write!(
                f,
                "Invalid repo format '{}'. Use owner/repo or a repository URL.",
                input
            ),
        }
    }
}

impl std::error::Error for RepoAddressError {}

impl RepoAddressError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Validation
    }
}

impl RepoAddress {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Resolves a user-supplied repository identifier.
    pub fn resolve(input: &str) -> Result<Self, RepoAddressError> {
        let invalid = || RepoAddressError::InvalidFormat(input.to_string());

        let cleaned = strip_suffixes(input.trim());
        let (rest, repo) = cleaned.rsplit_once('/').ok_or_else(invalid)?;
        // scp-style remotes separate the host from the owner with ':'.
        let owner = rest.rsplit(['/', ':']).next().unwrap_or(rest);

        if owner.is_empty() || repo.is_empty() || owner.contains('@') {
            return Err(invalid());
        }

        Ok(Self::new(owner, repo))
    }

    /// Returns `owner/repo`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl std::str::FromStr for RepoAddress {
    type Err = RepoAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

/// Strips trailing `/` and `.git` in whichever order they appear.
fn strip_suffixes(mut s: &str) -> &str {
    loop {
        let before = s.len();
        s = s.strip_suffix('/').unwrap_or(s);
        s = s.strip_suffix(".git").unwrap_or(s);
        if s.len() == before {
            return s;
        }
    }
}
