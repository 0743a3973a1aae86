use serde::{Deserialize, Serialize};

use super::{KvStore, StoreError};
use crate::repo_address::RepoAddress;

const CREDENTIALS_KEY: &str = "credentials";

/// Access token bound to one repository.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub owner: String,
    pub repo: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, address: &RepoAddress) -> Self {
        Self {
            token: token.into(),
            owner: address.owner.clone(),
            repo: address.repo.clone(),
        }
    }

    pub fn address(&self) -> RepoAddress {
        RepoAddress::new(self.owner.clone(), self.repo.clone())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

/// The single persisted credential.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    kv: KvStore,
}

impl CredentialStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn get(&self) -> Result<Option<Credential>, StoreError> {
        self.kv.get(CREDENTIALS_KEY).await
    }

    /// Stores `credential`, replacing any previous one.
    pub async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        self.kv.put(CREDENTIALS_KEY, credential).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.kv.delete(CREDENTIALS_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, CredentialStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (temp_dir, store.credentials())
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let (_dir, creds) = setup().await;
        assert!(creds.get().await.unwrap().is_none());

        creds
            .save(&Credential::new("one", &RepoAddress::new("acme", "site")))
            .await
            .unwrap();
        creds
            .save(&Credential::new("two", &RepoAddress::new("acme", "blog")))
            .await
            .unwrap();

        let stored = creds.get().await.unwrap().unwrap();
        assert_eq!(stored.token, "two");
        assert_eq!(stored.address(), RepoAddress::new("acme", "blog"));
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, creds) = setup().await;
        creds
            .save(&Credential::new("t", &RepoAddress::new("acme", "site")))
            .await
            .unwrap();

        creds.clear().await.unwrap();
        assert!(creds.get().await.unwrap().is_none());

        // Clearing twice is fine.
        creds.clear().await.unwrap();
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("secret-token", &RepoAddress::new("acme", "site"));
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("acme"));
    }
}
