//! Sign-in state.
//!
//! At most one credential is stored. Logging in replaces it, but only once
//! the remote has confirmed the token can reach the repository.

use crate::error::EngineError;
use crate::remote::{RemoteError, RemoteStore};
use crate::repo_address::RepoAddress;
use crate::store::{Credential, CredentialStore};

pub struct Session {
    credentials: CredentialStore,
}

impl Session {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    /// Checks `token` against the repository named by `repo_input` and
    /// stores it on success. A rejected token leaves the stored credential
    /// untouched.
    pub async fn login(
        &self,
        remote: &dyn RemoteStore,
        repo_input: &str,
        token: &str,
    ) -> Result<Credential, EngineError> {
        let address = RepoAddress::resolve(repo_input)?;
        let token = token.trim();

        if token.is_empty() || !remote.check_access(&address, token).await? {
            tracing::warn!("Access check failed for {}", address);
            return Err(
                RemoteError::Auth("Invalid token or no access to repo.".to_string()).into(),
            );
        }

        let credential = Credential::new(token, &address);
        self.credentials.save(&credential).await?;
        tracing::info!("Signed in to {}", address);
        Ok(credential)
    }

    pub async fn logout(&self) -> Result<(), EngineError> {
        self.credentials.clear().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// The stored credential, if any.
    pub async fn restore(&self) -> Result<Option<Credential>, EngineError> {
        Ok(self.credentials.get().await?)
    }

    /// The stored credential, or [`EngineError::NotSignedIn`].
    pub async fn require(&self) -> Result<Credential, EngineError> {
        self.restore().await?.ok_or(EngineError::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::MemoryStore;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Session, MemoryStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let remote = MemoryStore::new(RepoAddress::new("acme", "site"));
        remote.allow_tokens(["good"]);
        (temp_dir, Session::new(store.credentials()), remote)
    }

    #[tokio::test]
    async fn test_login_persists_credential() {
        let (_dir, session, remote) = setup().await;

        let credential = session
            .login(&remote, "https://github.com/acme/site.git", "good")
            .await
            .unwrap();
        assert_eq!(credential.address(), RepoAddress::new("acme", "site"));

        let restored = session.restore().await.unwrap().unwrap();
        assert_eq!(restored, credential);
    }

    #[tokio::test]
    async fn test_bad_token_is_not_persisted() {
        let (_dir, session, remote) = setup().await;
        session.login(&remote, "acme/site", "good").await.unwrap();

        let err = session.login(&remote, "acme/site", "bad").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.to_string().contains("Invalid token or no access to repo."));

        let restored = session.restore().await.unwrap().unwrap();
        assert_eq!(restored.token, "good");
    }

    #[tokio::test]
    async fn test_unknown_repo_is_rejected() {
        let (_dir, session, remote) = setup().await;
        let err = session.login(&remote, "acme/other", "good").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(session.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_address_fails_before_remote() {
        let (_dir, session, remote) = setup().await;
        let err = session.login(&remote, "not-a-repo-string", "good").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_logout_and_require() {
        let (_dir, session, remote) = setup().await;
        session.login(&remote, "acme/site", "good").await.unwrap();
        assert!(session.require().await.is_ok());

        session.logout().await.unwrap();
        assert!(matches!(session.require().await, Err(EngineError::NotSignedIn)));
    }
}
