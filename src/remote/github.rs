//! GitHub REST API binding.
//!
//! File operations go through the contents API
//! (`/repos/{owner}/{repo}/contents/{path}`); batch commits use the git
//! data API (`/git/blobs`, `/git/trees`, `/git/commits`, `/git/refs`).
//!
//! Ref updates are sent with `force: false`. The new commit's parent is the
//! head that was read, so GitHub rejects the update as a non-fast-forward
//! (422) whenever the branch has moved, which is reported as a conflict.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{
    CommitResult, EntryKind, ObjectId, PutResult, RemoteError, RemoteFileSnapshot, RemoteStore,
    TreeEntry, TreeOverlayEntry, VersionToken,
};
use crate::repo_address::RepoAddress;
use crate::store::Credential;

/// Default API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";
/// Default web host used for commit links.
pub const GITHUB_WEB_URL: &str = "https://github.com";

const MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Which call produced a response; decides how a 422 is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Read,
    PutFile,
    UpdateRef,
    Other,
}

#[derive(Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct FileResponse {
    #[serde(default)]
    content: String,
    sha: String,
    path: String,
    encoding: String,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct CommitSummary {
    sha: String,
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ShaOnly,
    commit: CommitSummary,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ShaOnly,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
}

/// Remote store backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubStore {
    http: reqwest::Client,
    api_url: String,
    web_url: String,
    address: RepoAddress,
    token: String,
}

impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("api_url", &self.api_url)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl GitHubStore {
    pub fn new(api_url: impl Into<String>, address: RepoAddress, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            web_url: GITHUB_WEB_URL.to_string(),
            address,
            token: token.into(),
        }
    }

    pub fn from_credential(api_url: impl Into<String>, credential: &Credential) -> Self {
        Self::new(api_url, credential.address(), credential.token.clone())
    }

    /// Overrides the host used to build commit links.
    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = web_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn address(&self) -> &RepoAddress {
        &self.address
    }

    fn repo_url(address: &RepoAddress, api_url: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            api_url,
            urlencoding::encode(&address.owner),
            urlencoding::encode(&address.repo)
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let base = format!("{}/contents", Self::repo_url(&self.address, &self.api_url));
        let path = path.trim_matches('/');
        if path.is_empty() {
            return base;
        }
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", base, encoded.join("/"))
    }

    fn git_url(&self, rest: &str) -> String {
        format!("{}/git/{}", Self::repo_url(&self.address, &self.api_url), rest)
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, MEDIA_TYPE)
            .header(USER_AGENT, concat!("loomsync/", env!("CARGO_PKG_VERSION")))
    }

    async fn send(&self, request: RequestBuilder, call: Call, what: &str) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        tracing::debug!("{} -> {}", what, status);

        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(classify(status, call, what, body.message.unwrap_or_default()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        call: Call,
        what: &str,
    ) -> Result<T, RemoteError> {
        self.send(request, call, what)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(format!("{}: {}", what, e)))
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_decode() {
        RemoteError::Protocol(e.to_string())
    } else {
        RemoteError::Transient(e.to_string())
    }
}

fn classify(status: StatusCode, call: Call, what: &str, message: String) -> RemoteError {
    let detail = if message.is_empty() {
        format!("{} ({})", what, status)
    } else {
        format!("{} ({}): {}", what, status, message)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(detail),
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        StatusCode::CONFLICT => RemoteError::Conflict(detail),
        StatusCode::UNPROCESSABLE_ENTITY => match call {
            Call::UpdateRef => RemoteError::Conflict(detail),
            // Creating over an existing file without its sha.
            Call::PutFile if message.contains("sha") => RemoteError::Conflict(detail),
            _ => RemoteError::Validation(detail),
        },
        s if s.is_server_error() => RemoteError::Transient(detail),
        _ if call == Call::Read => RemoteError::Protocol(detail),
        _ => RemoteError::Validation(detail),
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn check_access(&self, address: &RepoAddress, token: &str) -> Result<bool, RemoteError> {
        let url = Self::repo_url(address, &self.api_url);
        let response = self
            .request(Method::GET, &url, token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.is_server_error() {
            return Err(RemoteError::Transient(format!("access check ({})", status)));
        }
        tracing::debug!("Access check for {} returned {}", address, status);
        Ok(false)
    }

    async fn list_tree(&self, path: &str) -> Result<Vec<TreeEntry>, RemoteError> {
        let url = self.contents_url(path);
        let what = format!("list {}", path);
        let value: serde_json::Value = self
            .send_json(self.request(Method::GET, &url, &self.token), Call::Read, &what)
            .await?;

        // A file path answers with a single object rather than a listing.
        if !value.is_array() {
            return Ok(Vec::new());
        }

        let items: Vec<ContentItem> = serde_json::from_value(value)
            .map_err(|e| RemoteError::Protocol(format!("{}: {}", what, e)))?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Directory,
                    _ => return None,
                };
                Some(TreeEntry {
                    name: item.name,
                    path: item.path,
                    version_token: VersionToken::new(item.sha),
                    kind,
                })
            })
            .collect())
    }

    async fn get_file(&self, path: &str) -> Result<RemoteFileSnapshot, RemoteError> {
        let url = self.contents_url(path);
        let what = format!("get {}", path);
        let value: serde_json::Value = self
            .send_json(self.request(Method::GET, &url, &self.token), Call::Read, &what)
            .await?;

        // A directory answers with a listing rather than a single object.
        if value.is_array() {
            return Err(RemoteError::Validation(format!("{}: is a directory", what)));
        }

        let file: FileResponse = serde_json::from_value(value)
            .map_err(|e| RemoteError::Protocol(format!("{}: {}", what, e)))?;

        // Files over 1 MB come back with encoding "none" and no content.
        if file.encoding != "base64" {
            return Err(RemoteError::Validation(format!(
                "{}: content not available through the contents API (encoding '{}')",
                what, file.encoding
            )));
        }

        let bytes = STANDARD
            .decode(file.content.replace(['\n', '\r'], ""))
            .map_err(|e| RemoteError::Protocol(format!("{}: {}", what, e)))?;

        Ok(RemoteFileSnapshot {
            path: file.path,
            content: String::from_utf8_lossy(&bytes).into_owned(),
            version_token: VersionToken::new(file.sha),
            encoding: file.encoding,
        })
    }

    async fn put_file_bytes(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        expected: Option<&VersionToken>,
    ) -> Result<PutResult, RemoteError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
        });
        if let Some(token) = expected {
            body["sha"] = json!(token.as_str());
        }

        let url = self.contents_url(path);
        let response: PutResponse = self
            .send_json(
                self.request(Method::PUT, &url, &self.token).json(&body),
                Call::PutFile,
                &format!("save {}", path),
            )
            .await?;

        let commit_id = ObjectId::new(response.commit.sha);
        let url = response
            .commit
            .html_url
            .unwrap_or_else(|| self.commit_url(&commit_id));

        Ok(PutResult {
            version_token: VersionToken::new(response.content.sha),
            commit: CommitResult { commit_id, url },
        })
    }

    async fn delete_file(
        &self,
        path: &str,
        version_token: &VersionToken,
        message: &str,
    ) -> Result<(), RemoteError> {
        let url = self.contents_url(path);
        let body = json!({ "message": message, "sha": version_token.as_str() });
        self.send(
            self.request(Method::DELETE, &url, &self.token).json(&body),
            Call::PutFile,
            &format!("delete {}", path),
        )
        .await?;
        Ok(())
    }

    async fn create_blob(&self, content_base64: &str) -> Result<ObjectId, RemoteError> {
        let body = json!({ "content": content_base64, "encoding": "base64" });
        let blob: ShaOnly = self
            .send_json(
                self.request(Method::POST, &self.git_url("blobs"), &self.token)
                    .json(&body),
                Call::Other,
                "create blob",
            )
            .await?;
        Ok(ObjectId::new(blob.sha))
    }

    async fn get_ref(&self, branch: &str) -> Result<ObjectId, RemoteError> {
        let url = self.git_url(&format!("ref/heads/{}", branch));
        let reference: RefResponse = self
            .send_json(
                self.request(Method::GET, &url, &self.token),
                Call::Read,
                &format!("read branch {}", branch),
            )
            .await?;
        Ok(ObjectId::new(reference.object.sha))
    }

    async fn get_commit_tree(&self, commit: &ObjectId) -> Result<ObjectId, RemoteError> {
        let url = self.git_url(&format!("commits/{}", commit));
        let response: CommitResponse = self
            .send_json(
                self.request(Method::GET, &url, &self.token),
                Call::Read,
                &format!("read commit {}", commit),
            )
            .await?;
        Ok(ObjectId::new(response.tree.sha))
    }

    async fn create_tree(
        &self,
        base: &ObjectId,
        entries: &[TreeOverlayEntry],
    ) -> Result<ObjectId, RemoteError> {
        let tree: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "path": e.path,
                    "mode": "100644",
                    "type": "blob",
                    "sha": e.blob_id.as_str(),
                })
            })
            .collect();
        let body = json!({ "base_tree": base.as_str(), "tree": tree });

        let created: ShaOnly = self
            .send_json(
                self.request(Method::POST, &self.git_url("trees"), &self.token)
                    .json(&body),
                Call::Other,
                "create tree",
            )
            .await?;
        Ok(ObjectId::new(created.sha))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError> {
        let parents: Vec<&str> = parents.iter().map(ObjectId::as_str).collect();
        let body = json!({ "message": message, "tree": tree.as_str(), "parents": parents });

        let created: ShaOnly = self
            .send_json(
                self.request(Method::POST, &self.git_url("commits"), &self.token)
                    .json(&body),
                Call::Other,
                "create commit",
            )
            .await?;
        Ok(ObjectId::new(created.sha))
    }

    async fn update_ref(
        &self,
        branch: &str,
        new: &ObjectId,
        expected_prior: &ObjectId,
    ) -> Result<(), RemoteError> {
        tracing::debug!("Moving {} from {} to {}", branch, expected_prior, new);
        let url = self.git_url(&format!("refs/heads/{}", branch));
        let body = json!({ "sha": new.as_str(), "force": false });
        self.send(
            self.request(Method::PATCH, &url, &self.token).json(&body),
            Call::UpdateRef,
            &format!("update branch {}", branch),
        )
        .await?;
        Ok(())
    }

    fn commit_url(&self, commit: &ObjectId) -> String {
        format!("{}/{}/commit/{}", self.web_url, self.address, commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GitHubStore {
        GitHubStore::new("https://api.example.com/", RepoAddress::new("acme", "site"), "t0k3n")
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let store = store();
        assert_eq!(
            store.contents_url("src/content/pages/hello world.md"),
            "https://api.example.com/repos/acme/site/contents/src/content/pages/hello%20world.md"
        );
        assert_eq!(
            store.contents_url(""),
            "https://api.example.com/repos/acme/site/contents"
        );
    }

    #[test]
    fn test_git_url() {
        assert_eq!(
            store().git_url("ref/heads/main"),
            "https://api.example.com/repos/acme/site/git/ref/heads/main"
        );
    }

    #[test]
    fn test_commit_url() {
        let store = store().with_web_url("https://git.example.com/");
        assert_eq!(
            store.commit_url(&ObjectId::new("abc")),
            "https://git.example.com/acme/site/commit/abc"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", store());
        assert!(!debug.contains("t0k3n"));
        assert!(debug.contains("acme"));
    }

    #[test]
    fn test_classify_statuses() {
        let c = |status, call, msg: &str| classify(status, call, "op", msg.to_string());

        assert!(matches!(c(StatusCode::UNAUTHORIZED, Call::Read, ""), RemoteError::Auth(_)));
        assert!(matches!(c(StatusCode::FORBIDDEN, Call::Other, ""), RemoteError::Auth(_)));
        assert!(matches!(c(StatusCode::NOT_FOUND, Call::Read, ""), RemoteError::NotFound(_)));
        assert!(matches!(c(StatusCode::CONFLICT, Call::PutFile, ""), RemoteError::Conflict(_)));
        assert!(matches!(
            c(StatusCode::UNPROCESSABLE_ENTITY, Call::UpdateRef, "Update is not a fast forward"),
            RemoteError::Conflict(_)
        ));
        assert!(matches!(
            c(StatusCode::UNPROCESSABLE_ENTITY, Call::PutFile, "\"sha\" wasn't supplied."),
            RemoteError::Conflict(_)
        ));
        assert!(matches!(
            c(StatusCode::UNPROCESSABLE_ENTITY, Call::Other, "bad tree"),
            RemoteError::Validation(_)
        ));
        assert!(matches!(
            c(StatusCode::BAD_GATEWAY, Call::Other, ""),
            RemoteError::Transient(_)
        ));
    }

    #[test]
    fn test_classify_keeps_server_message() {
        let err = classify(StatusCode::CONFLICT, Call::PutFile, "save a.md", "sha mismatch".into());
        assert!(err.to_string().contains("save a.md"));
        assert!(err.to_string().contains("sha mismatch"));
    }
}
