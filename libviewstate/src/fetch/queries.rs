//! Queries issued by the services
//!
//! Each query owns its document, its variables and the checks that turn a
//! well-formed but unusable answer into a domain error.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::FetchPipeline;
use crate::error::FetchError;
use crate::types::{AuthInfo, BlobFile, BlobRequest, User};

pub const BLOB_QUERY: &str = r#"query Blob($repoName: String!, $commitID: String!, $filePath: String!, $disableTimeout: Boolean!) {
    repository(name: $repoName) {
        commit(rev: $commitID) {
            file(path: $filePath) {
                ...BlobFileFields
            }
        }
    }
}

fragment BlobFileFields on File2 {
    content
    richHTML
    highlight(disableTimeout: $disableTimeout) {
        aborted
        html
    }
}"#;

pub const AUTH_INFO_QUERY: &str = r#"query CurrentAuthInfo {
    currentUser {
        UID
        Login
    }
}"#;

pub const USER_QUERY: &str = r#"query User($uid: Int!) {
    user(uid: $uid) {
        UID
        Login
        Betas
        BetaRegistered
    }
}"#;

#[derive(Debug, Deserialize)]
struct BlobData {
    repository: Option<BlobRepository>,
}

#[derive(Debug, Deserialize)]
struct BlobRepository {
    commit: Option<BlobCommit>,
}

#[derive(Debug, Deserialize)]
struct BlobCommit {
    file: Option<BlobFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthInfoData {
    current_user: Option<AuthInfo>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: Option<User>,
}

impl FetchPipeline {
    /// Read one file at one commit.
    ///
    /// `Ok(None)` means the commit exists but has no such file. A missing
    /// repository or commit is [`FetchError::NotFound`]. With
    /// `disable_timeout` set the request waits as long as the server takes.
    pub async fn fetch_blob(&self, request: &BlobRequest) -> Result<Option<BlobFile>, FetchError> {
        request.validate()?;

        let variables = serde_json::to_value(request).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        let mut query = self.request(BLOB_QUERY, variables);
        if request.disable_timeout {
            query = query.with_timeout(None);
        }

        let data: BlobData = self.execute_request(query).await?;
        let commit = data
            .repository
            .and_then(|repository| repository.commit)
            .ok_or_else(|| FetchError::NotFound("Commit not found".to_string()))?;

        debug!(
            repo = %request.repo_name,
            path = %request.file_path,
            found = commit.file.is_some(),
            "Fetched blob"
        );
        Ok(commit.file)
    }

    /// Identity behind `token`. A token that maps to nobody yields an empty
    /// [`AuthInfo`] rather than an error.
    pub async fn fetch_auth_info(&self, token: &str) -> Result<AuthInfo, FetchError> {
        let request = self.request(AUTH_INFO_QUERY, json!({})).with_access_token(token);
        let data: AuthInfoData = self.execute_request(request).await?;
        Ok(data.current_user.unwrap_or_default())
    }

    /// Profile of `uid`, or `None` if the API knows no such user.
    pub async fn fetch_user(&self, uid: u64) -> Result<Option<User>, FetchError> {
        let data: UserData = self.execute(USER_QUERY, json!({ "uid": uid })).await?;
        Ok(data.user)
    }
}
