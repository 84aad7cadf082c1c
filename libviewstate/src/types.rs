//! Domain types exchanged with the API and held in store state

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Identity behind an access token.
///
/// The API answers with an empty object when the token no longer maps to a
/// user (expired, revoked), so both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(rename = "UID", default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    #[serde(rename = "Login", default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

impl AuthInfo {
    pub fn new(uid: u64, login: impl Into<String>) -> Self {
        Self {
            uid: Some(uid),
            login: Some(login.into()),
        }
    }

    /// No user behind the token.
    pub fn is_empty(&self) -> bool {
        self.uid.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "UID")]
    pub uid: u64,
    #[serde(rename = "Login")]
    pub login: String,
    #[serde(rename = "Betas", default)]
    pub betas: Vec<String>,
    #[serde(rename = "BetaRegistered", default)]
    pub beta_registered: bool,
}

impl User {
    pub fn new(uid: u64, login: impl Into<String>) -> Self {
        Self {
            uid,
            login: login.into(),
            betas: Vec::new(),
            beta_registered: false,
        }
    }
}

/// File contents plus rendered forms, as returned by the Blob query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobFile {
    pub content: String,
    #[serde(rename = "richHTML")]
    pub rich_html: String,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Highlighting gave up (usually on timeout); `html` is plain.
    pub aborted: bool,
    pub html: String,
}

/// Parameters of a blob read. Every field changes the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRequest {
    pub repo_name: String,
    #[serde(rename = "commitID")]
    pub commit_id: String,
    pub file_path: String,
    pub disable_timeout: bool,
}

impl BlobRequest {
    pub fn new(
        repo_name: impl Into<String>,
        commit_id: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            repo_name: repo_name.into(),
            commit_id: commit_id.into(),
            file_path: file_path.into(),
            disable_timeout: false,
        }
    }

    pub fn with_disable_timeout(mut self, disable_timeout: bool) -> Self {
        self.disable_timeout = disable_timeout;
        self
    }

    /// Reject requests that cannot name a file.
    pub fn validate(&self) -> std::result::Result<(), FetchError> {
        if self.repo_name.trim().is_empty() {
            return Err(FetchError::InvalidRequest("repository name cannot be empty".to_string()));
        }
        if self.commit_id.trim().is_empty() {
            return Err(FetchError::InvalidRequest("commit ID cannot be empty".to_string()));
        }
        if self.file_path.trim().is_empty() {
            return Err(FetchError::InvalidRequest("file path cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_info_wire_names() {
        let info: AuthInfo = serde_json::from_value(json!({"UID": 1, "Login": "u"})).unwrap();
        assert_eq!(info, AuthInfo::new(1, "u"));
        assert_eq!(serde_json::to_value(&info).unwrap(), json!({"UID": 1, "Login": "u"}));
    }

    #[test]
    fn test_empty_auth_info_object() {
        let info: AuthInfo = serde_json::from_value(json!({})).unwrap();
        assert!(info.is_empty());
        assert_eq!(serde_json::to_value(&info).unwrap(), json!({}));
    }

    #[test]
    fn test_user_defaults_optional_fields() {
        let user: User = serde_json::from_value(json!({"UID": 7, "Login": "ada"})).unwrap();
        assert_eq!(user, User::new(7, "ada"));
    }

    #[test]
    fn test_blob_file_wire_names() {
        let blob: BlobFile = serde_json::from_value(json!({
            "content": "fn main() {}",
            "richHTML": "",
            "highlight": {"aborted": false, "html": "<pre>fn main() {}</pre>"}
        }))
        .unwrap();
        assert_eq!(blob.content, "fn main() {}");
        assert!(!blob.highlight.aborted);
    }

    #[test]
    fn test_blob_request_variables() {
        let request = BlobRequest::new("repoA", "commit1", "src/lib.rs").with_disable_timeout(true);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "repoName": "repoA",
                "commitID": "commit1",
                "filePath": "src/lib.rs",
                "disableTimeout": true
            })
        );
    }

    #[test]
    fn test_blob_request_validation() {
        assert!(BlobRequest::new("repoA", "commit1", "README.md").validate().is_ok());

        let err = BlobRequest::new(" ", "commit1", "README.md").validate().unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(ref m) if m.contains("repository")));

        assert!(BlobRequest::new("repoA", "", "README.md").validate().is_err());
        assert!(BlobRequest::new("repoA", "commit1", "").validate().is_err());
    }
}
