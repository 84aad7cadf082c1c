//! Structured cache keys
//!
//! Equality and hashing come from the fields, never from a formatted
//! string, so two requests collide exactly when every parameter that shapes
//! the answer is equal. `Display` is for log lines only.

use std::fmt;

use crate::types::BlobRequest;

/// Key of a blob read: repository, commit, path and the timeout flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub repo_name: String,
    pub commit_id: String,
    pub file_path: String,
    pub disable_timeout: bool,
}

impl From<&BlobRequest> for BlobKey {
    fn from(request: &BlobRequest) -> Self {
        Self {
            repo_name: request.repo_name.clone(),
            commit_id: request.commit_id.clone(),
            file_path: request.file_path.clone(),
            disable_timeout: request.disable_timeout,
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blob:{}:{}:{}:{}",
            self.repo_name, self.commit_id, self.file_path, self.disable_timeout
        )
    }
}

/// Key of an auth-info lookup. Never prints the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthInfoKey {
    token: String,
}

impl AuthInfoKey {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn masked(&self) -> String {
        let tail: String = self
            .token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.token.chars().count() > 8 {
            format!("****{}", tail)
        } else {
            "****".to_string()
        }
    }
}

impl fmt::Debug for AuthInfoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfoKey")
            .field("token", &self.masked())
            .finish()
    }
}

impl fmt::Display for AuthInfoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auth-info:{}", self.masked())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub uid: u64,
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.uid)
    }
}
