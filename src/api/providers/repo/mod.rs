//! Source-hosting provider trait.
//!
//! Everything a release needs from the hosting service: branch and file
//! lookup, the git-data primitives used to build a commit without a working
//! copy, tag and comparison queries for the changelog, and pull requests.

mod github;
mod mock;

pub use github::{GitHubProvider, GITHUB_API_BASE, GITHUB_WEB_BASE};
pub use mock::MockSourceHost;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;

/// Regular, non-executable file.
pub const BLOB_MODE_FILE: &str = "100644";

/// A branch ref and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Branch name without the `refs/heads/` prefix
    pub branch: String,
    pub sha: String,
}

impl GitRef {
    pub fn full_name(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommit {
    pub sha: String,
    pub tree_sha: String,
}

/// One file in a tree being created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    pub blob_sha: String,
}

/// Name and email recorded as the commit author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub message: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub author: CommitAuthor,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    /// Branch holding the change
    pub head: String,
    /// Branch the change is proposed against
    pub base: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub commit_sha: String,
}

/// A commit from a comparison between two refs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparedCommit {
    pub sha: String,
    pub html_url: String,
    pub message: String,
    pub committer_name: String,
    pub author_name: String,
    /// Platform account of the author, when the email maps to one
    pub author_login: Option<String>,
    pub author_html_url: Option<String>,
}

/// Trait for source-hosting providers
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Get the provider name (e.g., "github")
    fn name(&self) -> &str;

    /// Web link comparing two refs, for changelog headers
    fn compare_url(&self, base: &str, head: &str) -> String;

    async fn default_branch(&self) -> Result<String, ApiError>;

    async fn list_branches(&self) -> Result<Vec<String>, ApiError>;

    /// Raw file content at the tip of a branch
    async fn download_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ApiError>;

    /// `Ok(None)` when the branch does not exist
    async fn get_ref(&self, branch: &str) -> Result<Option<GitRef>, ApiError>;

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<GitRef, ApiError>;

    async fn get_commit(&self, sha: &str) -> Result<GitCommit, ApiError>;

    /// Returns the blob SHA
    async fn create_blob(&self, content: &[u8]) -> Result<String, ApiError>;

    /// Returns the tree SHA
    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry])
        -> Result<String, ApiError>;

    /// Returns the commit SHA
    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ApiError>;

    /// Move a branch. Without `force` the update must be a fast forward.
    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<GitRef, ApiError>;

    async fn create_pull_request(&self, request: &NewPullRequest)
        -> Result<PullRequest, ApiError>;

    /// Tags, most recent first
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;

    /// Commits reachable from `head` but not `base`, oldest first
    async fn compare_commits(&self, base: &str, head: &str)
        -> Result<Vec<ComparedCommit>, ApiError>;
}

/// Parse repo string into (owner, repo) tuple
pub fn parse_repo_string(repo_str: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = repo_str.split('/').collect();
    if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
        Some((parts[0], parts[1]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_string() {
        assert_eq!(parse_repo_string("owner/repo"), Some(("owner", "repo")));
        assert_eq!(parse_repo_string("invalid"), None);
        assert_eq!(parse_repo_string("a/b/c"), None);
        assert_eq!(parse_repo_string("/repo"), None);
    }

    #[test]
    fn test_ref_full_name() {
        let r = GitRef {
            branch: "release/1.3.0-43".to_string(),
            sha: "abc".to_string(),
        };
        assert_eq!(r.full_name(), "refs/heads/release/1.3.0-43");
    }
}
