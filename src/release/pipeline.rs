//! Commit Pipeline - turns a file buffer into a branch, a commit, and a pull
//! request using only the host's git-data API.
//!
//! Steps run strictly in order and the first failure stops the rest. Nothing
//! is rolled back: a branch or commit created before the failing step stays
//! behind, and the user restarts the release from scratch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::api::providers::repo::{
    CommitAuthor, GitRef, NewCommit, NewPullRequest, PullRequest, SourceHost, TreeEntry,
    BLOB_MODE_FILE,
};
use crate::api::ApiError;

/// Everything needed to open a release pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Branch the pull request is opened against
    pub target_branch: String,
    /// Branch that receives the commit; created from the target if missing
    pub commit_branch: String,
    pub file_content: Vec<u8>,
    pub file_path: String,
    pub title: String,
    pub commit_message: String,
    pub body: String,
}

pub struct CommitPipeline {
    source: Arc<dyn SourceHost>,
    author: CommitAuthor,
}

impl CommitPipeline {
    pub fn new(source: Arc<dyn SourceHost>, author: CommitAuthor) -> Self {
        Self { source, author }
    }

    /// Run every step and return the created pull request.
    #[instrument(skip(self, request), fields(commit_branch = %request.commit_branch, target = %request.target_branch))]
    pub async fn push(&self, request: &CommitRequest) -> Result<PullRequest, ApiError> {
        let result = self.run(request).await;
        match &result {
            Ok(pr) => info!(pr = %pr.html_url, "Release pull request created"),
            Err(e) => warn!(error = %e, "Commit pipeline stopped"),
        }
        result
    }

    async fn run(&self, request: &CommitRequest) -> Result<PullRequest, ApiError> {
        let branch_ref = self
            .resolve_branch(&request.target_branch, &request.commit_branch)
            .await?;

        debug!(parent = %branch_ref.sha, "Loading parent commit");
        let parent = self.source.get_commit(&branch_ref.sha).await?;

        debug!(path = %request.file_path, bytes = request.file_content.len(), "Creating blob");
        let blob_sha = self.source.create_blob(&request.file_content).await?;

        debug!(base_tree = %parent.tree_sha, "Creating tree");
        let entries = [TreeEntry {
            path: request.file_path.clone(),
            mode: BLOB_MODE_FILE.to_string(),
            blob_sha,
        }];
        let tree_sha = self.source.create_tree(&parent.tree_sha, &entries).await?;

        debug!(tree = %tree_sha, "Creating commit");
        let commit_sha = self
            .source
            .create_commit(&NewCommit {
                message: request.commit_message.clone(),
                tree_sha,
                parents: vec![parent.sha],
                author: self.author.clone(),
                date: Utc::now(),
            })
            .await?;

        // Non-force: rejected if the branch moved since it was resolved.
        debug!(commit = %commit_sha, "Updating ref");
        self.source
            .update_ref(&request.commit_branch, &commit_sha, false)
            .await?;

        debug!("Opening pull request");
        self.source
            .create_pull_request(&NewPullRequest {
                title: request.title.clone(),
                head: request.commit_branch.clone(),
                base: request.target_branch.clone(),
                body: request.body.clone(),
            })
            .await
    }

    /// Existing commit branch is reused; otherwise it is created at the tip of
    /// the target branch.
    async fn resolve_branch(&self, target: &str, commit_branch: &str) -> Result<GitRef, ApiError> {
        debug!("Resolving commit branch");
        if let Some(existing) = self.source.get_ref(commit_branch).await? {
            debug!(sha = %existing.sha, "Reusing existing commit branch");
            return Ok(existing);
        }

        let base = self
            .source
            .get_ref(target)
            .await?
            .ok_or_else(|| ApiError::not_found(self.source.name(), format!("refs/heads/{target}")))?;
        self.source.create_ref(commit_branch, &base.sha).await
    }
}
