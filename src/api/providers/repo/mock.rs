//! In-memory source host for tests.
//!
//! Models just enough of a git host to exercise the release path: branch refs,
//! commits with parents, blobs, trees, tags, canned comparisons, and pull
//! requests. Every call is recorded and any operation can be made to fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    ComparedCommit, GitCommit, GitRef, NewCommit, NewPullRequest, PullRequest, SourceHost, Tag,
    TreeEntry,
};
use crate::api::error::ApiError;

const PROVIDER_NAME: &str = "mock";

/// A recorded call: operation name plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: &'static str,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MockCommitObject {
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub message: String,
}

#[derive(Debug, Default)]
struct MockRepo {
    default_branch: String,
    /// branch -> commit sha
    refs: HashMap<String, String>,
    commits: HashMap<String, MockCommitObject>,
    /// (branch, path) -> content
    files: HashMap<(String, String), Vec<u8>>,
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, Vec<TreeEntry>>,
    tags: Vec<Tag>,
    /// (base, head) -> commits, oldest first
    comparisons: HashMap<(String, String), Vec<ComparedCommit>>,
    pull_requests: Vec<NewPullRequest>,
    failures: HashMap<&'static str, ApiError>,
    /// When set, the target branch is moved to this sha right before the
    /// next `update_ref`, as if another writer got there first.
    interference: Option<String>,
    next_id: u64,
}

impl MockRepo {
    fn mint(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}{:04}", self.next_id)
    }
}

/// Mock source host for testing
#[derive(Clone)]
pub struct MockSourceHost {
    repo: Arc<Mutex<MockRepo>>,
    /// Record of calls made
    pub call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockSourceHost {
    fn default() -> Self {
        Self::new("main")
    }
}

impl MockSourceHost {
    /// A repository with a single root commit on `default_branch`
    pub fn new(default_branch: &str) -> Self {
        let mock = Self {
            repo: Arc::new(Mutex::new(MockRepo {
                default_branch: default_branch.to_string(),
                ..MockRepo::default()
            })),
            call_log: Arc::new(Mutex::new(Vec::new())),
        };
        mock.add_branch(default_branch);
        mock
    }

    /// Add a branch with its own root commit. Returns the commit sha.
    pub fn add_branch(&self, branch: &str) -> String {
        let mut repo = self.repo.lock().unwrap();
        let sha = repo.mint("commit");
        let tree_sha = repo.mint("tree");
        repo.commits.insert(
            sha.clone(),
            MockCommitObject {
                tree_sha,
                parents: Vec::new(),
                message: format!("Initial commit on {branch}"),
            },
        );
        repo.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    pub fn add_file(&self, branch: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.repo
            .lock()
            .unwrap()
            .files
            .insert((branch.to_string(), path.to_string()), content.into());
    }

    /// Tags are listed in the order added; add the most recent first.
    pub fn add_tag(&self, name: &str, commit_sha: &str) {
        self.repo.lock().unwrap().tags.push(Tag {
            name: name.to_string(),
            commit_sha: commit_sha.to_string(),
        });
    }

    pub fn set_comparison(&self, base: &str, head: &str, commits: Vec<ComparedCommit>) {
        self.repo
            .lock()
            .unwrap()
            .comparisons
            .insert((base.to_string(), head.to_string()), commits);
    }

    /// Make every later call to `operation` fail with `error`.
    pub fn fail_with(&self, operation: &'static str, error: ApiError) {
        self.repo.lock().unwrap().failures.insert(operation, error);
    }

    /// Move the updated branch to `sha` just before the next `update_ref`.
    pub fn interfere_before_update(&self, sha: &str) {
        self.repo.lock().unwrap().interference = Some(sha.to_string());
    }

    pub fn ref_sha(&self, branch: &str) -> Option<String> {
        self.repo.lock().unwrap().refs.get(branch).cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<MockCommitObject> {
        self.repo.lock().unwrap().commits.get(sha).cloned()
    }

    pub fn blob(&self, sha: &str) -> Option<Vec<u8>> {
        self.repo.lock().unwrap().blobs.get(sha).cloned()
    }

    pub fn tree(&self, sha: &str) -> Option<Vec<TreeEntry>> {
        self.repo.lock().unwrap().trees.get(sha).cloned()
    }

    pub fn branches(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repo.lock().unwrap().refs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn pull_requests(&self) -> Vec<NewPullRequest> {
        self.repo.lock().unwrap().pull_requests.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Operation names in call order
    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }

    pub fn was_called(&self, operation: &str) -> bool {
        self.calls().iter().any(|c| c.operation == operation)
    }

    fn record(&self, operation: &'static str, args: &[&str]) -> Result<(), ApiError> {
        self.call_log.lock().unwrap().push(MockCall {
            operation,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        match self.repo.lock().unwrap().failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceHost for MockSourceHost {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn compare_url(&self, base: &str, head: &str) -> String {
        format!("https://git.example.com/acme/app/compare/{base}...{head}")
    }

    async fn default_branch(&self) -> Result<String, ApiError> {
        self.record("default_branch", &[])?;
        Ok(self.repo.lock().unwrap().default_branch.clone())
    }

    async fn list_branches(&self) -> Result<Vec<String>, ApiError> {
        self.record("list_branches", &[])?;
        Ok(self.branches())
    }

    async fn download_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ApiError> {
        self.record("download_file", &[branch, path])?;
        self.repo
            .lock()
            .unwrap()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::not_found(PROVIDER_NAME, format!("{branch}:{path}")))
    }

    async fn get_ref(&self, branch: &str) -> Result<Option<GitRef>, ApiError> {
        self.record("get_ref", &[branch])?;
        Ok(self.ref_sha(branch).map(|sha| GitRef {
            branch: branch.to_string(),
            sha,
        }))
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<GitRef, ApiError> {
        self.record("create_ref", &[branch, sha])?;
        let mut repo = self.repo.lock().unwrap();
        if repo.refs.contains_key(branch) {
            return Err(ApiError::http(PROVIDER_NAME, 422, "Reference already exists"));
        }
        if !repo.commits.contains_key(sha) {
            return Err(ApiError::http(PROVIDER_NAME, 422, "Object does not exist"));
        }
        repo.refs.insert(branch.to_string(), sha.to_string());
        Ok(GitRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
        })
    }

    async fn get_commit(&self, sha: &str) -> Result<GitCommit, ApiError> {
        self.record("get_commit", &[sha])?;
        let repo = self.repo.lock().unwrap();
        let commit = repo
            .commits
            .get(sha)
            .ok_or_else(|| ApiError::not_found(PROVIDER_NAME, format!("commit {sha}")))?;
        Ok(GitCommit {
            sha: sha.to_string(),
            tree_sha: commit.tree_sha.clone(),
        })
    }

    async fn create_blob(&self, content: &[u8]) -> Result<String, ApiError> {
        self.record("create_blob", &[])?;
        let mut repo = self.repo.lock().unwrap();
        let sha = repo.mint("blob");
        repo.blobs.insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ApiError> {
        self.record("create_tree", &[base_tree])?;
        let mut repo = self.repo.lock().unwrap();
        let sha = repo.mint("tree");
        repo.trees.insert(sha.clone(), entries.to_vec());
        Ok(sha)
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ApiError> {
        self.record("create_commit", &[&commit.tree_sha])?;
        let mut repo = self.repo.lock().unwrap();
        let sha = repo.mint("commit");
        repo.commits.insert(
            sha.clone(),
            MockCommitObject {
                tree_sha: commit.tree_sha.clone(),
                parents: commit.parents.clone(),
                message: commit.message.clone(),
            },
        );
        Ok(sha)
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<GitRef, ApiError> {
        self.record("update_ref", &[branch, sha])?;
        let mut repo = self.repo.lock().unwrap();
        if let Some(moved_to) = repo.interference.take() {
            repo.refs.insert(branch.to_string(), moved_to);
        }
        let current = repo
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| ApiError::http(PROVIDER_NAME, 422, "Reference does not exist"))?;
        let parents = repo
            .commits
            .get(sha)
            .map(|c| c.parents.clone())
            .ok_or_else(|| ApiError::http(PROVIDER_NAME, 422, "Object does not exist"))?;
        if !force && !parents.contains(&current) {
            return Err(ApiError::http(
                PROVIDER_NAME,
                422,
                "Update is not a fast forward",
            ));
        }
        repo.refs.insert(branch.to_string(), sha.to_string());
        Ok(GitRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
        })
    }

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ApiError> {
        self.record("create_pull_request", &[&request.head, &request.base])?;
        let mut repo = self.repo.lock().unwrap();
        repo.pull_requests.push(request.clone());
        let number = repo.pull_requests.len() as u64;
        Ok(PullRequest {
            number,
            html_url: format!("https://git.example.com/acme/app/pull/{number}"),
        })
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.record("list_tags", &[])?;
        Ok(self.repo.lock().unwrap().tags.clone())
    }

    async fn compare_commits(
        &self,
        base: &str,
        head: &str,
    ) -> Result<Vec<ComparedCommit>, ApiError> {
        self.record("compare_commits", &[base, head])?;
        self.repo
            .lock()
            .unwrap()
            .comparisons
            .get(&(base.to_string(), head.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::not_found(PROVIDER_NAME, format!("{base}...{head}")))
    }
}
