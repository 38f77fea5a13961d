//! GitHub REST provider implementation

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    parse_repo_string, ComparedCommit, GitCommit, GitRef, NewCommit, NewPullRequest, PullRequest,
    SourceHost, Tag, TreeEntry,
};
use crate::api::error::ApiError;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_WEB_BASE: &str = "https://github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PROVIDER_NAME: &str = "github";
const PER_PAGE: usize = 100;
/// Upper bound on branch pages fetched for the branch prompt
const MAX_BRANCH_PAGES: usize = 10;

/// GitHub API provider operating on a single repository
pub struct GitHubProvider {
    token: String,
    client: reqwest::Client,
    base_url: String,
    web_url: String,
    owner: String,
    repo: String,
}

// Response types for API deserialization
#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    #[serde(rename = "ref")]
    name: String,
    object: ShaObject,
}

#[derive(Debug, Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaObject,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    name: String,
    commit: ShaObject,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    commits: Vec<CompareCommitResponse>,
}

#[derive(Debug, Deserialize)]
struct CompareCommitResponse {
    sha: String,
    html_url: String,
    commit: CompareCommitDetail,
    author: Option<AccountResponse>,
}

#[derive(Debug, Deserialize)]
struct CompareCommitDetail {
    message: String,
    author: Option<SignatureResponse>,
    committer: Option<SignatureResponse>,
}

#[derive(Debug, Deserialize)]
struct SignatureResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    login: String,
    html_url: String,
}

// Request bodies
#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    name: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Debug, Serialize)]
struct CreateBlobRequest {
    content: String,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateTreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeEntryRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct TreeEntryRequest<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateCommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
    author: AuthorRequest<'a>,
}

#[derive(Debug, Serialize)]
struct AuthorRequest<'a> {
    name: &'a str,
    email: &'a str,
    date: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequestRequest<'a> {
    title: &'a str,
    head: String,
    base: &'a str,
    body: &'a str,
    maintainer_can_modify: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedSha {
    sha: String,
}

impl GitHubProvider {
    /// Create a provider for `owner/repo` with the given token
    pub fn new(token: impl Into<String>, repository: &str) -> Result<Self, ApiError> {
        let (owner, repo) = parse_repo_string(repository).ok_or_else(|| {
            ApiError::http(
                PROVIDER_NAME,
                400,
                "Invalid repo format, expected 'owner/repo'",
            )
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("releasebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            token: token.into(),
            client,
            base_url: GITHUB_API_BASE.to_string(),
            web_url: GITHUB_WEB_BASE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Point the provider at a GitHub Enterprise (or test) host
    pub fn with_base_urls(mut self, api: impl Into<String>, web: impl Into<String>) -> Self {
        self.base_url = api.into().trim_end_matches('/').to_string();
        self.web_url = web.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    /// `/repos/{owner}/{repo}` followed by `path`, one URL segment per `/`.
    /// Each segment is percent-encoded on its own so branch names keep their
    /// slashes.
    fn repo_url(&self, path: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::network(PROVIDER_NAME, format!("bad API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::network(PROVIDER_NAME, "API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(
            PROVIDER_NAME,
            status.as_u16(),
            error_message(&body),
            retry_after,
        ))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))
    }
}

/// GitHub error bodies are `{"message": "..."}`; fall back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl SourceHost for GitHubProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn compare_url(&self, base: &str, head: &str) -> String {
        format!(
            "{}/{}/{}/compare/{}...{}",
            self.web_url, self.owner, self.repo, base, head
        )
    }

    async fn default_branch(&self) -> Result<String, ApiError> {
        let url = self.repo_url("")?;
        let repo: RepoResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(repo.default_branch)
    }

    async fn list_branches(&self) -> Result<Vec<String>, ApiError> {
        let mut names = Vec::new();
        for page in 1..=MAX_BRANCH_PAGES {
            let mut url = self.repo_url("branches")?;
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let branches: Vec<BranchResponse> =
                self.send_json(self.request(Method::GET, url)).await?;
            let last_page = branches.len() < PER_PAGE;
            names.extend(branches.into_iter().map(|b| b.name));
            if last_page {
                break;
            }
        }
        Ok(names)
    }

    async fn download_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ApiError> {
        let mut url = self.repo_url(&format!("contents/{path}"))?;
        url.query_pairs_mut().append_pair("ref", branch);

        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Accept", "application/vnd.github.raw+json"),
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get_ref(&self, branch: &str) -> Result<Option<GitRef>, ApiError> {
        let url = self.repo_url(&format!("git/ref/heads/{branch}"))?;
        match self
            .send_json::<RefResponse>(self.request(Method::GET, url))
            .await
        {
            Ok(r) => Ok(Some(GitRef {
                branch: strip_heads(&r.name),
                sha: r.object.sha,
            })),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<GitRef, ApiError> {
        let url = self.repo_url("git/refs")?;
        let body = CreateRefRequest {
            name: format!("refs/heads/{branch}"),
            sha,
        };
        let r: RefResponse = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(GitRef {
            branch: strip_heads(&r.name),
            sha: r.object.sha,
        })
    }

    async fn get_commit(&self, sha: &str) -> Result<GitCommit, ApiError> {
        let url = self.repo_url(&format!("git/commits/{sha}"))?;
        let c: CommitResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(GitCommit {
            sha: c.sha,
            tree_sha: c.tree.sha,
        })
    }

    async fn create_blob(&self, content: &[u8]) -> Result<String, ApiError> {
        let url = self.repo_url("git/blobs")?;
        let body = CreateBlobRequest {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            encoding: "base64",
        };
        let created: CreatedSha = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ApiError> {
        let url = self.repo_url("git/trees")?;
        let body = CreateTreeRequest {
            base_tree,
            tree: entries
                .iter()
                .map(|e| TreeEntryRequest {
                    path: &e.path,
                    mode: &e.mode,
                    kind: "blob",
                    sha: &e.blob_sha,
                })
                .collect(),
        };
        let created: CreatedSha = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ApiError> {
        let url = self.repo_url("git/commits")?;
        let body = CreateCommitRequest {
            message: &commit.message,
            tree: &commit.tree_sha,
            parents: &commit.parents,
            author: AuthorRequest {
                name: &commit.author.name,
                email: &commit.author.email,
                date: commit.date.to_rfc3339(),
            },
        };
        let created: CreatedSha = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(created.sha)
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<GitRef, ApiError> {
        let url = self.repo_url(&format!("git/refs/heads/{branch}"))?;
        let body = UpdateRefRequest { sha, force };
        let r: RefResponse = self
            .send_json(self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(GitRef {
            branch: strip_heads(&r.name),
            sha: r.object.sha,
        })
    }

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ApiError> {
        let url = self.repo_url("pulls")?;
        let body = CreatePullRequestRequest {
            title: &request.title,
            head: format!("{}:{}", self.owner, request.head),
            base: &request.base,
            body: &request.body,
            maintainer_can_modify: true,
        };
        let pr: PullRequestResponse = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(PullRequest {
            number: pr.number,
            html_url: pr.html_url,
        })
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let url = self.repo_url("tags")?;
        let tags: Vec<TagResponse> = self.send_json(self.request(Method::GET, url)).await?;
        Ok(tags
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                commit_sha: t.commit.sha,
            })
            .collect())
    }

    async fn compare_commits(
        &self,
        base: &str,
        head: &str,
    ) -> Result<Vec<ComparedCommit>, ApiError> {
        let url = self.repo_url(&format!("compare/{base}...{head}"))?;
        let comparison: CompareResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(comparison
            .commits
            .into_iter()
            .map(|c| ComparedCommit {
                sha: c.sha,
                html_url: c.html_url,
                message: c.commit.message,
                committer_name: c.commit.committer.map(|s| s.name).unwrap_or_default(),
                author_name: c.commit.author.map(|s| s.name).unwrap_or_default(),
                author_login: c.author.as_ref().map(|a| a.login.clone()),
                author_html_url: c.author.map(|a| a.html_url),
            })
            .collect())
    }
}

fn strip_heads(name: &str) -> String {
    name.strip_prefix("refs/heads/").unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GitHubProvider {
        GitHubProvider::new("test-token", "acme/ios-app").unwrap()
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(provider().name(), "github");
    }

    #[test]
    fn test_is_configured() {
        assert!(provider().is_configured());
        assert!(!GitHubProvider::new("", "acme/ios-app").unwrap().is_configured());
    }

    #[test]
    fn test_rejects_bad_repository() {
        assert!(GitHubProvider::new("t", "no-slash").is_err());
    }

    #[test]
    fn test_repo_url_keeps_branch_slashes() {
        let url = provider().repo_url("git/ref/heads/release/1.3.0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/ios-app/git/ref/heads/release/1.3.0"
        );
    }

    #[test]
    fn test_repo_url_encodes_segments() {
        let url = provider().repo_url("contents/My App/Info.plist").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/ios-app/contents/My%20App/Info.plist"
        );
    }

    #[test]
    fn test_repo_url_with_enterprise_base() {
        let p = provider().with_base_urls("https://git.example.com/api/v3/", "https://git.example.com");
        let url = p.repo_url("pulls").unwrap();
        assert_eq!(
            url.as_str(),
            "https://git.example.com/api/v3/repos/acme/ios-app/pulls"
        );
    }

    #[test]
    fn test_compare_url() {
        assert_eq!(
            provider().compare_url("1.2.3", "main"),
            "https://github.com/acme/ios-app/compare/1.2.3...main"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message":"Reference already exists","documentation_url":"x"}"#),
            "Reference already exists"
        );
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_strip_heads() {
        assert_eq!(strip_heads("refs/heads/main"), "main");
        assert_eq!(strip_heads("main"), "main");
    }

    #[test]
    fn test_commit_request_shape() {
        let parents = vec!["p1".to_string()];
        let body = CreateCommitRequest {
            message: "Release 1.3.0 (43)",
            tree: "t1",
            parents: &parents,
            author: AuthorRequest {
                name: "Release Bot",
                email: "bot@example.com",
                date: "2024-05-01T10:00:00+00:00".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parents"][0], "p1");
        assert_eq!(json["author"]["email"], "bot@example.com");
    }
}
