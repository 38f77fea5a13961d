//! Background release jobs.
//!
//! A confirmed workflow becomes a [`ReleaseJob`]. The job runs detached from
//! the request that confirmed it: it builds the changelog, pushes the commit
//! and pull request, and reports the outcome as a new chat message.

pub mod changelog;
pub mod pipeline;

use std::sync::Arc;

use chrono::Local;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::providers::chat::{ChatPoster, Message};
use crate::api::providers::repo::{CommitAuthor, SourceHost};

pub use changelog::ChangelogSynthesizer;
pub use pipeline::{CommitPipeline, CommitRequest};

/// A confirmed release, self-contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseJob {
    /// Channel that receives the outcome
    pub channel_id: String,
    pub version: String,
    pub build_number: String,
    pub target_branch: String,
    pub commit_branch: String,
    pub title: String,
    pub file_path: String,
    /// Manifest with the new version and build number applied
    pub file_content: Vec<u8>,
}

impl ReleaseJob {
    pub fn label(&self) -> String {
        format!("{} ({})", self.version, self.build_number)
    }
}

/// Runs release jobs and reports their outcome
#[derive(Clone)]
pub struct Releaser {
    source: Arc<dyn SourceHost>,
    chat: Arc<dyn ChatPoster>,
    author: CommitAuthor,
    debug_channel_id: Option<String>,
}

impl Releaser {
    pub fn new(
        source: Arc<dyn SourceHost>,
        chat: Arc<dyn ChatPoster>,
        author: CommitAuthor,
        debug_channel_id: Option<String>,
    ) -> Self {
        Self {
            source,
            chat,
            author,
            debug_channel_id,
        }
    }

    /// Start the job in the background. Nobody waits on the handle in
    /// production; tests may.
    pub fn spawn(&self, job: ReleaseJob) -> JoinHandle<()> {
        let releaser = self.clone();
        tokio::spawn(async move { releaser.run(job).await })
    }

    pub async fn run(&self, job: ReleaseJob) {
        info!(release = %job.label(), branch = %job.commit_branch, "Starting release");

        let changelog = ChangelogSynthesizer::new(self.source.clone())
            .generate(&job.version, &job.target_branch, Local::now().date_naive())
            .await;

        let request = CommitRequest {
            target_branch: job.target_branch.clone(),
            commit_branch: job.commit_branch.clone(),
            file_content: job.file_content.clone(),
            file_path: job.file_path.clone(),
            title: job.title.clone(),
            commit_message: commit_message(&job.title, &changelog),
            body: changelog,
        };

        let pipeline = CommitPipeline::new(self.source.clone(), self.author.clone());
        match pipeline.push(&request).await {
            Ok(pr) => {
                let text = format!("Releasing `{}`\n{}", job.label(), pr.html_url);
                self.post(&job.channel_id, &text).await;
            }
            Err(e) => {
                error!(release = %job.label(), error = %e, "Release failed");
                let text = format!("failed to create pull request {e}");
                self.post(&job.channel_id, &text).await;
                if let Some(debug_channel) = &self.debug_channel_id {
                    if debug_channel != &job.channel_id {
                        let text = format!("`{}` on `{}`: {text}", job.label(), job.target_branch);
                        self.post(debug_channel, &text).await;
                    }
                }
            }
        }
    }

    async fn post(&self, channel: &str, text: &str) {
        if let Err(e) = self.chat.post_message(channel, &Message::text(text)).await {
            error!(channel, error = %e, "Could not report release outcome");
        }
    }
}

/// `Release 1.3.0 (43)` followed by the changelog, if any
fn commit_message(title: &str, changelog: &str) -> String {
    if changelog.is_empty() {
        title.to_string()
    } else {
        format!("{title}\n\n{changelog}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockChatPoster, MockSourceHost};

    fn job() -> ReleaseJob {
        ReleaseJob {
            channel_id: "C1".to_string(),
            version: "1.3.0".to_string(),
            build_number: "43".to_string(),
            target_branch: "main".to_string(),
            commit_branch: "release/1.3.0-43-1714557600".to_string(),
            title: "Release 1.3.0 (43)".to_string(),
            file_path: "Info.plist".to_string(),
            file_content: b"content".to_vec(),
        }
    }

    fn releaser(source: &MockSourceHost, chat: &MockChatPoster, debug: Option<&str>) -> Releaser {
        Releaser::new(
            Arc::new(source.clone()),
            Arc::new(chat.clone()),
            CommitAuthor {
                name: "Release Bot".to_string(),
                email: "bot@example.com".to_string(),
            },
            debug.map(str::to_string),
        )
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(commit_message("Release 1 (2)", ""), "Release 1 (2)");
        assert_eq!(commit_message("Release 1 (2)", "## x"), "Release 1 (2)\n\n## x");
    }

    #[tokio::test]
    async fn test_success_is_reported_with_link() {
        let source = MockSourceHost::new("main");
        let chat = MockChatPoster::new();

        releaser(&source, &chat, None).spawn(job()).await.unwrap();

        let posts = chat.posts_to("C1");
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].text,
            "Releasing `1.3.0 (43)`\nhttps://git.example.com/acme/app/pull/1"
        );
        // No tags: empty changelog, PR still opened
        assert_eq!(source.pull_requests()[0].body, "");
        let head = source.ref_sha("release/1.3.0-43-1714557600").unwrap();
        assert_eq!(source.commit(&head).unwrap().message, "Release 1.3.0 (43)");
    }

    #[tokio::test]
    async fn test_failure_goes_to_channel_and_debug_channel() {
        let source = MockSourceHost::new("main");
        source.fail_with("create_blob", ApiError::http("mock", 502, "Bad gateway"));
        let chat = MockChatPoster::new();

        releaser(&source, &chat, Some("CDEBUG")).run(job()).await;

        let posts = chat.posts_to("C1");
        assert_eq!(posts.len(), 1);
        assert!(posts[0].text.starts_with("failed to create pull request"));
        assert!(posts[0].text.contains("Bad gateway"));
        assert_eq!(chat.posts_to("CDEBUG").len(), 1);
    }

    #[tokio::test]
    async fn test_changelog_lands_in_body_and_commit() {
        let source = MockSourceHost::new("main");
        source.add_tag("1.2.3", "x");
        source.set_comparison("1.2.3", "main", Vec::new());
        let chat = MockChatPoster::new();

        releaser(&source, &chat, None).run(job()).await;

        let body = &source.pull_requests()[0].body;
        assert!(body.starts_with("## [1.3.0](https://git.example.com/acme/app/compare/1.2.3...main) ("));
        let head = source.ref_sha("release/1.3.0-43-1714557600").unwrap();
        assert!(source.commit(&head).unwrap().message.starts_with("Release 1.3.0 (43)\n\n## [1.3.0]"));
    }
}
