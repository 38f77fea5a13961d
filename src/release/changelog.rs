//! Change-log Synthesizer
//!
//! Lists the commits between the latest tag and the release branch as
//! markdown, newest first. A missing tag or a failed comparison yields an
//! empty changelog; the release goes ahead without one.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::api::providers::repo::{ComparedCommit, SourceHost};

/// Committer name the host uses for merges done through its web UI
const PLATFORM_COMMITTER: &str = "GitHub";
const MERGE_PREFIX: &str = "Merge pull request";
/// "Merge pull request #12 from" keeps the PR number and drops the branch
const MERGE_SUMMARY_WORDS: usize = 4;
const SHORT_SHA_LEN: usize = 7;

pub struct ChangelogSynthesizer {
    source: Arc<dyn SourceHost>,
}

impl ChangelogSynthesizer {
    pub fn new(source: Arc<dyn SourceHost>) -> Self {
        Self { source }
    }

    /// Changelog for releasing `version` from `branch`, dated `date`.
    pub async fn generate(&self, version: &str, branch: &str, date: NaiveDate) -> String {
        let tags = match self.source.list_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(error = %e, "Could not list tags, releasing without changelog");
                return String::new();
            }
        };
        let Some(latest) = tags.first() else {
            debug!("No tags yet, releasing without changelog");
            return String::new();
        };

        let commits = match self.source.compare_commits(&latest.name, branch).await {
            Ok(commits) => commits,
            Err(e) => {
                warn!(tag = %latest.name, branch, error = %e, "Could not compare commits");
                return String::new();
            }
        };

        let compare_url = self.source.compare_url(&latest.name, branch);
        render(version, &compare_url, date, &commits)
    }
}

/// Header line plus one bullet per commit. `commits` is oldest first, as the
/// host returns it.
pub fn render(version: &str, compare_url: &str, date: NaiveDate, commits: &[ComparedCommit]) -> String {
    let mut lines = Vec::with_capacity(commits.len() + 1);
    lines.push(format!(
        "## [{version}]({compare_url}) ({})",
        date.format("%Y-%m-%d")
    ));
    lines.extend(commits.iter().rev().map(entry));
    lines.join("\n")
}

fn entry(commit: &ComparedCommit) -> String {
    let summary = summary(commit);
    let short_sha: String = commit.sha.chars().take(SHORT_SHA_LEN).collect();
    let author = match (&commit.author_login, &commit.author_html_url) {
        (Some(login), Some(url)) => format!("[{login}]({url})"),
        (Some(login), None) => login.clone(),
        _ => commit.author_name.clone(),
    };
    format!("* {summary} [{short_sha}]({}) ({author})", commit.html_url)
}

fn summary(commit: &ComparedCommit) -> String {
    let message = &commit.message;
    if commit.committer_name == PLATFORM_COMMITTER && message.starts_with(MERGE_PREFIX) {
        return message
            .split_whitespace()
            .take(MERGE_SUMMARY_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
    }
    message.lines().next().unwrap_or_default().to_string()
}
