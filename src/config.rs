use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::providers::chat::SLACK_API_BASE;
use crate::api::providers::repo::{
    parse_repo_string, CommitAuthor, GITHUB_API_BASE, GITHUB_WEB_BASE,
};
use crate::manifest::ManifestFormat;

/// Environment variable prefix, e.g. `RELEASEBOT__SLACK__BOT_TOKEN`
pub const ENV_PREFIX: &str = "RELEASEBOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Slack app credentials and channel routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`) used for chat.postMessage
    #[serde(default)]
    pub bot_token: String,

    /// Shared token Slack includes in every callback
    #[serde(default)]
    pub verification_token: String,

    /// User ID of the bot, as it appears in `<@U...>` mentions
    #[serde(default)]
    pub bot_id: String,

    /// Channels where commands are honored; empty means all
    #[serde(default)]
    pub channel_ids: Vec<String>,

    /// Receives a copy of every failed release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_channel_id: Option<String>,

    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,
}

fn default_slack_api_base_url() -> String {
    SLACK_API_BASE.to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            verification_token: String::new(),
            bot_id: String::new(),
            channel_ids: Vec::new(),
            debug_channel_id: None,
            api_base_url: default_slack_api_base_url(),
        }
    }
}

impl SlackConfig {
    pub fn allows_channel(&self, channel_id: &str) -> bool {
        self.channel_ids.is_empty() || self.channel_ids.iter().any(|c| c == channel_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,

    /// Repository as `owner/name`
    #[serde(default)]
    pub repository: String,

    #[serde(default = "default_github_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_github_web_base_url")]
    pub web_base_url: String,

    /// Hide branches with a `/` in their name from the branch prompt
    #[serde(default = "default_true")]
    pub branch_filter_nested: bool,
}

fn default_github_api_base_url() -> String {
    GITHUB_API_BASE.to_string()
}

fn default_github_web_base_url() -> String {
    GITHUB_WEB_BASE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repository: String::new(),
            api_base_url: default_github_api_base_url(),
            web_base_url: default_github_web_base_url(),
            branch_filter_nested: true,
        }
    }
}

/// Identity recorded on release commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

fn default_author_name() -> String {
    "releasebot".to_string()
}

fn default_author_email() -> String {
    "releasebot@users.noreply.github.com".to_string()
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

impl CommitConfig {
    pub fn author(&self) -> CommitAuthor {
        CommitAuthor {
            name: self.author_name.clone(),
            email: self.author_email.clone(),
        }
    }
}

/// Where the version manifest lives and which keys hold the version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Path within the repository
    #[serde(default = "default_manifest_path")]
    pub path: String,
    #[serde(default = "default_version_key")]
    pub version_key: String,
    #[serde(default = "default_build_key")]
    pub build_key: String,
    #[serde(default)]
    pub format: ManifestFormat,
}

fn default_manifest_path() -> String {
    "Info.plist".to_string()
}

fn default_version_key() -> String {
    "CFBundleShortVersionString".to_string()
}

fn default_build_key() -> String {
    "CFBundleVersion".to_string()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: default_manifest_path(),
            version_key: default_version_key(),
            build_key: default_build_key(),
            format: ManifestFormat::Auto,
        }
    }
}

/// A release destination, offered as one button on the confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLane {
    pub id: String,
    /// Button text
    pub label: String,
    /// Shown in the "Releasing ..." acknowledgement
    pub destination: String,
    /// First path segment of the commit branch
    pub branch_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default = "default_lanes")]
    pub lanes: Vec<ReleaseLane>,
}

fn default_lanes() -> Vec<ReleaseLane> {
    vec![ReleaseLane {
        id: "release".to_string(),
        label: "OK".to_string(),
        destination: "release".to_string(),
        branch_prefix: "release".to_string(),
    }]
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
        }
    }
}

impl ReleaseConfig {
    pub fn lane(&self, id: &str) -> Option<&ReleaseLane> {
        self.lanes.iter().find(|l| l.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    /// Directory for manifest snapshots
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,

    /// Snapshots older than this are removed at startup
    #[serde(default = "default_snapshot_max_age_hours")]
    pub max_age_hours: u64,
}

fn default_snapshot_dir() -> String {
    std::env::temp_dir()
        .join("releasebot")
        .to_string_lossy()
        .to_string()
}

fn default_snapshot_max_age_hours() -> u64 {
    24
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            max_age_hours: default_snapshot_max_age_hours(),
        }
    }
}

impl SnapshotsConfig {
    pub fn max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_age_hours * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write to a daily log file instead of stderr
    #[serde(default)]
    pub to_file: bool,

    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Project-local config file, read from the working directory
    pub fn local_config_path() -> PathBuf {
        PathBuf::from("releasebot.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so a partial file is enough
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/releasebot/
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("releasebot").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with RELEASEBOT__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("slack.channel_ids")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Write this config as TOML
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Report every setting the server cannot run without
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.slack.bot_token.is_empty() {
            problems.push("slack.bot_token is not set".to_string());
        }
        if self.slack.verification_token.is_empty() {
            problems.push("slack.verification_token is not set".to_string());
        }
        if self.slack.bot_id.is_empty() {
            problems.push("slack.bot_id is not set".to_string());
        }
        if self.github.token.is_empty() {
            problems.push("github.token is not set".to_string());
        }
        if parse_repo_string(&self.github.repository).is_none() {
            problems.push(format!(
                "github.repository `{}` is not in owner/name form",
                self.github.repository
            ));
        }
        if self.manifest.path.is_empty() {
            problems.push("manifest.path is not set".to_string());
        }
        if self.release.lanes.is_empty() {
            problems.push("release.lanes is empty".to_string());
        }
        for (i, lane) in self.release.lanes.iter().enumerate() {
            if lane.id.is_empty() || lane.branch_prefix.is_empty() {
                problems.push(format!("release.lanes[{i}] needs an id and a branch_prefix"));
            }
            if self.release.lanes[..i].iter().any(|l| l.id == lane.id) {
                problems.push(format!("release lane `{}` is defined twice", lane.id));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            bail!("Invalid configuration:\n  - {}", problems.join("\n  - "))
        }
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        PathBuf::from(&self.snapshots.dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        PathBuf::from(&self.logging.dir)
    }
}
