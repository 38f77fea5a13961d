use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use releasebot::api::providers::chat::ChatPoster;
use releasebot::api::providers::repo::SourceHost;
use releasebot::api::{GitHubProvider, SlackProvider};
use releasebot::config::Config;
use releasebot::logging;
use releasebot::rest::{self, AppState};
use releasebot::workflow::SnapshotStore;

#[derive(Parser)]
#[command(name = "releasebot")]
#[command(about = "Chat-driven release pull requests")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Verify the GitHub and Slack credentials
    Check,

    /// Write the default configuration as TOML
    InitConfig {
        /// Destination (default: ./releasebot.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    // Held until exit so buffered file logs are flushed
    let _logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        None => cmd_serve(config, None).await,
        Some(Commands::Serve { port }) => cmd_serve(config, port).await,
        Some(Commands::Check) => cmd_check(&config).await,
        Some(Commands::InitConfig { path }) => cmd_init_config(path),
    }
}

fn providers(config: &Config) -> Result<(GitHubProvider, SlackProvider)> {
    let github = GitHubProvider::new(&config.github.token, &config.github.repository)
        .context("Invalid GitHub settings")?
        .with_base_urls(&config.github.api_base_url, &config.github.web_base_url);
    let slack = SlackProvider::new_with_base_url(&config.slack.bot_token, &config.slack.api_base_url);
    Ok((github, slack))
}

async fn cmd_serve(mut config: Config, port: Option<u16>) -> Result<()> {
    config.validate()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let snapshots = SnapshotStore::new(config.snapshot_dir());
    match snapshots.prune_older_than(config.snapshots.max_age()) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, dir = %snapshots.dir().display(), "Pruned stale snapshots"),
        Err(e) => tracing::warn!(error = %e, "Could not prune snapshots"),
    }

    let (github, slack) = providers(&config)?;
    let source: Arc<dyn SourceHost> = Arc::new(github);
    let chat: Arc<dyn ChatPoster> = Arc::new(slack);

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(config, source, chat);
    rest::serve(state, &host, port).await
}

async fn cmd_check(config: &Config) -> Result<()> {
    let (github, slack) = providers(config)?;
    if !github.is_configured() {
        anyhow::bail!("github.token is not set");
    }
    if !slack.is_configured() {
        anyhow::bail!("slack.bot_token is not set");
    }

    let default_branch = github
        .default_branch()
        .await
        .with_context(|| format!("GitHub check failed for {}", config.github.repository))?;
    println!(
        "GitHub: {} (default branch `{}`)",
        config.github.repository, default_branch
    );

    let user = slack
        .test_connection()
        .await
        .context("Slack check failed")?;
    println!("Slack: authenticated as {}", user);

    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::local_config_path);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    Config::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
