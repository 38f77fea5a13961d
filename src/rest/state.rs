//! Shared state for the HTTP handlers.

use std::sync::Arc;

use crate::api::providers::chat::ChatPoster;
use crate::api::providers::repo::SourceHost;
use crate::commands::CommandHandler;
use crate::config::Config;
use crate::release::Releaser;
use crate::workflow::{SnapshotStore, Workflow};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub workflow: Arc<Workflow>,
    pub releaser: Releaser,
    pub commands: Arc<CommandHandler>,
}

impl AppState {
    /// Wire every component from the config and the two outward clients.
    pub fn new(config: Config, source: Arc<dyn SourceHost>, chat: Arc<dyn ChatPoster>) -> Self {
        let workflow = Workflow::new(
            source.clone(),
            SnapshotStore::new(config.snapshot_dir()),
            config.manifest.clone(),
            config.release.lanes.clone(),
        );
        let releaser = Releaser::new(
            source.clone(),
            chat.clone(),
            config.commit.author(),
            config.slack.debug_channel_id.clone(),
        );
        let commands = CommandHandler::new(
            source,
            chat,
            config.slack.clone(),
            config.github.branch_filter_nested,
        );

        Self {
            config: Arc::new(config),
            workflow: Arc::new(workflow),
            releaser,
            commands: Arc::new(commands),
        }
    }

    /// Callbacks must carry the shared verification token.
    pub fn verify(&self, token: &str) -> bool {
        !self.config.slack.verification_token.is_empty()
            && token == self.config.slack.verification_token
    }
}
