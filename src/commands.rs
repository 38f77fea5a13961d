//! Chat commands addressed to the bot.
//!
//! `@bot` or `@bot help` answers with usage, `@bot ping` with `pong`, and
//! `@bot deliver` starts a release by posting the branch prompt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::providers::chat::{Attachment, ChatPoster, Control, Message, SelectOption};
use crate::api::providers::repo::SourceHost;
use crate::config::SlackConfig;
use crate::workflow::{cancel_control, render_error, WorkflowError, ACTION_BRANCH, CALLBACK_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    Deliver,
}

impl Command {
    /// Parse a message. Only messages that start with a mention of the bot
    /// are commands; anything unrecognized after the mention is ignored.
    pub fn parse(text: &str, bot_id: &str) -> Option<Self> {
        let mention = format!("<@{bot_id}>");
        let fields: Vec<&str> = text.split_whitespace().collect();
        match fields.as_slice() {
            [first] if *first == mention => Some(Command::Help),
            [first, word] if *first == mention => match *word {
                "help" => Some(Command::Help),
                "ping" => Some(Command::Ping),
                "deliver" => Some(Command::Deliver),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A message seen in a channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    /// Set when the message was posted by a bot, including this one
    pub bot_id: Option<String>,
}

pub struct CommandHandler {
    source: Arc<dyn SourceHost>,
    chat: Arc<dyn ChatPoster>,
    slack: SlackConfig,
    hide_nested_branches: bool,
}

impl CommandHandler {
    pub fn new(
        source: Arc<dyn SourceHost>,
        chat: Arc<dyn ChatPoster>,
        slack: SlackConfig,
        hide_nested_branches: bool,
    ) -> Self {
        Self {
            source,
            chat,
            slack,
            hide_nested_branches,
        }
    }

    pub fn help_text(&self) -> String {
        format!("```\nCommand:\n\t<@{}> deliver\n```", self.slack.bot_id)
    }

    /// Handle one channel message. Returns the command that was acted on.
    pub async fn handle(&self, event: &ChatEvent) -> Option<Command> {
        if event.bot_id.is_some() {
            return None;
        }
        if !self.slack.allows_channel(&event.channel_id) {
            debug!(channel = %event.channel_id, "Ignoring message outside configured channels");
            return None;
        }
        let command = Command::parse(&event.text, &self.slack.bot_id)?;
        info!(?command, user = %event.user_id, channel = %event.channel_id, "Chat command");

        let message = match command {
            Command::Help => Message::text(self.help_text()),
            Command::Ping => Message::text("pong"),
            Command::Deliver => match self.branch_prompt().await {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Could not start release");
                    render_error(&e)
                }
            },
        };

        if let Err(e) = self.chat.post_message(&event.channel_id, &message).await {
            warn!(channel = %event.channel_id, error = %e, "Could not answer chat command");
        }
        Some(command)
    }

    /// The default branch as a button, every other branch in a select menu.
    pub async fn branch_prompt(&self) -> Result<Message, WorkflowError> {
        let default_branch = self.source.default_branch().await?;
        let options: Vec<SelectOption> = self
            .source
            .list_branches()
            .await?
            .into_iter()
            .filter(|b| *b != default_branch)
            .filter(|b| !(self.hide_nested_branches && b.contains('/')))
            .map(|b| SelectOption::new(b.clone(), b))
            .collect();

        let mut attachment = Attachment::new("Which branch?")
            .callback(CALLBACK_ID)
            .action(Control::button(ACTION_BRANCH, &default_branch, &default_branch).primary());
        if !options.is_empty() {
            attachment = attachment.action(Control::select(ACTION_BRANCH, "Other branch", options));
        }
        Ok(Message::default().with_attachment(attachment.action(cancel_control())))
    }
}
