//! API client modules for external service integrations
//!
//! This module provides:
//! - Provider traits for the source host and the chat platform
//! - GitHub and Slack implementations plus in-memory doubles for tests
//! - Error classification for upstream failures

pub mod error;
pub mod providers;

pub use error::ApiError;
pub use providers::chat::{
    Attachment, ChatPoster, Control, MockChatPoster, SelectOption, SlackProvider,
};
pub use providers::repo::{GitHubProvider, MockSourceHost, SourceHost};
