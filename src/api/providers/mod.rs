//! Provider trait definitions for external service integrations
//!
//! - Repository providers: branch, file, git-data and pull request access
//! - Chat providers: posting prompts and status messages

pub mod chat;
pub mod repo;

pub use chat::{ChatPoster, Message};
pub use repo::SourceHost;
