//! Recording chat poster for tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatPoster, Message};
use crate::api::error::ApiError;

/// A message posted through [`MockChatPoster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub message: Message,
}

#[derive(Clone, Default)]
pub struct MockChatPoster {
    /// Everything posted, in order
    pub posted: Arc<Mutex<Vec<PostedMessage>>>,
    /// When set, every post fails with this error
    pub failure: Arc<Mutex<Option<ApiError>>>,
}

impl MockChatPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: ApiError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn posts(&self) -> Vec<PostedMessage> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posts_to(&self, channel: &str) -> Vec<Message> {
        self.posts()
            .into_iter()
            .filter(|p| p.channel == channel)
            .map(|p| p.message)
            .collect()
    }

    /// Waits until at least `count` messages were posted, or gives up after
    /// two seconds. Background jobs post on their own schedule.
    pub async fn wait_for_posts(&self, count: usize) -> Vec<PostedMessage> {
        for _ in 0..200 {
            let posts = self.posts();
            if posts.len() >= count {
                return posts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.posts()
    }
}

#[async_trait]
impl ChatPoster for MockChatPoster {
    fn name(&self) -> &str {
        "mock"
    }

    async fn post_message(&self, channel: &str, message: &Message) -> Result<(), ApiError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.posted.lock().unwrap().push(PostedMessage {
            channel: channel.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn test_connection(&self) -> Result<String, ApiError> {
        Ok("mockbot".to_string())
    }
}
