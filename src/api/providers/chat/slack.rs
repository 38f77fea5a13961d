//! Slack Web API provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatPoster, Message};
use crate::api::error::ApiError;

pub const SLACK_API_BASE: &str = "https://slack.com/api";
const PROVIDER_NAME: &str = "slack";

/// Posts messages with a bot token
pub struct SlackProvider {
    token: String,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

/// Every Web API response is wrapped in `{ "ok": bool, "error": "..." }`
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

impl SlackProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::Client::new(),
            base_url: SLACK_API_BASE.to_string(),
        }
    }

    /// Create with custom base URL (for testing)
    pub fn new_with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::new(token)
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<Envelope, ApiError> {
        let response = self
            .client
            .post(self.method_url(method))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(
                PROVIDER_NAME,
                status.as_u16(),
                body,
                retry_after,
            ));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;
        check_envelope(envelope)
    }
}

fn check_envelope(envelope: Envelope) -> Result<Envelope, ApiError> {
    if envelope.ok {
        return Ok(envelope);
    }
    let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
    match code.as_str() {
        "invalid_auth" | "not_authed" | "token_revoked" | "account_inactive" => {
            Err(ApiError::http(PROVIDER_NAME, 401, code))
        }
        _ => Err(ApiError::platform(PROVIDER_NAME, code)),
    }
}

#[async_trait]
impl ChatPoster for SlackProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn post_message(&self, channel: &str, message: &Message) -> Result<(), ApiError> {
        self.call("chat.postMessage", &PostMessageRequest { channel, message })
            .await?;
        tracing::debug!(channel, "Posted chat message");
        Ok(())
    }

    async fn test_connection(&self) -> Result<String, ApiError> {
        let envelope = self.call("auth.test", &serde_json::json!({})).await?;
        Ok(envelope.user.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let slack = SlackProvider::new_with_base_url("xoxb-test", "http://localhost:9999/api/");
        assert_eq!(
            slack.method_url("chat.postMessage"),
            "http://localhost:9999/api/chat.postMessage"
        );
        assert!(slack.is_configured());
        assert!(!SlackProvider::new("").is_configured());
    }

    #[test]
    fn test_post_request_flattens_message() {
        let message = Message::text("Releasing `1.3.0 (43)`");
        let json = serde_json::to_value(PostMessageRequest {
            channel: "C123",
            message: &message,
        })
        .unwrap();
        assert_eq!(json["channel"], "C123");
        assert_eq!(json["text"], "Releasing `1.3.0 (43)`");
    }

    #[test]
    fn test_envelope_errors() {
        let ok = Envelope {
            ok: true,
            error: None,
            user: Some("releasebot".to_string()),
        };
        assert!(check_envelope(ok).is_ok());

        let revoked = Envelope {
            ok: false,
            error: Some("invalid_auth".to_string()),
            user: None,
        };
        assert!(check_envelope(revoked).unwrap_err().is_auth_error());

        let missing = Envelope {
            ok: false,
            error: Some("channel_not_found".to_string()),
            user: None,
        };
        assert_eq!(
            check_envelope(missing).unwrap_err(),
            ApiError::platform("slack", "channel_not_found")
        );
    }
}
