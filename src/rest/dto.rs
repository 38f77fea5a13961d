//! Data Transfer Objects for the HTTP surface.
//!
//! Inbound shapes follow Slack's interactive-message callback and Events API
//! envelopes. Only the fields the bot reads are declared; everything else in
//! the payload is ignored.

use serde::{Deserialize, Serialize};

use crate::commands::ChatEvent;
use crate::workflow::Interaction;

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Interaction callback
// =============================================================================

/// URL-encoded body of an interaction callback
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

/// JSON carried in the `payload` form field
#[derive(Debug, Deserialize)]
pub struct InteractionPayload {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub actions: Vec<PayloadAction>,
    #[serde(default)]
    pub user: PayloadUser,
    #[serde(default)]
    pub channel: PayloadChannel,
}

#[derive(Debug, Deserialize)]
pub struct PayloadAction {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayloadUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayloadChannel {
    #[serde(default)]
    pub id: String,
}

impl InteractionPayload {
    /// The first pressed control. Buttons carry `value`; select menus carry
    /// the chosen option instead.
    pub fn interaction(&self) -> Option<Interaction> {
        let action = self.actions.first()?;
        let value = if action.value.is_empty() {
            action
                .selected_options
                .first()
                .map(|o| o.value.clone())
                .unwrap_or_default()
        } else {
            action.value.clone()
        };
        Some(Interaction {
            action: action.name.clone(),
            value,
            user_name: self.user.name.clone(),
            channel_id: self.channel.id.clone(),
        })
    }
}

// =============================================================================
// Events API
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Sent once when the request URL is configured
    UrlVerification {
        #[serde(default)]
        token: String,
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        token: String,
        event: SlackEvent,
    },
    #[serde(other)]
    Other,
}

impl EventEnvelope {
    pub fn token(&self) -> Option<&str> {
        match self {
            EventEnvelope::UrlVerification { token, .. }
            | EventEnvelope::EventCallback { token, .. } => Some(token.as_str()),
            EventEnvelope::Other => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl SlackEvent {
    /// Mentions in channels arrive as `app_mention`; direct messages as
    /// `message` with channel type `im`. Channel `message` events are skipped
    /// so a mention is not handled twice.
    pub fn chat_event(&self) -> Option<ChatEvent> {
        let relevant = match self.kind.as_str() {
            "app_mention" => true,
            "message" => self.channel_type.as_deref() == Some("im") && self.subtype.is_none(),
            _ => false,
        };
        if !relevant {
            return None;
        }
        let bot_id = self
            .bot_id
            .clone()
            .or_else(|| (self.subtype.as_deref() == Some("bot_message")).then(String::new));
        Some(ChatEvent {
            channel_id: self.channel.clone(),
            user_id: self.user.clone(),
            text: self.text.clone(),
            bot_id,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_menu_value() {
        let payload: InteractionPayload = serde_json::from_str(
            r#"{
                "token": "t",
                "actions": [{"name": "branch", "type": "select", "selected_options": [{"value": "develop"}]}],
                "user": {"id": "U1", "name": "alice"},
                "channel": {"id": "C1", "name": "releases"}
            }"#,
        )
        .unwrap();
        let interaction = payload.interaction().unwrap();
        assert_eq!(interaction.action, "branch");
        assert_eq!(interaction.value, "develop");
        assert_eq!(interaction.user_name, "alice");
        assert_eq!(interaction.channel_id, "C1");
    }

    #[test]
    fn test_no_actions() {
        let payload: InteractionPayload = serde_json::from_str(r#"{"token": "t"}"#).unwrap();
        assert!(payload.interaction().is_none());
    }

    #[test]
    fn test_event_envelopes() {
        let verify: EventEnvelope = serde_json::from_str(
            r#"{"type": "url_verification", "token": "t", "challenge": "abc"}"#,
        )
        .unwrap();
        assert!(matches!(verify, EventEnvelope::UrlVerification { ref challenge, .. } if challenge == "abc"));

        let other: EventEnvelope =
            serde_json::from_str(r#"{"type": "app_rate_limited", "token": "t"}"#).unwrap();
        assert!(matches!(other, EventEnvelope::Other));
    }

    #[test]
    fn test_chat_event_filtering() {
        let mention = SlackEvent {
            kind: "app_mention".to_string(),
            channel: "C1".to_string(),
            text: "<@UBOT> ping".to_string(),
            ..SlackEvent::default()
        };
        assert_eq!(mention.chat_event().unwrap().text, "<@UBOT> ping");

        let channel_message = SlackEvent {
            kind: "message".to_string(),
            channel_type: Some("channel".to_string()),
            ..SlackEvent::default()
        };
        assert!(channel_message.chat_event().is_none());

        let direct = SlackEvent {
            kind: "message".to_string(),
            channel_type: Some("im".to_string()),
            ..SlackEvent::default()
        };
        assert!(direct.chat_event().is_some());

        let bot_mention = SlackEvent {
            kind: "app_mention".to_string(),
            subtype: Some("bot_message".to_string()),
            ..SlackEvent::default()
        };
        assert!(bot_mention.chat_event().unwrap().bot_id.is_some());
    }
}
