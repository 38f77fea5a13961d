//! Chat provider trait and the message model shared by prompts and posts.
//!
//! Messages use Slack's interactive attachment shape: an attachment carries a
//! prompt text and a row of controls, and every control carries a value that
//! comes back verbatim when pressed.

mod mock;
mod slack;

pub use mock::MockChatPoster;
pub use slack::{SlackProvider, SLACK_API_BASE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;

/// Tells Slack to show a response to everyone in the channel.
pub const RESPONSE_IN_CHANNEL: &str = "in_channel";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Replace the message that held the pressed control.
    pub fn replacing_original(mut self) -> Self {
        self.response_type = Some(RESPONSE_IN_CHANNEL.to_string());
        self.replace_original = Some(true);
        self
    }

    /// All controls across all attachments
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.attachments.iter().flat_map(|a| a.actions.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Control>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
}

impl Attachment {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            fallback: text.clone(),
            text,
            mrkdwn_in: vec!["text".to_string()],
            ..Self::default()
        }
    }

    pub fn callback(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = callback_id.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn action(mut self, control: Control) -> Self {
        self.actions.push(control);
        self
    }

    pub fn field(mut self, title: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            title: title.into(),
            value: value.into(),
            short: false,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Button,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStyle {
    Default,
    Primary,
    Danger,
}

/// A button or a static select menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ControlKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ControlStyle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl Control {
    pub fn button(
        name: impl Into<String>,
        text: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: ControlKind::Button,
            value: value.into(),
            style: None,
            options: Vec::new(),
        }
    }

    pub fn select(
        name: impl Into<String>,
        text: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: ControlKind::Select,
            value: String::new(),
            style: None,
            options,
        }
    }

    pub fn primary(mut self) -> Self {
        self.style = Some(ControlStyle::Primary);
        self
    }

    pub fn danger(mut self) -> Self {
        self.style = Some(ControlStyle::Danger);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// Trait for chat providers that can post messages
#[async_trait]
pub trait ChatPoster: Send + Sync {
    /// Get the provider name (e.g., "slack")
    fn name(&self) -> &str;

    async fn post_message(&self, channel: &str, message: &Message) -> Result<(), ApiError>;

    /// Check the credentials; returns the bot's user name
    async fn test_connection(&self) -> Result<String, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_serializes_in_slack_shape() {
        let control = Control::button("cancel", "Cancel", "cancel").danger();
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["type"], "button");
        assert_eq!(json["style"], "danger");
        assert_eq!(json["value"], "cancel");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_select_serializes_options() {
        let control = Control::select(
            "build_number",
            "Build number",
            vec![SelectOption::new("42", "{}")],
        );
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["options"][0]["text"], "42");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_plain_text_message_omits_empty_parts() {
        let json = serde_json::to_value(Message::text("pong")).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "pong" }));
    }

    #[test]
    fn test_controls_across_attachments() {
        let message = Message::default()
            .with_attachment(Attachment::new("a").action(Control::button("x", "X", "1")))
            .with_attachment(Attachment::new("b").action(Control::button("y", "Y", "2")));
        let names: Vec<&str> = message.controls().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_replacing_original() {
        let json = serde_json::to_value(Message::text("ok").replacing_original()).unwrap();
        assert_eq!(json["response_type"], "in_channel");
        assert_eq!(json["replace_original"], true);
    }
}
