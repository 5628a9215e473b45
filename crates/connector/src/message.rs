//! Harness-side message shapes: what the test harness sends (`UserMessage`) and what it
//! expects back (`BotMessage`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A button on a message or card. Outbound, `payload` wins over `text` when posting back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Button {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Button {
    /// True if the button carries something to post back (non-empty text or truthy payload).
    pub fn is_actionable(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
            || self.payload.as_ref().is_some_and(is_truthy)
    }
}

/// A media reference. Inbound media always carries a resolved mime type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    #[serde(default)]
    pub media_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// `profile` of a structured media object, `false` when there is none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<Value>,
}

/// A card from a card-list reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<Media>>,
    /// Present only when the source card had actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

/// Message from the harness to the bot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub media: Vec<Media>,
}

impl UserMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Message from the bot, normalized for the harness. `source_data` keeps the raw inbound body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMessage {
    #[serde(default)]
    pub source_data: Value,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl BotMessage {
    pub fn from_source(source_data: Value) -> Self {
        Self {
            source_data,
            ..Self::default()
        }
    }

    /// A message with nothing recognized: no text, buttons, media or cards.
    pub fn is_empty(&self) -> bool {
        self.message_text.is_none()
            && self.buttons.is_empty()
            && self.media.is_empty()
            && self.cards.is_empty()
    }
}

/// JavaScript-style truthiness used by the payload fallbacks.
pub(crate) fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
