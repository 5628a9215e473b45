//! Provider wire payloads (`messagePayload`), tagged by `type`.
//!
//! Outbound shapes are produced by the connector and only serialized. Inbound shapes are
//! parsed leniently: an unknown or malformed payload becomes [`InboundEnvelope::Unsupported`]
//! instead of an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Attachment body: `{type, url}` with an optional `profile` on inbound attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

/// Payload sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEnvelope {
    Postback {
        postback: Value,
    },
    Attachment {
        attachment: Attachment,
    },
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Action on a text message or card. Bare strings are accepted as well as objects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActionRef {
    Plain(String),
    Structured(Action),
    /// Any other value (number, object with mistyped fields); never becomes a button.
    Unsupported(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub postback: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ActionRef {
    /// Action type, `None` for bare strings.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ActionRef::Plain(_) | ActionRef::Unsupported(_) => None,
            ActionRef::Structured(a) => a.kind.as_deref(),
        }
    }

    pub fn is_postback(&self) -> bool {
        self.kind() == Some("postback")
    }
}

/// Media reference: a bare URL or an attachment object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MediaRef {
    Plain(String),
    Structured(Attachment),
}

impl MediaRef {
    pub fn url(&self) -> &str {
        match self {
            MediaRef::Plain(s) => s,
            MediaRef::Structured(a) => &a.url,
        }
    }
}

/// One card of a card-list payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<MediaRef>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub actions: Vec<ActionRef>,
}

/// Payload received from the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Text {
        text: Option<String>,
        actions: Vec<ActionRef>,
    },
    Card {
        cards: Vec<CardPayload>,
    },
    Attachment {
        attachment: MediaRef,
    },
    /// Anything else; `kind` is the `type` tag if there was one.
    Unsupported {
        kind: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownEnvelope {
    Text {
        #[serde(default)]
        text: Option<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        actions: Vec<ActionRef>,
    },
    Card {
        #[serde(default, deserialize_with = "lenient_list")]
        cards: Vec<CardPayload>,
    },
    Attachment {
        attachment: MediaRef,
    },
}

impl InboundEnvelope {
    /// Parse a `messagePayload` value. Never fails.
    pub fn from_value(value: &Value) -> Self {
        match KnownEnvelope::deserialize(value) {
            Ok(KnownEnvelope::Text { text, actions }) => InboundEnvelope::Text { text, actions },
            Ok(KnownEnvelope::Card { cards }) => InboundEnvelope::Card { cards },
            Ok(KnownEnvelope::Attachment { attachment }) => {
                InboundEnvelope::Attachment { attachment }
            }
            Err(e) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .map(str::to_string);
                if matches!(kind.as_deref(), Some("text" | "card" | "attachment")) {
                    log::debug!("malformed '{}' payload: {}", kind.as_deref().unwrap_or_default(), e);
                }
                InboundEnvelope::Unsupported { kind }
            }
        }
    }
}

/// List field parsed element by element: `null` or a non-list is empty, elements that do not
/// parse are dropped with a debug line.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(other) => {
            log::debug!("expected a list, got {}", other);
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match T::deserialize(&item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::debug!("skipping unsupported list element {}: {}", item, e);
                None
            }
        })
        .collect())
}

/// Parse `s` as JSON, falling back to the raw string.
pub fn parse_or_raw(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

/// Decode a button payload: strings are parsed as JSON when possible, other values pass through.
pub fn decode_payload(payload: Value) -> Value {
    match payload {
        Value::String(s) => parse_or_raw(&s),
        other => other,
    }
}
