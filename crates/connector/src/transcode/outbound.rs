//! Outbound: harness message -> provider payload, plus request signing.

use crate::delegate::{HookContext, OutboundRequest, RequestHook};
use crate::envelope::{decode_payload, Attachment, ProviderEnvelope};
use crate::error::ConnectorError;
use crate::message::{is_truthy, UserMessage};
use crate::signature::{Signer, SIGNATURE_HEADER};
use serde_json::Value;

/// Body field holding the provider payload.
pub const MESSAGE_PAYLOAD_FIELD: &str = "messagePayload";

/// Pick the payload shape for `message`: first button, then first media, then text.
pub fn encode(message: &UserMessage) -> ProviderEnvelope {
    if let Some(button) = message.buttons.first().filter(|b| b.is_actionable()) {
        let raw = button
            .payload
            .clone()
            .filter(is_truthy)
            .or_else(|| button.text.clone().map(Value::String))
            .unwrap_or(Value::Null);
        return ProviderEnvelope::Postback {
            postback: decode_payload(raw),
        };
    }
    if let Some(media) = message.media.first() {
        if media.mime_type.is_none() {
            log::debug!("mime type missing for media {}", media.media_uri);
        }
        return ProviderEnvelope::Attachment {
            attachment: Attachment {
                kind: media.mime_type.clone(),
                url: media.media_uri.clone(),
                profile: None,
            },
        };
    }
    ProviderEnvelope::Text {
        text: message.message_text.clone(),
    }
}

/// Request hook: writes the payload into the body template and signs the final body.
#[derive(Debug, Clone)]
pub struct OutboundTranscoder {
    signer: Signer,
}

impl OutboundTranscoder {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }
}

impl RequestHook for OutboundTranscoder {
    fn on_request(
        &self,
        request: &mut OutboundRequest,
        message: &UserMessage,
        context: &HookContext,
    ) -> Result<(), ConnectorError> {
        let envelope = serde_json::to_value(encode(message))?;
        merge_payload(&mut request.body, envelope);
        // Sign last: the header must cover the complete body.
        let bytes = request.body_bytes()?;
        request
            .headers
            .insert(SIGNATURE_HEADER.to_string(), self.signer.sign(&bytes));
        log::debug!(
            "signed webhook body for conversation {} ({} bytes)",
            context.conversation_id,
            bytes.len()
        );
        Ok(())
    }
}

/// Merge the payload fields into `body.messagePayload`, keeping any fields the template set.
fn merge_payload(body: &mut Value, envelope: Value) {
    let Value::Object(fields) = envelope else {
        return;
    };
    if !body.is_object() {
        *body = Value::Object(serde_json::Map::new());
    }
    let Value::Object(root) = body else {
        return;
    };
    let slot = root
        .entry(MESSAGE_PAYLOAD_FIELD)
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    match slot {
        Value::Object(existing) => existing.extend(fields),
        other => *other = Value::Object(fields),
    }
}
