//! Inbound: provider payload -> harness message fields.

use crate::delegate::ResponseHook;
use crate::envelope::{decode_payload, ActionRef, CardPayload, InboundEnvelope, MediaRef};
use crate::message::{is_truthy, BotMessage, Button, Card, Media};
use crate::transcode::outbound::MESSAGE_PAYLOAD_FIELD;
use serde_json::Value;

/// Mime type used when neither the payload nor the URL tells us one.
pub const UNKNOWN_MIME_TYPE: &str = "application/unknown";

/// Internal key the provider adds to postback objects; never shown to the harness.
const RESERVED_POSTBACK_KEY: &str = "system.botId";

/// Fields recognized in one inbound payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundFragment {
    pub message_text: Option<String>,
    pub buttons: Vec<Button>,
    pub media: Vec<Media>,
    pub cards: Vec<Card>,
}

/// Decode a parsed payload. Unsupported payloads and actions are logged and skipped.
pub fn decode(envelope: &InboundEnvelope) -> InboundFragment {
    let mut out = InboundFragment::default();
    match envelope {
        InboundEnvelope::Text { text, actions } => {
            out.message_text = text.clone();
            out.buttons = postback_buttons(actions);
        }
        InboundEnvelope::Card { cards } => {
            out.cards = cards.iter().map(map_card).collect();
        }
        InboundEnvelope::Attachment { attachment } => {
            out.media.push(map_media(attachment));
        }
        InboundEnvelope::Unsupported { kind } => {
            log::debug!(
                "the '{}' message type is not supported yet",
                kind.as_deref().unwrap_or("undefined")
            );
        }
    }
    out
}

fn postback_buttons(actions: &[ActionRef]) -> Vec<Button> {
    actions
        .iter()
        .filter(|action| {
            if action.is_postback() {
                return true;
            }
            log::debug!(
                "the '{}' action type is not supported yet",
                action.kind().unwrap_or("undefined")
            );
            false
        })
        .map(map_button)
        .collect()
}

/// Button from an action: text from `title`, `text` or `label`; payload from `postback` or `data`.
pub fn map_button(action: &ActionRef) -> Button {
    match action {
        ActionRef::Plain(s) => Button {
            text: Some(s.clone()),
            payload: None,
        },
        ActionRef::Unsupported(_) => Button::default(),
        ActionRef::Structured(a) => {
            let text = [&a.title, &a.text, &a.label]
                .into_iter()
                .flatten()
                .find(|s| !s.is_empty())
                .cloned();
            let payload = a
                .postback
                .as_ref()
                .filter(|p| is_truthy(p))
                .or_else(|| a.data.as_ref().filter(|d| is_truthy(d)))
                .cloned()
                .map(map_button_payload);
            Button { text, payload }
        }
    }
}

fn map_button_payload(raw: Value) -> Value {
    let mut payload = decode_payload(raw);
    if let Value::Object(fields) = &mut payload {
        fields.remove(RESERVED_POSTBACK_KEY);
    }
    payload
}

/// Media from a bare URL or attachment object.
pub fn map_media(media: &MediaRef) -> Media {
    let uri = media.url().to_string();
    let (explicit, alt_text) = match media {
        MediaRef::Plain(_) => (None, Value::Bool(false)),
        MediaRef::Structured(a) => (
            a.kind.as_deref().filter(|k| k.contains('/')),
            a.profile.clone().unwrap_or(Value::Bool(false)),
        ),
    };
    let mime_type = explicit
        .map(str::to_string)
        .or_else(|| lookup_mime(&uri))
        .unwrap_or_else(|| UNKNOWN_MIME_TYPE.to_string());
    Media {
        media_uri: uri,
        mime_type: Some(mime_type),
        alt_text: Some(alt_text),
    }
}

/// Card with its image as single media entry and postback actions as buttons.
pub fn map_card(card: &CardPayload) -> Card {
    let content = [&card.content, &card.description]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned();
    let media = card
        .image_url
        .as_ref()
        .filter(|m| !m.url().is_empty())
        .map(|m| vec![map_media(m)]);
    let buttons = if card.actions.is_empty() {
        None
    } else {
        Some(postback_buttons(&card.actions))
    };
    Card {
        text: card.title.clone(),
        content,
        media,
        buttons,
    }
}

/// Mime type from the file extension of a URL, ignoring query and fragment.
pub fn lookup_mime(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string)
}

/// Response hook: decodes `sourceData.messagePayload` into the bot message.
#[derive(Debug, Clone, Default)]
pub struct InboundTranscoder;

impl ResponseHook for InboundTranscoder {
    fn on_response(&self, message: &mut BotMessage) {
        let envelope = match message.source_data.get(MESSAGE_PAYLOAD_FIELD) {
            Some(payload) => InboundEnvelope::from_value(payload),
            None => InboundEnvelope::Unsupported { kind: None },
        };
        let fragment = decode(&envelope);
        if fragment.message_text.is_some() {
            message.message_text = fragment.message_text;
        }
        message.buttons.extend(fragment.buttons);
        message.media.extend(fragment.media);
        message.cards.extend(fragment.cards);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UserMessage;
    use crate::transcode::outbound::encode;
    use serde_json::json;

    fn decode_value(v: Value) -> InboundFragment {
        decode(&InboundEnvelope::from_value(&v))
    }

    #[test]
    fn text_with_postback_action() {
        let out = decode_value(json!({
            "type": "text",
            "text": "hi",
            "actions": [{ "type": "postback", "title": "Yes", "data": "yes" }]
        }));
        assert_eq!(
            out,
            InboundFragment {
                message_text: Some("hi".into()),
                buttons: vec![Button {
                    text: Some("Yes".into()),
                    payload: Some(json!("yes")),
                }],
                media: vec![],
                cards: vec![],
            }
        );
    }

    #[test]
    fn malformed_actions_keep_text_and_valid_buttons() {
        let out = decode_value(json!({ "type": "text", "text": "hi", "actions": null }));
        assert_eq!(out.message_text.as_deref(), Some("hi"));
        assert!(out.buttons.is_empty());

        let out = decode_value(json!({
            "type": "text",
            "text": "hi",
            "actions": [{ "type": "postback", "title": "Yes", "data": "yes" }, 42]
        }));
        assert_eq!(out.message_text.as_deref(), Some("hi"));
        assert_eq!(
            out.buttons,
            vec![Button {
                text: Some("Yes".into()),
                payload: Some(json!("yes")),
            }]
        );
    }

    #[test]
    fn card_with_null_actions_is_kept() {
        let out = decode_value(json!({
            "type": "card",
            "cards": [{ "title": "A", "actions": null }, { "title": "B" }]
        }));
        assert_eq!(out.cards.len(), 2);
        assert_eq!(out.cards[0].text.as_deref(), Some("A"));
        assert_eq!(out.cards[0].buttons, None);
        assert_eq!(out.cards[1].text.as_deref(), Some("B"));
    }

    #[test]
    fn unsupported_actions_are_skipped() {
        let out = decode_value(json!({
            "type": "text",
            "text": "links",
            "actions": [
                { "type": "url", "label": "Docs", "url": "http://x" },
                { "type": "postback", "label": "Ok", "postback": { "action": "ok" } },
                { "type": "call", "label": "Call", "phoneNumber": "1" }
            ]
        }));
        assert_eq!(out.buttons.len(), 1);
        assert_eq!(out.buttons[0].text.as_deref(), Some("Ok"));
        assert_eq!(out.buttons[0].payload, Some(json!({ "action": "ok" })));
    }

    #[test]
    fn button_text_fallback_chain() {
        let action: ActionRef = serde_json::from_value(json!({
            "type": "postback", "title": "", "text": "", "label": "Label"
        }))
        .unwrap();
        let b = map_button(&action);
        assert_eq!(b.text.as_deref(), Some("Label"));
        assert_eq!(b.payload, None);

        let b = map_button(&ActionRef::Plain("Bare".into()));
        assert_eq!(b.text.as_deref(), Some("Bare"));
        assert_eq!(b.payload, None);
    }

    #[test]
    fn reserved_key_stripped_from_postback() {
        let with_object: ActionRef = serde_json::from_value(json!({
            "type": "postback",
            "label": "Order",
            "postback": { "variables": { "size": "L" }, "system.botId": "B1" }
        }))
        .unwrap();
        assert_eq!(
            map_button(&with_object).payload,
            Some(json!({ "variables": { "size": "L" } }))
        );

        let with_string: ActionRef = serde_json::from_value(json!({
            "type": "postback",
            "label": "Order",
            "postback": r#"{"action":"order","system.botId":"B1"}"#
        }))
        .unwrap();
        assert_eq!(
            map_button(&with_string).payload,
            Some(json!({ "action": "order" }))
        );
    }

    #[test]
    fn attachment_becomes_media() {
        let out = decode_value(json!({
            "type": "attachment",
            "attachment": { "type": "image/jpeg", "url": "http://x/z.jpg" }
        }));
        assert_eq!(out.message_text, None);
        assert!(out.buttons.is_empty());
        assert!(out.cards.is_empty());
        assert_eq!(
            serde_json::to_value(&out.media).unwrap(),
            json!([{ "mediaUri": "http://x/z.jpg", "mimeType": "image/jpeg", "altText": false }])
        );
    }

    #[test]
    fn media_mime_resolution() {
        let m = map_media(&MediaRef::Plain("http://x/z.jpg".into()));
        assert_eq!(m.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(m.alt_text, Some(json!(false)));

        let m = map_media(&MediaRef::Plain("http://x/clip.mp4?sig=abc#t=1".into()));
        assert_eq!(m.mime_type.as_deref(), Some("video/mp4"));

        let m = map_media(&MediaRef::Plain("http://x/blob".into()));
        assert_eq!(m.mime_type.as_deref(), Some(UNKNOWN_MIME_TYPE));

        let structured: MediaRef = serde_json::from_value(json!({
            "type": "image", "url": "http://x/pic.png", "profile": "A picture"
        }))
        .unwrap();
        let m = map_media(&structured);
        assert_eq!(m.mime_type.as_deref(), Some("image/png"));
        assert_eq!(m.alt_text, Some(json!("A picture")));
    }

    #[test]
    fn card_list_mapping() {
        let out = decode_value(json!({
            "type": "card",
            "cards": [
                {
                    "title": "Pizza",
                    "description": "Cheesy",
                    "imageUrl": "http://x/pizza.png",
                    "actions": [{ "type": "postback", "label": "Order", "postback": "order" }]
                },
                { "title": "Pasta", "content": "Al dente" }
            ]
        }));
        assert_eq!(out.cards.len(), 2);

        let first = &out.cards[0];
        assert_eq!(first.text.as_deref(), Some("Pizza"));
        assert_eq!(first.content.as_deref(), Some("Cheesy"));
        assert_eq!(first.buttons.as_ref().map(Vec::len), Some(1));
        let media = first.media.as_ref().expect("card media");
        assert_eq!(media[0].media_uri, "http://x/pizza.png");
        assert_eq!(media[0].mime_type.as_deref(), Some("image/png"));

        let second = serde_json::to_value(&out.cards[1]).unwrap();
        assert!(second.get("buttons").is_none());
        assert!(second.get("media").is_none());
        assert_eq!(second["content"], json!("Al dente"));
    }

    #[test]
    fn card_with_only_unsupported_actions_has_empty_buttons() {
        let card: CardPayload = serde_json::from_value(json!({
            "title": "Docs",
            "actions": [{ "type": "url", "url": "http://x" }]
        }))
        .unwrap();
        assert_eq!(map_card(&card).buttons, Some(vec![]));
    }

    // Unrecognized payloads are dropped on purpose: the harness sees an empty message.
    #[test]
    fn unsupported_type_yields_empty_message() {
        let mut msg = BotMessage::from_source(json!({
            "userId": "conv-1",
            "messagePayload": { "type": "location", "location": { "latitude": 1 } }
        }));
        InboundTranscoder.on_response(&mut msg);
        assert!(msg.is_empty());

        let mut msg = BotMessage::from_source(json!({ "userId": "conv-1" }));
        InboundTranscoder.on_response(&mut msg);
        assert!(msg.is_empty());
    }

    #[test]
    fn outbound_text_echoes_back() {
        let sent = serde_json::to_value(encode(&UserMessage::text("round trip"))).unwrap();
        let mut msg = BotMessage::from_source(json!({ "messagePayload": sent }));
        InboundTranscoder.on_response(&mut msg);
        assert_eq!(msg.message_text.as_deref(), Some("round trip"));
    }
}
