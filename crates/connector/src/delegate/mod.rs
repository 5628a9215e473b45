//! REST delegate contract and the configuration the connector hands to it.
//!
//! The delegate owns HTTP transport, conversation ids and inbound routing. The connector
//! plugs into it through two hooks (request and response) and a correlation selector.

mod server;
mod webhook;

pub use server::inbound_router;
pub use webhook::WebhookDelegate;

use crate::config::{Caps, ConnectorConfig};
use crate::error::ConnectorError;
use crate::message::{BotMessage, UserMessage};
use crate::signature::Signer;
use crate::transcode::{InboundTranscoder, OutboundTranscoder};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Prefix shared by all delegate capability keys.
pub const SIMPLEREST_PREFIX: &str = "SIMPLEREST";

pub const SIMPLEREST_URL: &str = "SIMPLEREST_URL";
pub const SIMPLEREST_METHOD: &str = "SIMPLEREST_METHOD";
pub const SIMPLEREST_BODY_TEMPLATE: &str = "SIMPLEREST_BODY_TEMPLATE";
pub const SIMPLEREST_REQUEST_HOOK: &str = "SIMPLEREST_REQUEST_HOOK";
pub const SIMPLEREST_RESPONSE_HOOK: &str = "SIMPLEREST_RESPONSE_HOOK";
pub const SIMPLEREST_INBOUND_SELECTOR_JSONPATH: &str = "SIMPLEREST_INBOUND_SELECTOR_JSONPATH";
pub const SIMPLEREST_INBOUND_SELECTOR_VALUE: &str = "SIMPLEREST_INBOUND_SELECTOR_VALUE";
pub const SIMPLEREST_TIMEOUT: &str = "SIMPLEREST_TIMEOUT";
pub const SIMPLEREST_HEADERS_TEMPLATE: &str = "SIMPLEREST_HEADERS_TEMPLATE";

/// Keys the connector always sets; callers cannot override them.
const OWNED_KEYS: [&str; 7] = [
    SIMPLEREST_URL,
    SIMPLEREST_METHOD,
    SIMPLEREST_BODY_TEMPLATE,
    SIMPLEREST_REQUEST_HOOK,
    SIMPLEREST_RESPONSE_HOOK,
    SIMPLEREST_INBOUND_SELECTOR_JSONPATH,
    SIMPLEREST_INBOUND_SELECTOR_VALUE,
];

/// Placeholder replaced with the active conversation id in templates.
pub const CONVERSATION_ID_PLACEHOLDER: &str = "{{botium.conversationId}}";

/// JSONPath of the correlation id in an inbound event (`{"body": <posted json>}`).
pub const INBOUND_SELECTOR_JSONPATH: &str = "$.body.userId";

/// Webhook body template: correlation id plus the payload container the request hook fills.
pub fn body_template() -> Value {
    json!({
        "userId": CONVERSATION_ID_PLACEHOLDER,
        "messagePayload": {}
    })
}

/// Per-call data passed to the request hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub conversation_id: String,
}

/// Request about to be sent by the delegate. `body_bytes` is the only serialization used,
/// for signing and for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>, method: Method, body: Value) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn body_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.body)
    }
}

/// Called by the delegate once per outbound send, before the request leaves.
pub trait RequestHook: Send + Sync {
    fn on_request(
        &self,
        request: &mut OutboundRequest,
        message: &UserMessage,
        context: &HookContext,
    ) -> Result<(), ConnectorError>;
}

/// Called by the delegate once per accepted inbound payload.
pub trait ResponseHook: Send + Sync {
    fn on_response(&self, message: &mut BotMessage);
}

/// Matches inbound events to the active conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSelector {
    pub json_path: String,
    pub value_template: String,
}

impl InboundSelector {
    /// First value matched by `json_path` in `event`. An invalid path matches nothing.
    pub fn select<'a>(&self, event: &'a Value) -> Option<&'a Value> {
        match jsonpath_lib::select(event, &self.json_path) {
            Ok(matches) => matches.into_iter().next(),
            Err(e) => {
                log::warn!("invalid inbound selector {}: {:?}", self.json_path, e);
                None
            }
        }
    }

    /// True if the selected value equals the rendered template for `conversation_id`.
    pub fn matches(&self, event: &Value, conversation_id: &str) -> bool {
        let expected = self
            .value_template
            .replace(CONVERSATION_ID_PLACEHOLDER, conversation_id);
        match self.select(event) {
            Some(Value::String(s)) => *s == expected,
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string() == expected,
            _ => false,
        }
    }
}

/// Everything the delegate needs: target, method, body template, hooks, correlation and
/// passthrough options. Built once per connector.
#[derive(Clone)]
pub struct DelegateConfig {
    pub url: String,
    pub method: Method,
    pub body_template: Value,
    pub request_hook: Arc<dyn RequestHook>,
    pub response_hook: Arc<dyn ResponseHook>,
    pub inbound_selector: InboundSelector,
    /// Caller-supplied `SIMPLEREST*` options the connector does not set itself.
    pub options: Caps,
}

impl fmt::Debug for DelegateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateConfig")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("body_template", &self.body_template)
            .field("inbound_selector", &self.inbound_selector)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DelegateConfig {
    /// Build from caller capabilities. Fails on a missing webhook URL or secret.
    pub fn build(caps: &Caps) -> Result<Self, ConnectorError> {
        let ConnectorConfig {
            webhook_url,
            webhook_secret,
        } = ConnectorConfig::from_caps(caps)?;
        let signer = Signer::new(&webhook_secret)?;

        let options: Caps = caps
            .iter()
            .filter(|(k, _)| k.starts_with(SIMPLEREST_PREFIX) && !OWNED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let ignored: Vec<&str> = caps
            .keys()
            .map(String::as_str)
            .filter(|k| OWNED_KEYS.contains(k))
            .collect();
        if !ignored.is_empty() {
            log::warn!("ignoring capabilities set by the connector: {}", ignored.join(", "));
        }

        Ok(Self {
            url: webhook_url,
            method: Method::POST,
            body_template: body_template(),
            request_hook: Arc::new(OutboundTranscoder::new(signer)),
            response_hook: Arc::new(InboundTranscoder),
            inbound_selector: InboundSelector {
                json_path: INBOUND_SELECTOR_JSONPATH.to_string(),
                value_template: CONVERSATION_ID_PLACEHOLDER.to_string(),
            },
            options,
        })
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Body template with the conversation id filled in.
    pub fn render_body(&self, conversation_id: &str) -> Value {
        let mut body = self.body_template.clone();
        fill_placeholders(&mut body, conversation_id);
        body
    }
}

fn fill_placeholders(value: &mut Value, conversation_id: &str) {
    match value {
        Value::String(s) if s.contains(CONVERSATION_ID_PLACEHOLDER) => {
            *s = s.replace(CONVERSATION_ID_PLACEHOLDER, conversation_id);
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|v| fill_placeholders(v, conversation_id)),
        Value::Object(fields) => fields
            .values_mut()
            .for_each(|v| fill_placeholders(v, conversation_id)),
        _ => {}
    }
}

/// The REST transport the connector delegates to. Lifecycle methods mirror the harness's
/// container lifecycle.
#[async_trait]
pub trait RestDelegate: Send + Sync {
    async fn validate(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
    async fn build(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
    async fn start(&self) -> Result<(), ConnectorError>;
    async fn user_says(&self, message: &UserMessage) -> Result<(), ConnectorError>;
    /// Inbound provider callback body. Returns false if it did not belong to this conversation.
    async fn receive(&self, body: Value) -> Result<bool, ConnectorError>;
    async fn stop(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
    async fn clean(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{sign, SIGNATURE_HEADER};

    fn caps(v: Value) -> Caps {
        v.as_object().cloned().expect("object")
    }

    fn base_caps() -> Caps {
        caps(json!({
            "ORACLE_WEBHOOK_URL": "https://oda.example/connectors/v2/listeners/webhook/channels/abc",
            "ORACLE_WEBHOOK_SECRET": "s3cret"
        }))
    }

    #[test]
    fn build_sets_fixed_defaults() {
        let config = DelegateConfig::build(&base_caps()).unwrap();
        assert_eq!(
            config.url,
            "https://oda.example/connectors/v2/listeners/webhook/channels/abc"
        );
        assert_eq!(config.method, Method::POST);
        assert_eq!(
            config.body_template,
            json!({ "userId": "{{botium.conversationId}}", "messagePayload": {} })
        );
        assert_eq!(config.inbound_selector.json_path, "$.body.userId");
        assert!(config.options.is_empty());
    }

    #[test]
    fn build_fails_without_url_or_secret() {
        let mut c = base_caps();
        c.remove("ORACLE_WEBHOOK_URL");
        assert!(matches!(
            DelegateConfig::build(&c),
            Err(ConnectorError::MissingCapability("ORACLE_WEBHOOK_URL"))
        ));

        let mut c = base_caps();
        c.insert("ORACLE_WEBHOOK_SECRET".into(), json!(""));
        assert!(matches!(
            DelegateConfig::build(&c),
            Err(ConnectorError::MissingCapability("ORACLE_WEBHOOK_SECRET"))
        ));
    }

    #[test]
    fn passthrough_options_never_override_owned_keys() {
        let mut c = base_caps();
        c.insert(SIMPLEREST_TIMEOUT.into(), json!(3000));
        c.insert(SIMPLEREST_METHOD.into(), json!("GET"));
        c.insert(SIMPLEREST_URL.into(), json!("http://evil.example"));
        c.insert("OTHER_CAP".into(), json!("x"));
        let config = DelegateConfig::build(&c).unwrap();

        assert_eq!(config.method, Method::POST);
        assert!(config.url.starts_with("https://oda.example"));
        assert_eq!(config.option(SIMPLEREST_TIMEOUT), Some(&json!(3000)));
        assert_eq!(config.option(SIMPLEREST_METHOD), None);
        assert_eq!(config.option("OTHER_CAP"), None);
        assert_eq!(config.options.len(), 1);
    }

    #[test]
    fn render_body_fills_conversation_id() {
        let config = DelegateConfig::build(&base_caps()).unwrap();
        assert_eq!(
            config.render_body("conv-\"1\""),
            json!({ "userId": "conv-\"1\"", "messagePayload": {} })
        );
    }

    #[test]
    fn built_request_hook_signs_the_sent_body() {
        let config = DelegateConfig::build(&base_caps()).unwrap();
        let mut request = OutboundRequest::new(
            config.url.clone(),
            config.method.clone(),
            config.render_body("conv-1"),
        );
        config
            .request_hook
            .on_request(
                &mut request,
                &UserMessage::text("hello"),
                &HookContext {
                    conversation_id: "conv-1".into(),
                },
            )
            .unwrap();
        let bytes = request.body_bytes().unwrap();
        assert_eq!(
            request.headers.get(SIGNATURE_HEADER).map(String::as_str),
            Some(sign(&bytes, "s3cret").unwrap().as_str())
        );
    }

    #[test]
    fn built_response_hook_decodes_payload() {
        let config = DelegateConfig::build(&base_caps()).unwrap();
        let mut msg = BotMessage::from_source(json!({
            "userId": "conv-1",
            "messagePayload": { "type": "text", "text": "Welcome" }
        }));
        config.response_hook.on_response(&mut msg);
        assert_eq!(msg.message_text.as_deref(), Some("Welcome"));
    }

    #[test]
    fn selector_matches_conversation() {
        let selector = InboundSelector {
            json_path: INBOUND_SELECTOR_JSONPATH.into(),
            value_template: CONVERSATION_ID_PLACEHOLDER.into(),
        };
        let event = json!({ "body": { "userId": "conv-1", "messagePayload": {} } });
        assert!(selector.matches(&event, "conv-1"));
        assert!(!selector.matches(&event, "conv-2"));
        assert!(!selector.matches(&json!({ "body": {} }), "conv-1"));
    }

    #[test]
    fn selector_paths() {
        let event = json!({ "body": { "userId": "conv-1", "items": [{ "id": 7 }, { "id": 8 }] } });
        let selector = |path: &str| InboundSelector {
            json_path: path.into(),
            value_template: "8".into(),
        };
        assert_eq!(selector("$.body.items[1].id").select(&event), Some(&json!(8)));
        assert!(selector("$.body.items[1].id").matches(&event, "ignored"));
        assert_eq!(
            selector("$['body']['userId']").select(&event),
            Some(&json!("conv-1"))
        );
        assert_eq!(selector("$.body.missing").select(&event), None);
    }

    #[test]
    fn bracket_notation_selector_correlates() {
        let selector = InboundSelector {
            json_path: "$['body']['userId']".into(),
            value_template: CONVERSATION_ID_PLACEHOLDER.into(),
        };
        let event = json!({ "body": { "userId": "conv-1" } });
        assert!(selector.matches(&event, "conv-1"));
        assert!(!selector.matches(&event, "conv-2"));
    }
}
