//! Reference REST delegate: posts signed webhook calls with reqwest and routes provider
//! callbacks for the active conversation to the harness queue.

use crate::config::cap_str;
use crate::delegate::{
    DelegateConfig, HookContext, OutboundRequest, RestDelegate, CONVERSATION_ID_PLACEHOLDER,
    SIMPLEREST_HEADERS_TEMPLATE, SIMPLEREST_TIMEOUT,
};
use crate::error::ConnectorError;
use crate::message::{BotMessage, UserMessage};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Webhook delegate for one harness container.
pub struct WebhookDelegate {
    config: Arc<DelegateConfig>,
    client: reqwest::Client,
    bot_says: mpsc::Sender<BotMessage>,
    conversation_id: RwLock<Option<String>>,
}

impl WebhookDelegate {
    pub fn new(config: Arc<DelegateConfig>, bot_says: mpsc::Sender<BotMessage>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            bot_says,
            conversation_id: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Arc<DelegateConfig> {
        &self.config
    }

    /// Id of the running conversation, if started.
    pub async fn conversation_id(&self) -> Option<String> {
        self.conversation_id.read().await.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        cap_str(&self.config.options, SIMPLEREST_TIMEOUT)
            .and_then(|t| t.parse::<u64>().ok())
            .map(Duration::from_millis)
    }

    /// Extra headers from `SIMPLEREST_HEADERS_TEMPLATE` (JSON object, or a string holding one).
    fn extra_headers(&self, conversation_id: &str) -> Vec<(String, String)> {
        let parsed;
        let template = match self.config.option(SIMPLEREST_HEADERS_TEMPLATE) {
            Some(Value::String(s)) => {
                parsed = serde_json::from_str::<Value>(s).unwrap_or_else(|e| {
                    log::warn!("{} is not valid JSON: {}", SIMPLEREST_HEADERS_TEMPLATE, e);
                    Value::Null
                });
                &parsed
            }
            Some(v) => v,
            None => return Vec::new(),
        };
        let Some(fields) = template.as_object() else {
            return Vec::new();
        };
        fields
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (
                    k.clone(),
                    value.replace(CONVERSATION_ID_PLACEHOLDER, conversation_id),
                )
            })
            .collect()
    }
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

#[async_trait]
impl RestDelegate for WebhookDelegate {
    async fn start(&self) -> Result<(), ConnectorError> {
        let id = uuid::Uuid::new_v4().to_string();
        log::info!("webhook delegate: conversation {} started", id);
        *self.conversation_id.write().await = Some(id);
        Ok(())
    }

    async fn user_says(&self, message: &UserMessage) -> Result<(), ConnectorError> {
        let conversation_id = self
            .conversation_id()
            .await
            .ok_or(ConnectorError::NotStarted)?;
        let mut request = OutboundRequest::new(
            self.config.url.clone(),
            self.config.method.clone(),
            self.config.render_body(&conversation_id),
        );
        request.headers.extend(self.extra_headers(&conversation_id));
        let context = HookContext { conversation_id };
        self.config
            .request_hook
            .on_request(&mut request, message, &context)?;

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .body(request.body_bytes()?);
        if !has_header(&request.headers, CONTENT_TYPE.as_str()) {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        let res = builder.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ConnectorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        log::debug!(
            "webhook delegate: posted message for conversation {}",
            context.conversation_id
        );
        Ok(())
    }

    async fn receive(&self, body: Value) -> Result<bool, ConnectorError> {
        let Some(conversation_id) = self.conversation_id().await else {
            log::debug!("webhook delegate: inbound payload before start, ignored");
            return Ok(false);
        };
        let event = json!({ "body": body });
        if !self
            .config
            .inbound_selector
            .matches(&event, &conversation_id)
        {
            log::debug!("webhook delegate: inbound payload for another conversation, ignored");
            return Ok(false);
        }
        let mut message = BotMessage::from_source(event["body"].clone());
        self.config.response_hook.on_response(&mut message);
        self.bot_says
            .send(message)
            .await
            .map_err(|_| ConnectorError::QueueClosed)?;
        Ok(true)
    }

    async fn stop(&self) -> Result<(), ConnectorError> {
        if let Some(id) = self.conversation_id.write().await.take() {
            log::info!("webhook delegate: conversation {} stopped", id);
        }
        Ok(())
    }
}
