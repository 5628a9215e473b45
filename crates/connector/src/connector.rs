//! Connector lifecycle: validates capabilities, builds the delegate configuration once and
//! forwards harness lifecycle calls to the delegate.

use crate::config::{Caps, ConnectorConfig};
use crate::delegate::{DelegateConfig, RestDelegate, WebhookDelegate};
use crate::error::ConnectorError;
use crate::message::{BotMessage, UserMessage};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Creates the delegate from the built configuration and the harness's bot-says queue.
pub type DelegateFactory = Box<
    dyn Fn(Arc<DelegateConfig>, mpsc::Sender<BotMessage>) -> Arc<dyn RestDelegate> + Send + Sync,
>;

/// Oracle Digital Assistant webhook connector for one harness container.
pub struct Connector {
    caps: Caps,
    bot_says: mpsc::Sender<BotMessage>,
    factory: DelegateFactory,
    delegate_config: Option<Arc<DelegateConfig>>,
    delegate: Option<Arc<dyn RestDelegate>>,
}

impl Connector {
    /// Connector backed by [`WebhookDelegate`].
    pub fn new(caps: Caps, bot_says: mpsc::Sender<BotMessage>) -> Self {
        Self::with_delegate_factory(
            caps,
            bot_says,
            Box::new(
                |config: Arc<DelegateConfig>,
                 bot_says: mpsc::Sender<BotMessage>|
                 -> Arc<dyn RestDelegate> {
                    Arc::new(WebhookDelegate::new(config, bot_says))
                },
            ),
        )
    }

    pub fn with_delegate_factory(
        caps: Caps,
        bot_says: mpsc::Sender<BotMessage>,
        factory: DelegateFactory,
    ) -> Self {
        Self {
            caps,
            bot_says,
            factory,
            delegate_config: None,
            delegate: None,
        }
    }

    /// Check required capabilities and build the delegate on first call; later calls reuse it.
    pub async fn validate(&mut self) -> Result<(), ConnectorError> {
        log::debug!("validate called");
        if self.delegate.is_some() {
            ConnectorConfig::from_caps(&self.caps)?;
        } else {
            let config = Arc::new(DelegateConfig::build(&self.caps)?);
            log::debug!("delegate config: {:?}", config);
            self.delegate = Some((self.factory)(config.clone(), self.bot_says.clone()));
            self.delegate_config = Some(config);
            log::info!("webhook delegate built");
        }

        self.delegate()?.validate().await
    }

    /// Built delegate configuration (after `validate`).
    pub fn delegate_config(&self) -> Option<&Arc<DelegateConfig>> {
        self.delegate_config.as_ref()
    }

    /// Delegate handle, e.g. for mounting [`inbound_router`](crate::delegate::inbound_router).
    pub fn delegate(&self) -> Result<Arc<dyn RestDelegate>, ConnectorError> {
        self.delegate.clone().ok_or(ConnectorError::NotValidated)
    }

    pub async fn build(&self) -> Result<(), ConnectorError> {
        self.delegate()?.build().await
    }

    pub async fn start(&self) -> Result<(), ConnectorError> {
        self.delegate()?.start().await
    }

    pub async fn user_says(&self, message: &UserMessage) -> Result<(), ConnectorError> {
        self.delegate()?.user_says(message).await
    }

    /// Hand an inbound provider callback body to the delegate.
    pub async fn receive(&self, body: Value) -> Result<bool, ConnectorError> {
        self.delegate()?.receive(body).await
    }

    pub async fn stop(&self) -> Result<(), ConnectorError> {
        self.delegate()?.stop().await
    }

    pub async fn clean(&self) -> Result<(), ConnectorError> {
        self.delegate()?.clean().await
    }
}
