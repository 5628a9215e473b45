//! Oracle Digital Assistant webhook connector: transcodes harness messages into
//! signed webhook calls and provider callbacks back into harness messages.

pub mod config;
pub mod connector;
pub mod delegate;
pub mod envelope;
pub mod error;
pub mod message;
pub mod signature;
pub mod transcode;

pub use config::{Caps, ConnectorConfig};
pub use connector::Connector;
pub use error::ConnectorError;
pub use message::{BotMessage, Button, Card, Media, UserMessage};
