//! Message transcoding between harness messages and provider payloads.
//!
//! `outbound` turns a [`UserMessage`](crate::message::UserMessage) into a signed webhook
//! body; `inbound` turns a provider callback into a [`BotMessage`](crate::message::BotMessage).

pub mod inbound;
pub mod outbound;

pub use inbound::{decode, InboundFragment, InboundTranscoder};
pub use outbound::{encode, OutboundTranscoder};
