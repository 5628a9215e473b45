//! Capabilities and connector configuration.
//!
//! Capabilities are loaded from the harness config file (`botium.json` by default) and
//! environment. Only the webhook URL and secret are read by the connector itself; keys
//! with the `SIMPLEREST` prefix are handed through to the REST delegate.

use crate::error::ConnectorError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

/// Capability map as found under `botium.Capabilities`.
pub type Caps = serde_json::Map<String, Value>;

/// Webhook URL the connector posts user messages to.
pub const ORACLE_WEBHOOK_URL: &str = "ORACLE_WEBHOOK_URL";
/// Shared secret used for the `X-Hub-Signature` header.
pub const ORACLE_WEBHOOK_SECRET: &str = "ORACLE_WEBHOOK_SECRET";

/// Required connector settings resolved from capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    pub webhook_url: String,
    pub webhook_secret: String,
}

impl ConnectorConfig {
    /// Resolve the required capabilities. Missing or blank values are configuration errors.
    pub fn from_caps(caps: &Caps) -> Result<Self, ConnectorError> {
        let webhook_url = cap_str(caps, ORACLE_WEBHOOK_URL)
            .ok_or(ConnectorError::MissingCapability(ORACLE_WEBHOOK_URL))?;
        let webhook_secret = cap_str(caps, ORACLE_WEBHOOK_SECRET)
            .ok_or(ConnectorError::MissingCapability(ORACLE_WEBHOOK_SECRET))?;
        Ok(Self {
            webhook_url,
            webhook_secret,
        })
    }
}

/// Read a capability as a string. Strings are trimmed and must be non-empty; numbers and
/// booleans are rendered as their JSON text.
pub fn cap_str(caps: &Caps, key: &str) -> Option<String> {
    match caps.get(key)? {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
        _ => None,
    }
}

/// Resolve config path from env or default.
pub fn default_caps_path() -> PathBuf {
    std::env::var("BOTIUM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("botium.json"))
}

/// Load capabilities from the harness config file (or BOTIUM_CONFIG). Missing file => empty caps.
/// The webhook URL and secret env vars override file values when set.
/// Returns the caps and the path that was used.
pub fn load_caps(path: Option<PathBuf>) -> Result<(Caps, PathBuf)> {
    let path = path.unwrap_or_else(default_caps_path);
    let mut caps = if !path.exists() {
        log::debug!("caps file not found, using empty caps: {}", path.display());
        Caps::new()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading caps from {}", path.display()))?;
        let root: Value = serde_json::from_str(&s)
            .with_context(|| format!("parsing caps from {}", path.display()))?;
        caps_from_document(root)
    };
    for key in [ORACLE_WEBHOOK_URL, ORACLE_WEBHOOK_SECRET] {
        if let Some(v) = env_override(key) {
            caps.insert(key.to_string(), Value::String(v));
        }
    }
    Ok((caps, path))
}

/// Extract `botium.Capabilities` from a config document. Anything else yields empty caps.
fn caps_from_document(root: Value) -> Caps {
    match root {
        Value::Object(mut doc) => match doc.remove("botium") {
            Some(Value::Object(mut botium)) => match botium.remove("Capabilities") {
                Some(Value::Object(caps)) => caps,
                _ => Caps::new(),
            },
            _ => Caps::new(),
        },
        _ => Caps::new(),
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}
