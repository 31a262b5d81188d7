use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix the WhatsApp channel puts in front of sender numbers.
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// One inbound message, extracted from the provider's form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender identity with any channel prefix removed.
    pub sender: String,
    pub body: String,
}

impl InboundMessage {
    /// Build from the raw form. `From` and `Body` are required.
    pub fn from_form(form: &BTreeMap<String, String>) -> Option<Self> {
        let from = form.get("From")?;
        let body = form.get("Body")?;
        let sender = from
            .strip_prefix(WHATSAPP_PREFIX)
            .unwrap_or(from)
            .trim()
            .to_string();
        if sender.is_empty() {
            return None;
        }
        Some(Self {
            sender,
            body: body.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}
