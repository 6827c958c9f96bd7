//! JSON frames exchanged with the browser.
//!
//! ```text
//! -> {"subscribe": "<id>"}
//! -> {"event": "<name>", "channel": "<id>", "data": "<json>"}
//! <- {"id": "<id>", "content": "<html>"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    live::{ComponentId, Event},
    Error,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Subscribe { id: String },
    Event { channel: String, event: Event },
}

#[derive(Deserialize)]
struct Frame {
    subscribe: Option<String>,
    event: Option<String>,
    channel: Option<String>,
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct Update<'a> {
    pub id: &'a ComponentId,
    pub content: &'a str,
}

pub fn decode(text: &str) -> crate::Result<ClientMessage> {
    let frame = serde_json::from_str::<Frame>(text)?;

    if let Some(id) = frame.subscribe {
        return Ok(ClientMessage::Subscribe { id });
    }

    match (frame.event, frame.channel, frame.data) {
        (Some(name), Some(channel), Some(data)) => {
            // Clients are expected to send a string; anything else is kept
            // in its JSON form.
            let data = match data {
                Value::String(data) => data,
                other => other.to_string(),
            };

            Ok(ClientMessage::Event {
                channel,
                event: Event { name, data },
            })
        }
        (Some(name), _, _) => Err(Error::Malformed(format!(
            "event {name} without channel or data"
        ))),
        _ => Err(Error::Malformed("neither subscribe nor event".to_string())),
    }
}

pub fn encode(update: &Update<'_>) -> crate::Result<String> {
    Ok(serde_json::to_string(update)?)
}
