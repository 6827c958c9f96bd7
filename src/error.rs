use async_tungstenite::tungstenite;

use crate::live::ComponentId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate component id: {0}")]
    Duplicate(ComponentId),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Handler: {0}")]
    Handler(String),

    #[error("Render: {0}")]
    Render(String),

    #[error("Component was unmounted: {0}")]
    Retired(ComponentId),

    #[error("Socket closed")]
    Closed,

    #[error("Outbound queue is full")]
    Overflow,

    #[error("Json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Turns a caught panic payload into a printable message.
    pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
        if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panicked".to_string()
        }
    }
}
