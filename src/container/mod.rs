mod registry;
mod sweeper;
mod websocket;

pub use registry::Registry;
pub use sweeper::Sweeper;
pub use websocket::WebSocket;

// config -> registry -> sweeper, websocket
