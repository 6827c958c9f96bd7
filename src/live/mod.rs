//! Server-held views pushed to the browser over one multiplexed WebSocket.
//!
//! A page embeds mounted views as `data-spark-view` placeholders; the browser
//! subscribes to each over a single socket, sends events, and receives
//! re-rendered fragments as `{id, content}` frames.

mod channel;
mod component;
mod multiplexer;
mod pool;
mod registry;
mod router;
#[cfg(test)]
mod testing;
mod view;
pub mod wire;

pub use channel::{
    drive, Channel, Outgoing, Socket, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_NO_STATUS,
    DEFAULT_OUTBOX_CAPACITY,
};
pub use component::{Component, ComponentId, Context, Event};
pub use multiplexer::Multiplexer;
pub use pool::{Pool, Recycle};
pub use registry::{ComponentRegistry, DEFAULT_MAX_POOL_SIZE};
pub use router::{ChannelFactory, Router};
pub use view::{AnyView, View};
