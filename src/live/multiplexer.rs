use std::{collections::HashSet, sync::Arc};

use crate::{
    live::{
        wire::{self, ClientMessage},
        Channel, ComponentId, ComponentRegistry, Event, Socket,
    },
    none_to_continue,
};

/// Serves the subscribe/event protocol for every view bound to one socket.
pub struct Multiplexer {
    registry: ComponentRegistry,
    socket: Arc<Socket>,
    subscribed: HashSet<ComponentId>,
}

impl Multiplexer {
    pub fn new(registry: ComponentRegistry, socket: Arc<Socket>) -> Self {
        Self {
            registry,
            socket,
            subscribed: HashSet::new(),
        }
    }

    pub fn subscribed(&self) -> &HashSet<ComponentId> {
        &self.subscribed
    }

    fn subscribe(&mut self, id: String) {
        let view = match self.registry.lookup(&id) {
            Some(view) => view,
            None => {
                log::debug!("subscribe;unknown;id={id};socket={}", self.socket.id());
                return;
            }
        };

        self.subscribed.insert(view.id().clone());

        log::debug!("subscribe;id={id};socket={}", self.socket.id());

        if let Err(err) = view.attach(&self.socket) {
            log::error!("subscribe;socket={};{err}", self.socket.id());
        }
    }

    fn dispatch(&mut self, channel: String, event: Event) {
        let view = match self.registry.lookup(&channel) {
            Some(view) => view,
            None => {
                log::debug!("event;unknown;id={channel};event={}", event.name);
                return;
            }
        };

        if let Err(err) = view.dispatch(&event) {
            log::error!("event;socket={};{err}", self.socket.id());
        }
    }
}

#[async_trait::async_trait]
impl Channel for Multiplexer {
    async fn on_connect(&mut self) {
        log::debug!("connect;socket={}", self.socket.id());
    }

    async fn on_message(&mut self, text: String) {
        match wire::decode(&text) {
            Ok(ClientMessage::Subscribe { id }) => self.subscribe(id),
            Ok(ClientMessage::Event { channel, event }) => self.dispatch(channel, event),
            Err(err) => log::warn!("message;socket={};{err}", self.socket.id()),
        }
    }

    async fn on_close(&mut self, code: u16, message: String) {
        log::debug!(
            "close;socket={};code={code};message={message};subscribed={}",
            self.socket.id(),
            self.subscribed.len()
        );

        for id in self.subscribed.drain() {
            let view = none_to_continue!(self.registry.lookup(id.as_str()));

            // Rebound to a newer connection, which owns it now.
            if !view.is_bound_to(&self.socket) {
                continue;
            }

            self.registry.unmount(id.as_str());
        }
    }
}
