use std::net::SocketAddr;

use async_tungstenite::{
    tokio::accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use sai::{Component, ComponentLifecycle, Injected};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
};

use crate::{
    config::Config,
    container,
    live::{drive, ChannelFactory, Multiplexer, Router, Socket},
};

/// # WebSocket
///
/// Accepts upgrades on the configured address and hands every connection to
/// the channel registered for its path, one task per connection.
#[derive(Component)]
#[lifecycle]
pub struct WebSocket {
    #[injected]
    config: Injected<Config>,

    #[injected]
    registry: Injected<container::Registry>,

    tx: Option<mpsc::Sender<()>>,
    rx: Option<oneshot::Receiver<()>>,
}

#[async_trait::async_trait]
impl ComponentLifecycle for WebSocket {
    async fn start(&mut self) {
        let (stop_sender, rx) = oneshot::channel();
        let (tx, mut stop_receiver) = mpsc::channel(1);

        self.tx.replace(tx);
        self.rx.replace(rx);

        let addr = self.config.addr();
        let capacity = self.config.outbox_capacity();
        let components = self.registry.components();

        let router = Router::new().route(self.config.live_path(), move |socket| {
            Multiplexer::new(components.clone(), socket)
        });

        let listener = TcpListener::bind(addr)
            .await
            .unwrap_or_else(|err| panic!("bind websocket listener on {addr}: {err}"));

        log::info!("websocket;listen;addr={addr}");

        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = stop_receiver.recv() => {
                        break;
                    }
                    accepted = listener.accept() => {
                        accepted
                    }
                };

                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        log::warn!("websocket;accept;{err}");
                        continue;
                    }
                };

                let router = router.clone();

                tokio::spawn(async move {
                    if let Err(err) = handle_connection(router, capacity, peer, stream).await {
                        log::warn!("websocket;peer={peer};{err}");
                    }
                });
            }

            log::debug!("shutdown_websocket");

            let _ = stop_sender.send(());
        });
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(rx) = self.rx.take() {
            let _ = rx.await;
        }
    }
}

pub(crate) async fn handle_connection(
    router: Router,
    capacity: usize,
    peer: SocketAddr,
    stream: TcpStream,
) -> crate::Result<()> {
    let mut route: Option<ChannelFactory> = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path();

        match router.resolve(path) {
            Some(factory) => {
                log::debug!("websocket;upgrade;peer={peer};path={path}");
                route = Some(factory);
                Ok(response)
            }
            None => {
                log::debug!("websocket;not_found;peer={peer};path={path}");
                let mut response = ErrorResponse::new(Some(format!("no channel at {path}")));
                *response.status_mut() = StatusCode::NOT_FOUND;
                Err(response)
            }
        }
    };

    let stream = accept_hdr_async(stream, callback).await?;

    let factory = match route {
        Some(factory) => factory,
        None => return Ok(()),
    };

    let (socket, outgoing) = Socket::with_capacity(capacity);
    let mut channel = factory(socket);

    drive(&mut *channel, stream, outgoing).await;

    Ok(())
}
