use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_tungstenite::tungstenite::{self, Message};
use futures::{channel::mpsc, Sink, Stream, StreamExt};

/// In-memory stand-in for an upgraded connection, driven from a [`Remote`].
pub(crate) struct Pipe {
    incoming: mpsc::UnboundedReceiver<Result<Message, tungstenite::Error>>,
    outgoing: mpsc::UnboundedSender<Message>,
    broken: bool,
}

/// The client end of a [`Pipe`].
pub(crate) struct Remote {
    tx: mpsc::UnboundedSender<Result<Message, tungstenite::Error>>,
    rx: mpsc::UnboundedReceiver<Message>,
}

pub(crate) fn pipe() -> (Pipe, Remote) {
    let (tx, incoming) = mpsc::unbounded();
    let (outgoing, rx) = mpsc::unbounded();

    (
        Pipe {
            incoming,
            outgoing,
            broken: false,
        },
        Remote { tx, rx },
    )
}

/// A pipe whose every write fails.
pub(crate) fn broken_pipe() -> (Pipe, Remote) {
    let (mut pipe, remote) = pipe();
    pipe.broken = true;
    (pipe, remote)
}

impl Remote {
    pub(crate) fn send(&self, message: Message) {
        self.tx.unbounded_send(Ok(message)).unwrap();
    }

    pub(crate) fn send_text(&self, text: String) {
        self.send(Message::Text(text));
    }

    /// Frames written by the server so far.
    pub(crate) fn received(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();

        while let Ok(Some(message)) = self.rx.try_next() {
            messages.push(message);
        }

        messages
    }

    pub(crate) fn texts(&mut self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|message| match message {
                Message::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl Stream for Pipe {
    type Item = Result<Message, tungstenite::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_next_unpin(cx)
    }
}

impl Sink<Message> for Pipe {
    type Error = tungstenite::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, message: Message) -> Result<(), Self::Error> {
        if self.broken {
            return Err(tungstenite::Error::ConnectionClosed);
        }

        self.outgoing
            .unbounded_send(message)
            .map_err(|_| tungstenite::Error::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
