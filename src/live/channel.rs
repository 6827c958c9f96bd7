use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Notify,
};

use crate::Error;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_NO_STATUS: u16 = 1005;
pub const CLOSE_ABNORMAL: u16 = 1006;

pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Callbacks for one upgraded connection.
///
/// [`drive`] calls them one at a time in frame order: `on_connect` first,
/// `on_close` exactly once at the end.
#[async_trait::async_trait]
pub trait Channel: Send {
    async fn on_connect(&mut self) {}

    async fn on_message(&mut self, text: String);

    async fn on_binary(&mut self, _data: Vec<u8>) {}

    async fn on_ping(&mut self, _data: Vec<u8>) {}

    async fn on_pong(&mut self, _data: Vec<u8>) {}

    async fn on_close(&mut self, code: u16, message: String);
}

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Outbound half of a connection. Frames queued here are written by [`drive`]
/// in order, so concurrent pushes never interleave.
///
/// The queue is bounded. Filling it up drops the connection instead of
/// buffering for a client that stopped reading.
pub struct Socket {
    id: u64,
    tx: mpsc::Sender<Message>,
    overflow: Arc<Notify>,
}

/// Receiving end of a [`Socket`], consumed by [`drive`].
pub struct Outgoing {
    rx: mpsc::Receiver<Message>,
    overflow: Arc<Notify>,
}

impl Socket {
    pub fn pair() -> (Arc<Self>, Outgoing) {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Arc<Self>, Outgoing) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let overflow = Arc::new(Notify::new());

        let socket = Self {
            id: NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            overflow: overflow.clone(),
        };

        (Arc::new(socket), Outgoing { rx, overflow })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send_text(&self, text: String) -> crate::Result<()> {
        self.enqueue(Message::Text(text))
    }

    /// Asks the driver to send a close frame and stop.
    pub fn close(&self) -> crate::Result<()> {
        self.enqueue(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        })))
    }

    fn enqueue(&self, message: Message) -> crate::Result<()> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::warn!("socket;overflow;socket={}", self.id);
                self.overflow.notify_one();
                Err(Error::Overflow)
            }
            Err(TrySendError::Closed(_)) => Err(Error::Closed),
        }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Socket({})", self.id)
    }
}

impl Outgoing {
    /// Next queued text frame, if any.
    pub fn try_next_text(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv().ok()? {
                Message::Text(text) => return Some(text),
                _ => continue,
            }
        }
    }
}

/// Runs one connection until it closes, feeding frames to `channel` and
/// writing frames queued on the matching [`Socket`].
///
/// Nothing is delivered after `on_close`; a read or write failure or an
/// overflowing outbound queue closes the connection with [`CLOSE_ABNORMAL`].
pub async fn drive<C, S>(channel: &mut C, stream: S, outgoing: Outgoing)
where
    C: Channel + ?Sized,
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Send
        + Unpin,
{
    let (mut sink, mut stream) = stream.split();
    let Outgoing { mut rx, overflow } = outgoing;

    channel.on_connect().await;

    let (code, reason) = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => channel.on_message(text).await,
                Some(Ok(Message::Binary(data))) => channel.on_binary(data).await,
                Some(Ok(Message::Ping(data))) => channel.on_ping(data).await,
                Some(Ok(Message::Pong(data))) => channel.on_pong(data).await,
                Some(Ok(Message::Close(frame))) => {
                    // Flushes the close reply queued by the protocol.
                    let _ = sink.close().await;

                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (CLOSE_NO_STATUS, String::new()),
                    };
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(err)) => {
                    log::warn!("socket;read_error;{err}");
                    break (CLOSE_ABNORMAL, err.to_string());
                }
                None => break (CLOSE_ABNORMAL, "stream ended".to_string()),
            },

            message = rx.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));

                    if let Err(err) = sink.send(message).await {
                        log::warn!("socket;write_error;{err}");
                        break (CLOSE_ABNORMAL, err.to_string());
                    }

                    if closing {
                        break (CLOSE_NORMAL, "closed by server".to_string());
                    }
                }
                None => break (CLOSE_NORMAL, String::new()),
            },

            _ = overflow.notified() => {
                break (CLOSE_ABNORMAL, "outbound queue full".to_string());
            }
        }
    };

    log::debug!("socket;close;code={code};reason={reason}");

    channel.on_close(code, reason).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::live::testing::{broken_pipe, pipe};

    #[derive(Default)]
    struct Recorder {
        messages: Vec<String>,
        closes: Vec<(u16, String)>,
    }

    #[async_trait::async_trait]
    impl Channel for Recorder {
        async fn on_message(&mut self, text: String) {
            self.messages.push(text);
        }

        async fn on_close(&mut self, code: u16, message: String) {
            self.closes.push((code, message));
        }
    }

    #[test]
    fn sockets_get_distinct_ids() {
        let (a, _) = Socket::pair();
        let (b, _) = Socket::pair();

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn send_after_driver_is_gone_fails() {
        let (socket, outgoing) = Socket::pair();
        drop(outgoing);

        assert!(matches!(
            socket.send_text("x".to_string()),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn try_next_text_skips_control_frames() {
        let (socket, mut outgoing) = Socket::pair();

        socket.close().unwrap();
        socket.send_text("hello".to_string()).unwrap();

        assert_eq!(outgoing.try_next_text().as_deref(), Some("hello"));
        assert_eq!(outgoing.try_next_text(), None);
    }

    #[test]
    fn full_queue_reports_overflow() {
        let (socket, _outgoing) = Socket::with_capacity(1);

        socket.send_text("a".to_string()).unwrap();

        assert!(matches!(
            socket.send_text("b".to_string()),
            Err(Error::Overflow)
        ));
    }

    #[tokio::test]
    async fn frames_arrive_in_order_then_client_close_code() {
        let (stream, remote) = pipe();
        let (_socket, outgoing) = Socket::pair();
        let mut recorder = Recorder::default();

        remote.send_text("one".to_string());
        remote.send_text("two".to_string());
        remote.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "bye".into(),
        })));
        remote.send_text("late".to_string());

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(recorder.messages, ["one", "two"]);
        assert_eq!(recorder.closes, [(1001, "bye".to_string())]);
    }

    #[tokio::test]
    async fn close_without_status_reports_1005() {
        let (stream, remote) = pipe();
        let (_socket, outgoing) = Socket::pair();
        let mut recorder = Recorder::default();

        remote.send(Message::Close(None));

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(recorder.closes.len(), 1);
        assert_eq!(recorder.closes[0].0, CLOSE_NO_STATUS);
    }

    #[tokio::test]
    async fn write_failure_closes_abnormally() {
        let (stream, _remote) = broken_pipe();
        let (socket, outgoing) = Socket::pair();
        let mut recorder = Recorder::default();

        socket.send_text("update".to_string()).unwrap();

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(recorder.closes.len(), 1);
        assert_eq!(recorder.closes[0].0, CLOSE_ABNORMAL);
    }

    #[tokio::test]
    async fn vanished_peer_closes_abnormally() {
        let (stream, remote) = pipe();
        let (_socket, outgoing) = Socket::pair();
        let mut recorder = Recorder::default();

        drop(remote);

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(recorder.closes.len(), 1);
        assert_eq!(recorder.closes[0].0, CLOSE_ABNORMAL);
    }

    #[tokio::test]
    async fn server_close_sends_frame_and_reports_normal() {
        let (stream, mut remote) = pipe();
        let (socket, outgoing) = Socket::pair();
        let mut recorder = Recorder::default();

        socket.close().unwrap();

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(recorder.closes.len(), 1);
        assert_eq!(recorder.closes[0].0, CLOSE_NORMAL);
        assert!(matches!(
            remote.received().as_slice(),
            [Message::Close(Some(frame))] if frame.code == CloseCode::Normal
        ));
    }

    #[tokio::test]
    async fn overflowing_queue_drops_connection() {
        let (stream, _remote) = pipe();
        let (socket, outgoing) = Socket::with_capacity(1);
        let mut recorder = Recorder::default();

        socket.send_text("a".to_string()).unwrap();
        assert!(socket.send_text("b".to_string()).is_err());

        drive(&mut recorder, stream, outgoing).await;

        assert_eq!(
            recorder.closes,
            [(CLOSE_ABNORMAL, "outbound queue full".to_string())]
        );
    }
}
