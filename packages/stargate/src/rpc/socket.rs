//! A logical always-on connection over a WebSocket that can drop.
//!
//! The socket reconnects automatically after unexpected closes, buffers
//! outbound requests while no physical connection exists, and exposes all
//! inbound messages as a single broadcast stream. An explicit
//! [ReconnectingSocket::disconnect] is terminal: the instance cannot be
//! reused afterwards.

use std::collections::VecDeque;
use std::fmt::Display;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::RpcError;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// The lifecycle states of a [ReconnectingSocket].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Freshly constructed, [ReconnectingSocket::connect] not called yet.
    Unconnected,
    /// Trying to open a physical connection, either initially or after a drop.
    Connecting,
    /// A physical connection is open.
    Connected,
    /// Terminal: explicitly disconnected, not reusable.
    Disconnected,
}

impl Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Unconnected => "unconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        })
    }
}

/// One event on the multiplexed inbound stream.
#[derive(Clone, Debug)]
pub enum SocketEvent {
    /// An inbound message, in arrival order.
    Message(String),
    /// The stream has completed. Sent exactly once, after an explicit
    /// disconnect. No further events follow.
    Completed,
}

enum Command {
    Send(String),
    Disconnect,
}

/// See the module docs.
pub struct ReconnectingSocket {
    url: String,
    reconnect_delay: Duration,
    status: Arc<Mutex<ConnectionStatus>>,
    stopping: Arc<AtomicBool>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    events_tx: broadcast::Sender<SocketEvent>,
}

impl ReconnectingSocket {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_reconnect_delay(url, DEFAULT_RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        ReconnectingSocket {
            url: url.into(),
            reconnect_delay,
            status: Arc::new(Mutex::new(ConnectionStatus::Unconnected)),
            stopping: Arc::new(AtomicBool::new(false)),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            events_tx,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Subscribe to the inbound event stream. Every subscriber receives the
    /// same sequence of events; subscribing or unsubscribing does not affect
    /// the connection.
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.events_tx.subscribe()
    }

    /// Start connecting. Valid only once, from the unconnected state.
    pub fn connect(&self) -> Result<(), RpcError> {
        {
            let mut guard = self.status.lock();
            if *guard != ConnectionStatus::Unconnected {
                return Err(RpcError::CannotConnect { status: *guard });
            }
            *guard = ConnectionStatus::Connecting;
        }
        let command_rx = self
            .command_rx
            .lock()
            .take()
            .expect("an unconnected socket always holds its command receiver");
        let driver = Driver {
            url: self.url.clone(),
            reconnect_delay: self.reconnect_delay,
            status: self.status.clone(),
            stopping: self.stopping.clone(),
            command_rx,
            events_tx: self.events_tx.clone(),
        };
        tokio::spawn(driver.run());
        Ok(())
    }

    /// Submit an outbound request. While no physical connection exists the
    /// payload is buffered and flushed in submission order on (re)connect.
    pub fn queue_request(&self, payload: String) -> Result<(), RpcError> {
        if self.stopping.load(Ordering::SeqCst) || self.status() == ConnectionStatus::Disconnected
        {
            return Err(RpcError::SocketClosed);
        }
        self.command_tx
            .send(Command::Send(payload))
            .map_err(|_| RpcError::SocketClosed)
    }

    /// Tear down the connection, suppress reconnection and complete the
    /// event stream. Terminal.
    pub fn disconnect(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let was = {
            let mut guard = self.status.lock();
            let was = *guard;
            *guard = ConnectionStatus::Disconnected;
            was
        };
        if was == ConnectionStatus::Unconnected {
            // No driver task exists, so complete the stream from here.
            let _ = self.events_tx.send(SocketEvent::Completed);
        } else {
            let _ = self.command_tx.send(Command::Disconnect);
        }
    }
}

struct Driver {
    url: String,
    reconnect_delay: Duration,
    status: Arc<Mutex<ConnectionStatus>>,
    stopping: Arc<AtomicBool>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    events_tx: broadcast::Sender<SocketEvent>,
}

enum PumpOutcome {
    /// Explicit disconnect requested.
    Stop,
    /// The physical connection dropped unexpectedly.
    Reconnect,
}

impl Driver {
    async fn run(mut self) {
        let mut queue: VecDeque<String> = VecDeque::new();
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            self.set_status(ConnectionStatus::Connecting);
            match connect_async(self.url.as_str()).await {
                Err(err) => {
                    debug!("Connection attempt to {} failed: {err}", self.url);
                    if self.wait_before_retry(&mut queue).await.is_break() {
                        break;
                    }
                }
                Ok((stream, _response)) => {
                    let (mut sink, mut source) = stream.split();
                    if let Err(err) = self.flush_queue(&mut sink, &mut queue).await {
                        debug!("Flushing queued requests to {} failed: {err}", self.url);
                        if self.wait_before_retry(&mut queue).await.is_break() {
                            break;
                        }
                        continue;
                    }
                    self.set_status(ConnectionStatus::Connected);
                    match self.pump(&mut sink, &mut source, &mut queue).await {
                        PumpOutcome::Stop => {
                            let _ = sink.close().await;
                            break;
                        }
                        PumpOutcome::Reconnect => {
                            warn!("Connection to {} dropped, reconnecting", self.url);
                            if self.wait_before_retry(&mut queue).await.is_break() {
                                break;
                            }
                        }
                    }
                }
            }
        }
        self.set_status(ConnectionStatus::Disconnected);
        let _ = self.events_tx.send(SocketEvent::Completed);
    }

    fn set_status(&self, status: ConnectionStatus) {
        let mut guard = self.status.lock();
        // Never leave the terminal state
        if *guard != ConnectionStatus::Disconnected {
            *guard = status;
        }
    }

    /// Send all buffered payloads in submission order.
    async fn flush_queue(
        &mut self,
        sink: &mut WsSink,
        queue: &mut VecDeque<String>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        while let Some(payload) = queue.pop_front() {
            if let Err(err) = sink.send(Message::Text(payload.clone())).await {
                queue.push_front(payload);
                return Err(err);
            }
        }
        Ok(())
    }

    async fn pump(
        &mut self,
        sink: &mut WsSink,
        source: &mut WsSource,
        queue: &mut VecDeque<String>,
    ) -> PumpOutcome {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Send(payload)) => {
                        if let Err(err) = sink.send(Message::Text(payload.clone())).await {
                            debug!("Send failed, queueing for reconnect: {err}");
                            queue.push_back(payload);
                            return PumpOutcome::Reconnect;
                        }
                    }
                    Some(Command::Disconnect) | None => return PumpOutcome::Stop,
                },
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let _ = self.events_tx.send(SocketEvent::Message(text));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = String::from_utf8(data) {
                            let _ = self.events_tx.send(SocketEvent::Message(text));
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return PumpOutcome::Reconnect,
                    Some(Err(err)) => {
                        debug!("Read error on {}: {err}", self.url);
                        return PumpOutcome::Reconnect;
                    }
                },
            }
        }
    }

    /// Sleep before the next connection attempt, buffering any requests that
    /// arrive meanwhile. Breaks on explicit disconnect.
    async fn wait_before_retry(&mut self, queue: &mut VecDeque<String>) -> ControlFlow<()> {
        let sleep = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return ControlFlow::Continue(()),
                command = self.command_rx.recv() => match command {
                    Some(Command::Send(payload)) => queue.push_back(payload),
                    Some(Command::Disconnect) | None => return ControlFlow::Break(()),
                },
            }
        }
    }
}
