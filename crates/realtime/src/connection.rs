//! Manages the lifecycle of the WebSocket connection to the assistant backend.

use crate::error::ConnectionError;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message},
};
use tracing::{debug, info, instrument, warn};

const FRAME_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// A snapshot of the logical channel to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub address: String,
    pub state: ConnectionState,
    /// Handshake duration, refreshed by ping/pong round trips while open.
    pub latency: Option<Duration>,
}

/// Tuning for a `ConnectionManager`.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Interval between keep-alive pings. `None` disables pings.
    pub keepalive: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            keepalive: Some(Duration::from_secs(30)),
        }
    }
}

/// A text frame tagged with the connection that produced it.
#[derive(Debug)]
struct TaggedFrame {
    generation: u64,
    text: String,
}

/// Owns the single duplex connection to the backend.
///
/// Cloning is cheap; all clones drive the same connection. The manager never
/// retries on its own: after a drop it reports `Closed` and waits for an
/// explicit `connect` or `reconnect`.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ConnectionState>,
    frames_tx: mpsc::Sender<TaggedFrame>,
    options: ConnectionOptions,
}

#[derive(Default)]
struct Slot {
    address: Option<String>,
    generation: u64,
    latency: Option<Duration>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    task: Option<JoinHandle<()>>,
}

/// Receives raw text frames in arrival order.
///
/// Frames that were buffered by a connection which has since been replaced are
/// skipped.
pub struct FrameReceiver {
    rx: mpsc::Receiver<TaggedFrame>,
    inner: Weak<Inner>,
}

impl FrameReceiver {
    /// Waits for the next frame from the current connection.
    ///
    /// Returns `None` once the manager and all its connections are gone.
    pub async fn recv(&mut self) -> Option<String> {
        while let Some(frame) = self.rx.recv().await {
            let current = self
                .inner
                .upgrade()
                .map(|inner| inner.lock_slot().generation);
            match current {
                Some(generation) if generation != frame.generation => {
                    debug!(
                        stale = frame.generation,
                        current = generation,
                        "Dropping frame from a superseded connection."
                    );
                }
                _ => return Some(frame.text),
            }
        }
        None
    }
}

impl ConnectionManager {
    /// Creates an idle manager and the receiver for its inbound frames.
    pub fn new(options: ConnectionOptions) -> (Self, FrameReceiver) {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            slot: Mutex::new(Slot::default()),
            state_tx,
            frames_tx,
            options,
        });
        let frames = FrameReceiver {
            rx: frames_rx,
            inner: Arc::downgrade(&inner),
        };
        (Self { inner }, frames)
    }

    /// Establishes or replaces the connection.
    ///
    /// Asking for the address that is already connecting or open is a no-op; a
    /// different address tears the current connection down first. Must be called
    /// from within a Tokio runtime.
    pub fn connect(&self, address: &str) -> Result<(), ConnectionError> {
        validate_address(address)?;
        let mut slot = self.inner.lock_slot();
        let state = *self.inner.state_tx.borrow();
        if slot.address.as_deref() == Some(address)
            && matches!(state, ConnectionState::Connecting | ConnectionState::Open)
        {
            debug!(%address, %state, "Connection already in progress; ignoring connect.");
            return Ok(());
        }
        self.inner.replace(&mut slot, address.to_string());
        Ok(())
    }

    /// Re-dials the most recent address, tearing down whatever is there.
    pub fn reconnect(&self) {
        let mut slot = self.inner.lock_slot();
        match slot.address.clone() {
            Some(address) => {
                info!(%address, "Reconnecting to backend.");
                self.inner.replace(&mut slot, address);
            }
            None => warn!("Reconnect requested before any address was configured."),
        }
    }

    /// Closes the connection gracefully.
    ///
    /// An open socket moves to `Closing`, sends a close frame and then reports
    /// `Closed`. Anything else is dropped immediately.
    pub fn disconnect(&self) {
        let mut slot = self.inner.lock_slot();
        let state = *self.inner.state_tx.borrow();
        if state == ConnectionState::Open && slot.outbound.take().is_some() {
            info!("Closing backend connection.");
            self.inner.state_tx.send_replace(ConnectionState::Closing);
            return;
        }
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.outbound = None;
        slot.generation += 1;
        self.inner.state_tx.send_replace(ConnectionState::Closed);
    }

    /// Serializes `message` to JSON and sends it.
    ///
    /// Delivery is at-most-once: when the connection is not open the message is
    /// dropped with a warning. Returns whether the frame was handed to the socket.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(payload) => self.send_text(payload),
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message; dropping it.");
                false
            }
        }
    }

    /// Sends a pre-serialized text frame.
    pub fn send_text(&self, payload: String) -> bool {
        let slot = self.inner.lock_slot();
        let state = *self.inner.state_tx.borrow();
        match (&slot.outbound, state) {
            (Some(outbound), ConnectionState::Open) => {
                if outbound.send(Message::Text(payload.into())).is_ok() {
                    true
                } else {
                    warn!("Connection task is gone; dropping outbound message.");
                    false
                }
            }
            _ => {
                warn!(%state, "Connection is not open; dropping outbound message.");
                false
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribes to lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Snapshot of the current connection, if an address was ever configured.
    pub fn connection(&self) -> Option<Connection> {
        let slot = self.inner.lock_slot();
        slot.address.clone().map(|address| Connection {
            address,
            state: *self.inner.state_tx.borrow(),
            latency: slot.latency,
        })
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the current connection task and dials `address` under a new generation.
    fn replace(self: &Arc<Self>, slot: &mut Slot, address: String) {
        if let Some(task) = slot.task.take() {
            debug!(generation = slot.generation, "Tearing down previous connection.");
            task.abort();
        }
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        slot.generation += 1;
        slot.address = Some(address.clone());
        slot.latency = None;
        slot.outbound = Some(outbound_tx);
        self.state_tx.send_replace(ConnectionState::Connecting);
        slot.task = Some(tokio::spawn(run_connection(
            Arc::downgrade(self),
            slot.generation,
            address,
            outbound_rx,
            self.frames_tx.clone(),
            self.options.keepalive,
        )));
    }

    /// Applies a state reported by a connection task, unless that task was superseded.
    fn publish(&self, generation: u64, state: ConnectionState, latency: Option<Duration>) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return false;
        }
        if latency.is_some() {
            slot.latency = latency;
        }
        if state == ConnectionState::Closed {
            slot.outbound = None;
            slot.task = None;
        }
        self.state_tx.send_replace(state);
        true
    }

    fn record_latency(&self, generation: u64, latency: Duration) {
        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.latency = Some(latency);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.task.take() {
            task.abort();
        }
    }
}

fn validate_address(address: &str) -> Result<(), ConnectionError> {
    if !(address.starts_with("ws://") || address.starts_with("wss://")) {
        return Err(ConnectionError::InvalidAddress(address.to_string()));
    }
    address.into_client_request()?;
    Ok(())
}

async fn dial(address: &str) -> Result<(WsStream, Duration), ConnectionError> {
    let started = Instant::now();
    let (ws_stream, _) = connect_async(address).await?;
    Ok((ws_stream, started.elapsed()))
}

async fn next_ping(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Runs one connection until it closes, bridging the socket and the channels.
#[instrument(name = "backend_connection", skip(inner, outbound, frames, keepalive))]
async fn run_connection(
    inner: Weak<Inner>,
    generation: u64,
    address: String,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    frames: mpsc::Sender<TaggedFrame>,
    keepalive: Option<Duration>,
) {
    let publish = |state: ConnectionState, latency: Option<Duration>| {
        inner
            .upgrade()
            .is_some_and(|inner| inner.publish(generation, state, latency))
    };

    let (ws_stream, handshake) = match dial(&address).await {
        Ok(connected) => connected,
        Err(e) => {
            warn!(error = %e, "Failed to connect to backend.");
            publish(ConnectionState::Closed, None);
            return;
        }
    };
    if !publish(ConnectionState::Open, Some(handshake)) {
        return;
    }
    info!(latency_ms = handshake.as_millis() as u64, "Connected to backend.");

    let (mut sink, mut stream) = ws_stream.split();
    let epoch = Instant::now();
    let mut keepalive = keepalive.map(|period| {
        let mut interval = tokio::time::interval_at(epoch + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        tokio::select! {
            next_out = outbound.recv() => match next_out {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        warn!(error = %e, "Failed to write to backend.");
                        break;
                    }
                }
                None => {
                    debug!("Outbound channel closed; sending close frame.");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = next_ping(&mut keepalive) => {
                let sent_at = epoch.elapsed().as_nanos() as u64;
                if let Err(e) = sink.send(Message::Ping(sent_at.to_be_bytes().to_vec().into())).await {
                    warn!(error = %e, "Failed to send keep-alive ping.");
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let frame = TaggedFrame { generation, text: text.to_string() };
                    if frames.send(frame).await.is_err() {
                        debug!("Frame receiver dropped; stopping connection.");
                        break;
                    }
                }
                Some(Ok(Message::Pong(payload))) => {
                    if let Ok(bytes) = <[u8; 8]>::try_from(&payload[..]) {
                        let sent_at = Duration::from_nanos(u64::from_be_bytes(bytes));
                        let round_trip = epoch.elapsed().saturating_sub(sent_at);
                        if let Some(inner) = inner.upgrade() {
                            inner.record_latency(generation, round_trip);
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary frame from backend.");
                }
                Some(Ok(Message::Close(close_frame))) => {
                    info!(?close_frame, "Backend closed the connection.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading from backend.");
                    break;
                }
                None => {
                    info!("Backend stream ended.");
                    break;
                }
            },
        }
    }

    publish(ConnectionState::Closed, None);
    info!("Backend connection closed.");
}
