//! In-process loopback transport.
//!
//! [`create_pair`] wires a [`LoopbackTransport`] (the client endpoint) to a
//! [`LoopbackServer`] (a scriptable stand-in for the backend socket).
//! Client emits travel through the real wire codec, so tests exercise the
//! same encode/decode path a network transport would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pairchat_proto::codec;
use pairchat_proto::event::{ClientEvent, SendAck};
use pairchat_proto::message::MessagePayload;
use tokio::sync::{Mutex, mpsc, oneshot};

use super::{Transport, TransportError, TransportEvent};

/// One client emit as it crosses the loopback link.
struct WireFrame {
    /// Codec-encoded [`ClientEvent`].
    bytes: Vec<u8>,
    /// Present when the client asked for an acknowledgement.
    ack: Option<oneshot::Sender<SendAck>>,
}

/// Client endpoint of a loopback link.
#[derive(Clone)]
pub struct LoopbackTransport {
    connected: Arc<AtomicBool>,
    frames: mpsc::Sender<WireFrame>,
}

/// Scriptable server endpoint of a loopback link.
///
/// Tests pull decoded client events with [`next_event`](Self::next_event),
/// answer acks through the returned sender, and push deliveries and
/// lifecycle transitions back at the client.
pub struct LoopbackServer {
    connected: Arc<AtomicBool>,
    frames: Mutex<mpsc::Receiver<WireFrame>>,
    events: mpsc::Sender<TransportEvent>,
}

/// Creates a connected loopback pair.
///
/// Returns the client transport, the transport event stream the sync
/// engine consumes, and the server harness. The link starts connected.
#[must_use]
pub fn create_pair(buffer: usize) -> (
    LoopbackTransport,
    mpsc::Receiver<TransportEvent>,
    LoopbackServer,
) {
    let connected = Arc::new(AtomicBool::new(true));
    let (frame_tx, frame_rx) = mpsc::channel(buffer);
    let (event_tx, event_rx) = mpsc::channel(buffer);

    let transport = LoopbackTransport {
        connected: Arc::clone(&connected),
        frames: frame_tx,
    };
    let server = LoopbackServer {
        connected,
        frames: Mutex::new(frame_rx),
        events: event_tx,
    };
    (transport, event_rx, server)
}

impl Transport for LoopbackTransport {
    async fn emit(&self, event: &ClientEvent) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let bytes = codec::encode(event)?;
        self.frames
            .send(WireFrame { bytes, ack: None })
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn emit_with_ack(
        &self,
        payload: &MessagePayload,
    ) -> Result<oneshot::Receiver<SendAck>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let bytes = codec::encode(&ClientEvent::SendMessage(payload.clone()))?;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.frames
            .send(WireFrame {
                bytes,
                ack: Some(ack_tx),
            })
            .await
            .map_err(|_| TransportError::ConnectionClosed)?;
        Ok(ack_rx)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl LoopbackServer {
    /// Receives the next client event, decoded off the wire.
    ///
    /// Returns the event and, for message sends, the ack sender. `None`
    /// means the client endpoint was dropped. Undecodable frames are
    /// logged and skipped.
    pub async fn next_event(&self) -> Option<(ClientEvent, Option<oneshot::Sender<SendAck>>)> {
        let mut frames = self.frames.lock().await;
        loop {
            let frame = frames.recv().await?;
            match codec::decode::<ClientEvent>(&frame.bytes) {
                Ok(event) => return Some((event, frame.ack)),
                Err(e) => tracing::warn!(error = %e, "dropping undecodable loopback frame"),
            }
        }
    }

    /// Delivers a message to the client, as the backend would after a
    /// channel broadcast.
    pub async fn deliver(&self, payload: MessagePayload) {
        let _ = self.events.send(TransportEvent::NewMessage(payload)).await;
    }

    /// Marks the link connected and notifies the client.
    pub async fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Connected).await;
    }

    /// Marks the link disconnected and notifies the client.
    pub async fn disconnect(&self, reason: impl Into<String>) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self
            .events
            .send(TransportEvent::Disconnected(reason.into()))
            .await;
    }

    /// Reports a failed connection attempt to the client.
    pub async fn connect_error(&self, error: impl Into<String>) {
        let _ = self
            .events
            .send(TransportEvent::ConnectError(error.into()))
            .await;
    }
}
