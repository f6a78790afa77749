//! Transport abstraction between the sync engine and the socket layer.
//!
//! The engine never talks to a concrete socket. It emits [`ClientEvent`]s
//! through a [`Transport`] and consumes [`TransportEvent`]s from a channel
//! the transport feeds. That keeps the reconciliation and lifecycle logic
//! testable against the in-process [`loopback`] pair.

pub mod loopback;

use pairchat_proto::event::{ClientEvent, SendAck};
use pairchat_proto::message::MessagePayload;
use tokio::sync::oneshot;

/// Errors that can occur at the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not currently connected.
    #[error("transport is not connected")]
    NotConnected,
    /// The connection was closed while the operation was in flight.
    #[error("connection closed")]
    ConnectionClosed,
    /// The event could not be encoded for the wire.
    #[error("codec error: {0}")]
    Codec(#[from] pairchat_proto::codec::CodecError),
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events surfaced by a transport to the sync engine.
///
/// `NewMessage` is a wire delivery; the other three describe the
/// connection lifecycle of the transport itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message delivered to a channel this client has joined.
    NewMessage(MessagePayload),
    /// The connection is (re-)established.
    Connected,
    /// The connection was lost, with the transport's reason.
    Disconnected(String),
    /// A connection attempt failed.
    ConnectError(String),
}

/// Abstraction over the client side of a socket connection.
///
/// Implementations must be cheap to share behind an `Arc` and callable
/// from spawned tasks.
pub trait Transport: Send + Sync {
    /// Emits a fire-and-forget event (channel join/leave).
    fn emit(
        &self,
        event: &ClientEvent,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Emits a message and returns a receiver for the server's
    /// acknowledgement. Dropping the receiver is allowed; the emit has
    /// already happened.
    fn emit_with_ack(
        &self,
        payload: &MessagePayload,
    ) -> impl Future<Output = Result<oneshot::Receiver<SendAck>, TransportError>> + Send;

    /// Whether the transport currently holds a live connection.
    fn is_connected(&self) -> bool;
}
