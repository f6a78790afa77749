//! Socket event types exchanged between client and server.
//!
//! [`ClientEvent`] covers everything the client emits; [`ServerEvent`]
//! covers server-initiated deliveries. Connection lifecycle (connect,
//! disconnect, connect error) is signalled by the transport itself, not
//! carried as wire events.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::message::MessagePayload;

/// Events emitted by the client over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Join the room for a conversation channel. Fire-and-forget.
    JoinChannel(ChannelId),
    /// Leave the room for a conversation channel. Fire-and-forget.
    LeaveChannel(ChannelId),
    /// Deliver a message to the channel's members. The server may answer
    /// with a [`SendAck`].
    SendMessage(MessagePayload),
}

/// Events delivered by the server over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// A message delivered to all channel members, potentially including
    /// an echo to its own sender. Carries the server-assigned `id`.
    NewMessage(MessagePayload),
}

/// Acknowledgement the server may send in response to
/// [`ClientEvent::SendMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Whether the server accepted the message.
    pub success: bool,
    /// Server-reported error description when `success` is false.
    pub error: Option<String>,
}

impl SendAck {
    /// Acknowledgement for an accepted message.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Acknowledgement for a rejected message.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }
}
