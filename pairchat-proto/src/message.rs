//! Message types for the `PairChat` protocol.
//!
//! [`MessagePayload`] is the on-the-wire shape carried by both the outbound
//! `sendMessage` event and the inbound `newMessage` delivery. [`Message`]
//! wraps a payload with the client-local [`DeliveryState`] used by the
//! reconciliation layer; delivery state never crosses the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ChannelId;

/// Server-assigned durable message identifier.
///
/// Absent while a locally authored message is still pending; supplied by
/// the backend once the message has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a message identifier from its string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated correlation key for a locally authored message.
///
/// Unique per send: the author's [`UserId`] plus a UUID v7, whose leading
/// timestamp bits keep ids from one client monotonically ordered. A peer
/// echo and the persistence response both carry this key back, which is how
/// the reconciler converges them onto the single optimistic record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh correlation key for a message authored by `sender`.
    #[must_use]
    pub fn generate(sender: &UserId) -> Self {
        Self(format!("{}-{}", sender.as_str(), Uuid::now_v7()))
    }

    /// Reconstructs a `ClientId` from its wire representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a participant identifier from its string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Error returned when an attachment fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    /// The payload is not a `data:` URI.
    #[error("attachment is not a data URI")]
    NotDataUri,
    /// The data URI does not carry an `image/*` media type.
    #[error("attachment media type is not an image")]
    NotAnImage,
}

/// Inline image attachment, carried as a `data:image/...` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment(String);

impl Attachment {
    /// Validates and wraps a data URI.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError`] if the string is not a `data:` URI or
    /// its media type is not `image/*`.
    pub fn from_data_uri(uri: impl Into<String>) -> Result<Self, AttachmentError> {
        let uri = uri.into();
        let Some(rest) = uri.strip_prefix("data:") else {
            return Err(AttachmentError::NotDataUri);
        };
        if !rest.starts_with("image/") {
            return Err(AttachmentError::NotAnImage);
        }
        Ok(Self(uri))
    }

    /// Returns the underlying data URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wire shape shared by the outbound `sendMessage` event and the inbound
/// `newMessage` delivery.
///
/// Outbound payloads have `id: None` (the backend has not assigned one
/// yet); inbound server deliveries carry `id: Some(..)`. `client_id` is
/// present only on messages that originated on some client, and is echoed
/// back verbatim by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Server-assigned durable identifier, if the backend has persisted
    /// this message.
    pub id: Option<MessageId>,
    /// Client correlation key, if the message originated locally or echoes
    /// one that did.
    pub client_id: Option<ClientId>,
    /// The conversation channel this message belongs to.
    pub channel_id: ChannelId,
    /// Author identity.
    pub sender_id: UserId,
    /// Author display name.
    pub sender_name: String,
    /// Message body, if any.
    pub text: Option<String>,
    /// Inline image attachment, if any.
    pub attachment: Option<Attachment>,
    /// Creation time: client-assigned while pending, server-assigned once
    /// confirmed.
    pub created_at: Timestamp,
}

/// Client-local delivery lifecycle of a message record.
///
/// Transitions are one-way: `Pending -> Confirmed` or `Pending -> Failed`.
/// `Failed` is terminal; a retry is a new send with a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Shown optimistically, not yet confirmed by the backend.
    Pending,
    /// The backend holds an authoritative copy.
    Confirmed,
    /// Persistence rejected the message.
    Failed,
}

/// A message record as held in the conversation's ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The message content and identity fields.
    pub payload: MessagePayload,
    /// Client-local delivery lifecycle.
    pub delivery_state: DeliveryState,
}

impl Message {
    /// Wraps a locally authored payload as an optimistic pending record.
    #[must_use]
    pub const fn pending(payload: MessagePayload) -> Self {
        Self {
            payload,
            delivery_state: DeliveryState::Pending,
        }
    }

    /// Wraps a server-delivered payload as a confirmed record.
    #[must_use]
    pub const fn confirmed(payload: MessagePayload) -> Self {
        Self {
            payload,
            delivery_state: DeliveryState::Confirmed,
        }
    }
}
