//! Optimistic record construction for outbound messages.

use pairchat_proto::channel::ChannelId;
use pairchat_proto::message::{
    Attachment, ClientId, Message, MessagePayload, Timestamp, UserId,
};

/// Builds the optimistic pending record for each locally authored send.
#[derive(Debug, Clone)]
pub struct OptimisticMessageBuffer {
    local_user: UserId,
    local_name: String,
}

impl OptimisticMessageBuffer {
    /// Creates a buffer authoring messages as `local_user`.
    pub fn new(local_user: UserId, local_name: impl Into<String>) -> Self {
        Self {
            local_user,
            local_name: local_name.into(),
        }
    }

    /// Creates a fresh pending record for the given content.
    ///
    /// The record gets a new correlation key and a local timestamp; the
    /// server id stays empty until the backend assigns one.
    pub fn create(
        &self,
        channel_id: ChannelId,
        text: Option<String>,
        attachment: Option<Attachment>,
    ) -> (ClientId, Message) {
        let client_id = ClientId::generate(&self.local_user);
        let message = Message::pending(MessagePayload {
            id: None,
            client_id: Some(client_id.clone()),
            channel_id,
            sender_id: self.local_user.clone(),
            sender_name: self.local_name.clone(),
            text,
            attachment,
            created_at: Timestamp::now(),
        });
        (client_id, message)
    }
}
