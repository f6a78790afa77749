//! Message log reconciliation.
//!
//! A message can reach the client up to three times: the optimistic local
//! insert, the socket echo, and the persistence response. [`MessageLog`]
//! converges every copy onto a single record by matching on the client
//! correlation key first and the server id second, so the log never holds
//! two records for one logical message.

use pairchat_proto::message::{ClientId, DeliveryState, Message, MessagePayload};

/// What [`MessageLog::merge`] did with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No existing record matched; the message was appended.
    Inserted,
    /// An existing record matched and was overlaid in place.
    Updated,
}

/// Ordered message sequence for one conversation.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Merges an incoming record into the log.
    ///
    /// Match by `client_id` when the incoming record carries one, falling
    /// back to `id`. A match overlays the existing record in place,
    /// keeping its position; otherwise the record is appended. Returns
    /// the action taken and the record's index.
    pub fn merge(&mut self, incoming: Message) -> (MergeAction, usize) {
        let by_client_id = incoming.payload.client_id.as_ref().and_then(|cid| {
            self.messages
                .iter()
                .position(|m| m.payload.client_id.as_ref() == Some(cid))
        });
        let by_id = || {
            incoming.payload.id.as_ref().and_then(|id| {
                self.messages
                    .iter()
                    .position(|m| m.payload.id.as_ref() == Some(id))
            })
        };
        match by_client_id.or_else(by_id) {
            Some(index) => {
                Self::overlay(&mut self.messages[index], incoming);
                (MergeAction::Updated, index)
            }
            None => {
                self.messages.push(incoming);
                (MergeAction::Inserted, self.messages.len() - 1)
            }
        }
    }

    /// Overlays `incoming` onto an existing record.
    ///
    /// Identity and content fields already present locally survive an
    /// incoming copy that omits them; a persistence response without a
    /// `client_id` must not erase the key the echo would still match on.
    /// An update always means the backend has the message, so the record
    /// lands in `Confirmed` even if a late copy arrives after a timeout.
    fn overlay(existing: &mut Message, incoming: Message) {
        let target = &mut existing.payload;
        let source = incoming.payload;
        if source.id.is_some() {
            target.id = source.id;
        }
        if source.client_id.is_some() {
            target.client_id = source.client_id;
        }
        if source.text.is_some() {
            target.text = source.text;
        }
        if source.attachment.is_some() {
            target.attachment = source.attachment;
        }
        target.channel_id = source.channel_id;
        target.sender_id = source.sender_id;
        target.sender_name = source.sender_name;
        target.created_at = source.created_at;
        existing.delivery_state = DeliveryState::Confirmed;
    }

    /// Marks the pending record with `client_id` as failed.
    ///
    /// Content is left untouched so the author can see what did not go
    /// through. Returns the record's index when a transition happened;
    /// a record already confirmed by the socket echo stays confirmed.
    pub fn mark_failed(&mut self, client_id: &ClientId) -> Option<usize> {
        let index = self
            .messages
            .iter()
            .position(|m| m.payload.client_id.as_ref() == Some(client_id))?;
        if self.messages[index].delivery_state != DeliveryState::Pending {
            return None;
        }
        self.messages[index].delivery_state = DeliveryState::Failed;
        Some(index)
    }

    /// Replaces the log with stored history, all records confirmed.
    pub fn seed(&mut self, history: Vec<MessagePayload>) {
        self.messages = history.into_iter().map(Message::confirmed).collect();
    }

    /// The ordered records.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of records in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
