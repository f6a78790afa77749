//! Outbound send pipeline.
//!
//! A send fans out in three steps: the optimistic record goes into the
//! log immediately, the message is emitted on the socket with an
//! advisory ack watch, and persistence runs in the background as the
//! authoritative success/failure signal. Only precondition violations
//! are returned to the caller; everything later reports via
//! [`SyncEvent`](super::SyncEvent)s.

use pairchat_proto::event::SendAck;
use pairchat_proto::message::{Attachment, ClientId, Message, UserId};
use tokio::sync::oneshot;

use super::{ConversationSession, SendError, SyncEvent};
use crate::api::{MessageApi, NewMessage};
use crate::transport::Transport;

impl<T: Transport + 'static, A: MessageApi + 'static> ConversationSession<T, A> {
    /// Sends a message into the open conversation.
    ///
    /// Returns the new record's correlation key as soon as the optimistic
    /// insert is visible; delivery and persistence continue in the
    /// background. Sending clears the pending suggestion list, matching
    /// the compose-box reset.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NoChannelSelected`] when no conversation is
    /// open and [`SendError::EmptyMessage`] when both text and attachment
    /// are absent.
    pub async fn send_message(
        &self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<ClientId, SendError> {
        let (channel, peer) = {
            let peer = self.peer.lock().clone();
            match (self.binding.bound(), peer) {
                (Some(channel), Some(peer)) => (channel, peer),
                _ => return Err(SendError::NoChannelSelected),
            }
        };
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(SendError::EmptyMessage);
        }
        let request = NewMessage {
            text: (!text.is_empty()).then(|| text.to_owned()),
            attachment,
            channel_id: channel.clone(),
        };

        // Step 1: the record is on screen before anything touches the
        // network.
        let (client_id, message) = self.outbox.create(
            channel,
            request.text.clone(),
            request.attachment.clone(),
        );
        let payload = message.payload.clone();
        let (_, index) = self.log.lock().merge(message);
        let _ = self.events.try_send(SyncEvent::MessageInserted { index });
        self.trigger.clear();

        // Step 2: socket emit. The ack is advisory; its absence changes
        // nothing about the record's state.
        match self.transport.emit_with_ack(&payload).await {
            Ok(ack_rx) => {
                let timeout = self.config.ack_timeout;
                let watched = client_id.clone();
                tokio::spawn(watch_ack(ack_rx, timeout, watched));
            }
            Err(e) => tracing::warn!(
                error = %e,
                client_id = %client_id,
                "socket emit failed, message stays pending until persistence settles"
            ),
        }

        // Step 3: persistence decides confirmed vs failed.
        let session = self.clone();
        let persisted_key = client_id.clone();
        tokio::spawn(async move {
            session.persist(peer, request, persisted_key).await;
        });

        Ok(client_id)
    }

    /// Runs the persistence request for one send and reconciles its
    /// outcome into the log, unless the conversation changed meanwhile.
    async fn persist(&self, peer: UserId, request: NewMessage, client_id: ClientId) {
        let channel = request.channel_id.clone();
        match self.api.send_message(&peer, &request).await {
            Ok(mut stored) => {
                // The response answers exactly this request; stamp the
                // correlation key when the server omitted it so the merge
                // converges on the optimistic record.
                stored.client_id.get_or_insert(client_id);
                if self.binding.bound() != Some(channel) {
                    tracing::debug!("conversation changed, dropping persistence result");
                    return;
                }
                let (_, index) = self.log.lock().merge(Message::confirmed(stored));
                let _ = self.events.try_send(SyncEvent::MessageUpdated { index });
            }
            Err(e) => {
                tracing::warn!(error = %e, client_id = %client_id, "persistence failed");
                if self.binding.bound() != Some(channel) {
                    return;
                }
                if self.log.lock().mark_failed(&client_id).is_some() {
                    let _ = self.events.try_send(SyncEvent::MessageFailed { client_id });
                }
            }
        }
    }
}

/// Waits for the server acknowledgement of one send and logs the outcome.
async fn watch_ack(
    ack_rx: oneshot::Receiver<SendAck>,
    timeout: std::time::Duration,
    client_id: ClientId,
) {
    match tokio::time::timeout(timeout, ack_rx).await {
        Ok(Ok(ack)) if ack.success => {
            tracing::debug!(client_id = %client_id, "server acknowledged send");
        }
        Ok(Ok(ack)) => tracing::warn!(
            client_id = %client_id,
            error = ?ack.error,
            "server reported a delivery problem"
        ),
        Ok(Err(_)) => tracing::debug!(client_id = %client_id, "ack channel closed"),
        Err(_) => tracing::warn!(
            client_id = %client_id,
            "no server acknowledgement within timeout"
        ),
    }
}
