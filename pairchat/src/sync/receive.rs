//! Inbound transport event handling.

use pairchat_proto::message::{Message, MessagePayload};
use tokio::sync::mpsc;

use super::{ConversationSession, SyncEvent};
use crate::api::MessageApi;
use crate::sync::reconcile::MergeAction;
use crate::transport::{Transport, TransportEvent};

impl<T: Transport + 'static, A: MessageApi + 'static> ConversationSession<T, A> {
    /// Applies one transport event to the session.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::NewMessage(payload) => self.handle_new_message(payload),
            TransportEvent::Connected => {
                self.supervisor.handle_connected().await;
                let _ = self
                    .events
                    .try_send(SyncEvent::ConnectionChanged { connected: true });
            }
            TransportEvent::Disconnected(reason) => {
                self.supervisor.handle_disconnected(&reason);
                let _ = self
                    .events
                    .try_send(SyncEvent::ConnectionChanged { connected: false });
            }
            TransportEvent::ConnectError(error) => {
                self.supervisor.handle_connect_error(&error);
                let _ = self.events.try_send(SyncEvent::ConnectionError(error));
            }
        }
    }

    /// Consumes the transport event stream until it closes.
    pub async fn run(&self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("transport event stream closed");
    }

    /// Merges a socket delivery into the log.
    ///
    /// Deliveries for a channel other than the bound one are dropped;
    /// they belong to a conversation this session no longer shows.
    fn handle_new_message(&self, payload: MessagePayload) {
        let Some(bound) = self.binding.bound() else {
            tracing::debug!("delivery with no open conversation dropped");
            return;
        };
        if payload.channel_id != bound {
            tracing::debug!(
                channel = %payload.channel_id,
                bound = %bound,
                "delivery for another channel dropped"
            );
            return;
        }

        let message = Message::confirmed(payload);
        let (action, index) = self.log.lock().merge(message.clone());
        match action {
            MergeAction::Inserted => {
                let _ = self.events.try_send(SyncEvent::MessageInserted { index });
                if self.config.fetch_suggestions {
                    let peer = self.peer.lock().clone();
                    if let Some(peer) = peer {
                        self.trigger.observe_insert(&message, &peer);
                    }
                }
            }
            MergeAction::Updated => {
                let _ = self.events.try_send(SyncEvent::MessageUpdated { index });
            }
        }
    }
}
