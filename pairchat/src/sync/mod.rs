//! Conversation synchronization engine.
//!
//! [`ConversationSession`] owns the message log for the active one-to-one
//! conversation and keeps it consistent across the three ways a message
//! reaches the client: the optimistic local insert, the socket echo, and
//! the persistence response. Embedders drive it with local sends and the
//! transport event stream, and render from [`SyncEvent`] notifications.

pub mod outbox;
pub mod reconcile;
pub mod suggest;

mod receive;
mod send;

use std::sync::Arc;
use std::time::Duration;

use pairchat_proto::channel::ChannelId;
use pairchat_proto::message::{ClientId, Message, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::api::MessageApi;
use crate::channel::ChannelBinding;
use crate::reconnect::{ConnectionState, ReconnectSupervisor};
use crate::transport::Transport;

use outbox::OptimisticMessageBuffer;
use reconcile::MessageLog;
use suggest::SuggestionTrigger;

/// Errors surfaced directly to the caller of
/// [`ConversationSession::send_message`].
///
/// Everything downstream of the optimistic insert (transport, ack,
/// persistence) reports through [`SyncEvent`]s instead, because by then
/// the message is already on screen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// No conversation is open, so there is no channel to send into.
    #[error("no conversation channel is selected")]
    NoChannelSelected,
    /// The message has neither text nor an attachment.
    #[error("message has no text or attachment")]
    EmptyMessage,
}

/// Notifications emitted by the session as the log and connection change.
///
/// Indices refer to the session's message sequence at emission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A record was appended at `index`.
    MessageInserted {
        /// Position of the new record.
        index: usize,
    },
    /// The record at `index` was updated in place.
    MessageUpdated {
        /// Position of the updated record.
        index: usize,
    },
    /// The pending record with this key failed persistence.
    MessageFailed {
        /// Correlation key of the failed record.
        client_id: ClientId,
    },
    /// The reply-suggestion list was replaced.
    SuggestionsUpdated {
        /// Size of the new list.
        count: usize,
    },
    /// The transport connection came up or went down.
    ConnectionChanged {
        /// Whether the transport is now connected.
        connected: bool,
    },
    /// A connection attempt failed.
    ConnectionError(String),
}

/// Tunable parameters of a session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long to wait for a server acknowledgement before logging a
    /// warning. Advisory only; no state changes on expiry.
    pub ack_timeout: Duration,
    /// Capacity of the [`SyncEvent`] channel.
    pub event_buffer: usize,
    /// Whether peer messages trigger reply-suggestion fetches.
    pub fetch_suggestions: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            event_buffer: 64,
            fetch_suggestions: true,
        }
    }
}

/// The synchronizer for one user's active conversation.
///
/// Cheap to clone; clones share all state, which is how the spawned
/// persistence and suggestion tasks reach the log.
pub struct ConversationSession<T, A> {
    transport: Arc<T>,
    api: Arc<A>,
    local_user: UserId,
    binding: ChannelBinding<T>,
    supervisor: Arc<ReconnectSupervisor<T>>,
    outbox: OptimisticMessageBuffer,
    log: Arc<Mutex<MessageLog>>,
    trigger: SuggestionTrigger<A>,
    peer: Arc<Mutex<Option<UserId>>>,
    events: mpsc::Sender<SyncEvent>,
    config: SyncConfig,
}

impl<T, A> Clone for ConversationSession<T, A> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            api: Arc::clone(&self.api),
            local_user: self.local_user.clone(),
            binding: self.binding.clone(),
            supervisor: Arc::clone(&self.supervisor),
            outbox: self.outbox.clone(),
            log: Arc::clone(&self.log),
            trigger: self.trigger.clone(),
            peer: Arc::clone(&self.peer),
            events: self.events.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport + 'static, A: MessageApi + 'static> ConversationSession<T, A> {
    /// Creates a session for `local_user` over the given transport and
    /// persistence backend, returning it with its event stream.
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        api: Arc<A>,
        local_user: UserId,
        local_name: impl Into<String>,
        config: SyncConfig,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let binding = ChannelBinding::new(Arc::clone(&transport));
        let supervisor = Arc::new(ReconnectSupervisor::new(binding.clone()));
        let trigger =
            SuggestionTrigger::new(Arc::clone(&api), local_user.clone(), event_tx.clone());
        let session = Self {
            transport,
            api,
            outbox: OptimisticMessageBuffer::new(local_user.clone(), local_name),
            local_user,
            binding,
            supervisor,
            log: Arc::new(Mutex::new(MessageLog::default())),
            trigger,
            peer: Arc::new(Mutex::new(None)),
            events: event_tx,
            config,
        };
        (session, event_rx)
    }

    /// Opens the conversation with `peer`.
    ///
    /// Leaves any previous channel, joins the pair's channel, resets the
    /// log and suggestion list, and seeds the log from stored history.
    /// A history fetch failure leaves the log empty and is only logged.
    pub async fn open_conversation(&self, peer: UserId) -> Option<ChannelId> {
        self.trigger.clear();
        *self.peer.lock() = Some(peer.clone());
        self.log.lock().seed(Vec::new());

        let channel = self
            .binding
            .bind(Some(&self.local_user), Some(&peer))
            .await?;

        match self.api.history(&peer).await {
            Ok(history) => {
                // The conversation may have changed while the fetch ran.
                if self.binding.bound() == Some(channel.clone()) {
                    let count = history.len();
                    self.log.lock().seed(history);
                    tracing::debug!(channel = %channel, count, "history seeded");
                }
            }
            Err(e) => tracing::warn!(error = %e, "history fetch failed, starting empty"),
        }
        Some(channel)
    }

    /// Closes the active conversation: leaves the channel and clears the
    /// log, peer, and suggestion list.
    pub async fn close_conversation(&self) {
        self.binding.unbind().await;
        *self.peer.lock() = None;
        self.trigger.clear();
        self.log.lock().seed(Vec::new());
    }

    /// Snapshot of the conversation's ordered message records.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.log.lock().messages().to_vec()
    }

    /// Snapshot of the current reply-suggestion list.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        self.trigger.suggestions()
    }

    /// Takes the suggestion at `index`, clearing the rest of the batch.
    pub fn consume_suggestion(&self, index: usize) -> Option<String> {
        self.trigger.consume(index)
    }

    /// The channel of the open conversation, if any.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelId> {
        self.binding.bound()
    }

    /// Current transport connection state as tracked by the session.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }
}
