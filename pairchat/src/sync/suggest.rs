//! Reply suggestion triggering.
//!
//! Each message inserted from the remote participant kicks off a
//! suggestion fetch. Fetches race; a generation counter makes the most
//! recently started fetch the only one allowed to publish, so the list
//! always reflects the latest peer message. Fetch failures degrade to an
//! empty list and never surface as errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pairchat_proto::message::{Message, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::SyncEvent;
use crate::api::MessageApi;

/// Keeps the reply-suggestion list for the active conversation.
pub struct SuggestionTrigger<A> {
    api: Arc<A>,
    local_user: UserId,
    suggestions: Arc<Mutex<Vec<String>>>,
    generation: Arc<AtomicU64>,
    events: mpsc::Sender<SyncEvent>,
}

impl<A> Clone for SuggestionTrigger<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            local_user: self.local_user.clone(),
            suggestions: Arc::clone(&self.suggestions),
            generation: Arc::clone(&self.generation),
            events: self.events.clone(),
        }
    }
}

impl<A: MessageApi + 'static> SuggestionTrigger<A> {
    pub(crate) fn new(api: Arc<A>, local_user: UserId, events: mpsc::Sender<SyncEvent>) -> Self {
        Self {
            api,
            local_user,
            suggestions: Arc::new(Mutex::new(Vec::new())),
            generation: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    /// Snapshot of the current suggestion list.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        self.suggestions.lock().clone()
    }

    /// Clears the list and invalidates any in-flight fetch. Called when
    /// the conversation changes or the author sends a message.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.suggestions.lock().clear();
    }

    /// Takes the suggestion at `index` and clears the rest; picking one
    /// consumes the whole batch.
    pub fn consume(&self, index: usize) -> Option<String> {
        let mut suggestions = self.suggestions.lock();
        if index >= suggestions.len() {
            return None;
        }
        let picked = suggestions.swap_remove(index);
        suggestions.clear();
        drop(suggestions);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Some(picked)
    }

    /// Reacts to a newly inserted record.
    ///
    /// Only messages authored by the remote participant trigger a fetch.
    /// The fetch runs in the background; by the time it resolves, a newer
    /// fetch or a clear may have superseded it, in which case its result
    /// is discarded.
    pub(crate) fn observe_insert(&self, message: &Message, peer: &UserId) {
        if message.payload.sender_id == self.local_user {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let trigger = self.clone();
        let peer = peer.clone();
        tokio::spawn(async move {
            let result = trigger.api.reply_suggestions(&peer).await;
            if trigger.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("discarding superseded suggestion fetch");
                return;
            }
            let batch = match result {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(error = %e, "suggestion fetch failed");
                    Vec::new()
                }
            };
            let count = batch.len();
            *trigger.suggestions.lock() = batch;
            let _ = trigger.events.try_send(SyncEvent::SuggestionsUpdated { count });
        });
    }
}
