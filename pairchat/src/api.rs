//! HTTP-style persistence and suggestion backend.
//!
//! The socket path delivers messages in real time; [`MessageApi`] is the
//! durable side: persisting sends, fetching conversation history, and
//! requesting reply suggestions. [`StubApi`] is an in-memory
//! implementation used by the integration tests and by embedders that
//! want to run the engine offline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use pairchat_proto::channel::ChannelId;
use pairchat_proto::message::{Attachment, MessageId, MessagePayload, Timestamp, UserId};
use parking_lot::Mutex;

/// Errors returned by the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be completed (network failure, server error).
    #[error("request failed: {0}")]
    Request(String),
    /// The server processed the request and rejected the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Body of a persistence request for one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Message body, if any.
    pub text: Option<String>,
    /// Inline image attachment, if any.
    pub attachment: Option<Attachment>,
    /// The conversation channel the message belongs to.
    pub channel_id: ChannelId,
}

/// Durable message backend for one authenticated user.
pub trait MessageApi: Send + Sync {
    /// Persists a message addressed to `peer`, returning the authoritative
    /// stored record. The response carries a server-assigned id and may
    /// omit the client correlation key.
    fn send_message(
        &self,
        peer: &UserId,
        message: &NewMessage,
    ) -> impl Future<Output = Result<MessagePayload, ApiError>> + Send;

    /// Fetches reply suggestions for the conversation with `peer`.
    fn reply_suggestions(
        &self,
        peer: &UserId,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    /// Fetches the stored conversation history with `peer`, oldest first.
    fn history(
        &self,
        peer: &UserId,
    ) -> impl Future<Output = Result<Vec<MessagePayload>, ApiError>> + Send;
}

/// Scriptable in-memory [`MessageApi`].
///
/// By default every send succeeds with a fresh server id, suggestions
/// come back empty, and history is whatever was seeded. Failures and
/// delayed suggestion batches can be queued ahead of time.
pub struct StubApi {
    local_user: UserId,
    local_name: String,
    next_id: AtomicU64,
    send_failures: Mutex<VecDeque<ApiError>>,
    send_delay: Mutex<Duration>,
    suggestion_script: Mutex<VecDeque<(Duration, Result<Vec<String>, ApiError>)>>,
    history: Mutex<Vec<MessagePayload>>,
    send_calls: AtomicUsize,
    suggestion_calls: AtomicUsize,
}

impl StubApi {
    /// Creates a stub acting as the backend for `local_user`.
    pub fn new(local_user: UserId, local_name: impl Into<String>) -> Self {
        Self {
            local_user,
            local_name: local_name.into(),
            next_id: AtomicU64::new(1),
            send_failures: Mutex::new(VecDeque::new()),
            send_delay: Mutex::new(Duration::ZERO),
            suggestion_script: Mutex::new(VecDeque::new()),
            history: Mutex::new(Vec::new()),
            send_calls: AtomicUsize::new(0),
            suggestion_calls: AtomicUsize::new(0),
        }
    }

    /// Queues a failure for the next unscripted send.
    pub fn fail_next_send(&self, error: ApiError) {
        self.send_failures.lock().push_back(error);
    }

    /// Delays every persistence request by `delay` before it resolves.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = delay;
    }

    /// Queues a suggestion response, resolved after `delay`.
    pub fn queue_suggestions(&self, delay: Duration, result: Result<Vec<String>, ApiError>) {
        self.suggestion_script.lock().push_back((delay, result));
    }

    /// Seeds the stored history returned by [`MessageApi::history`].
    pub fn seed_history(&self, messages: Vec<MessagePayload>) {
        *self.history.lock() = messages;
    }

    /// Number of persistence calls made so far.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Number of suggestion fetches made so far.
    pub fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }
}

impl MessageApi for StubApi {
    async fn send_message(
        &self,
        peer: &UserId,
        message: &NewMessage,
    ) -> Result<MessagePayload, ApiError> {
        let _ = peer;
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.send_failures.lock().pop_front() {
            return Err(error);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // A real backend identifies the author from the session, not the
        // request body, and does not echo the client correlation key.
        Ok(MessagePayload {
            id: Some(MessageId::new(format!("m{id}"))),
            client_id: None,
            channel_id: message.channel_id.clone(),
            sender_id: self.local_user.clone(),
            sender_name: self.local_name.clone(),
            text: message.text.clone(),
            attachment: message.attachment.clone(),
            created_at: Timestamp::now(),
        })
    }

    async fn reply_suggestions(&self, peer: &UserId) -> Result<Vec<String>, ApiError> {
        let _ = peer;
        self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.suggestion_script.lock().pop_front();
        match scripted {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(Vec::new()),
        }
    }

    async fn history(&self, peer: &UserId) -> Result<Vec<MessagePayload>, ApiError> {
        let _ = peer;
        Ok(self.history.lock().clone())
    }
}
