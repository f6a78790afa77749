//! Channel membership for the active conversation.
//!
//! [`ChannelBinding`] tracks which conversation channel the client is
//! joined to and keeps the server's room membership in step: binding to a
//! new channel leaves the previous one first, and the reconnect layer
//! re-issues the join after a connection drop.

use std::sync::Arc;

use pairchat_proto::channel::ChannelId;
use pairchat_proto::event::ClientEvent;
use pairchat_proto::message::UserId;
use parking_lot::Mutex;

use crate::transport::Transport;

/// The client's single channel membership.
///
/// Clones share the same underlying binding, so a supervisor holding a
/// clone always sees the channel the session most recently bound.
pub struct ChannelBinding<T> {
    transport: Arc<T>,
    bound: Arc<Mutex<Option<ChannelId>>>,
}

impl<T> Clone for ChannelBinding<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            bound: Arc::clone(&self.bound),
        }
    }
}

impl<T: Transport> ChannelBinding<T> {
    /// Creates an unbound binding over `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            bound: Arc::new(Mutex::new(None)),
        }
    }

    /// Binds to the channel for the pair `(a, b)`.
    ///
    /// Returns `None` without side effects when either participant is
    /// missing. Binding to the already-bound channel is a no-op; binding
    /// to a different channel leaves the old one before joining the new.
    pub async fn bind(&self, a: Option<&UserId>, b: Option<&UserId>) -> Option<ChannelId> {
        let (a, b) = (a?, b?);
        let next = ChannelId::between(a, b);
        let previous = {
            let mut bound = self.bound.lock();
            if bound.as_ref() == Some(&next) {
                return Some(next);
            }
            bound.replace(next.clone())
        };
        if let Some(previous) = previous {
            self.emit_lifecycle(ClientEvent::LeaveChannel(previous)).await;
        }
        self.emit_lifecycle(ClientEvent::JoinChannel(next.clone())).await;
        Some(next)
    }

    /// Leaves the bound channel, if any.
    pub async fn unbind(&self) {
        let previous = self.bound.lock().take();
        if let Some(previous) = previous {
            self.emit_lifecycle(ClientEvent::LeaveChannel(previous)).await;
        }
    }

    /// Re-issues the join for the bound channel. Used after a reconnect,
    /// when the server has forgotten this client's room membership.
    pub(crate) async fn rejoin(&self) -> Option<ChannelId> {
        let channel = self.bound.lock().clone()?;
        self.emit_lifecycle(ClientEvent::JoinChannel(channel.clone())).await;
        Some(channel)
    }

    /// The currently bound channel, if any.
    pub fn bound(&self) -> Option<ChannelId> {
        self.bound.lock().clone()
    }

    /// Join and leave are fire-and-forget; an emit failure leaves local
    /// intent intact and the reconnect path repairs membership later.
    async fn emit_lifecycle(&self, event: ClientEvent) {
        if let Err(e) = self.transport.emit(&event).await {
            tracing::warn!(error = %e, "channel lifecycle emit failed");
        }
    }
}
