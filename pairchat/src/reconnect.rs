//! Reconnect handling.
//!
//! The server's room membership is connection-scoped: a dropped socket
//! silently unsubscribes the client from its conversation channel. The
//! [`ReconnectSupervisor`] watches connection lifecycle transitions and
//! re-issues the channel join exactly once per established connection,
//! so deliveries resume without any user action.

use pairchat_proto::channel::ChannelId;
use parking_lot::Mutex;

use crate::channel::ChannelBinding;
use crate::transport::Transport;

/// Connection lifecycle as observed from transport events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none being attempted that we know of.
    Disconnected,
    /// A connection attempt is underway (initial or retry).
    Connecting,
    /// The transport holds a live connection.
    Connected,
}

/// Re-joins the bound channel when the connection comes (back) up.
pub struct ReconnectSupervisor<T> {
    binding: ChannelBinding<T>,
    state: Mutex<ConnectionState>,
}

impl<T: Transport> ReconnectSupervisor<T> {
    /// Creates a supervisor over `binding`. The initial state is
    /// `Connecting`: the transport is assumed to be establishing its
    /// first connection when the engine starts.
    pub fn new(binding: ChannelBinding<T>) -> Self {
        Self {
            binding,
            state: Mutex::new(ConnectionState::Connecting),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Handles a `Connected` transition.
    ///
    /// On the edge into `Connected` the bound channel is re-joined and
    /// its id returned. Duplicate `Connected` events are no-ops, so one
    /// established connection never produces more than one join.
    pub async fn handle_connected(&self) -> Option<ChannelId> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Connected {
                return None;
            }
            *state = ConnectionState::Connected;
        }
        let rejoined = self.binding.rejoin().await;
        match &rejoined {
            Some(channel) => {
                tracing::info!(channel = %channel, "connection established, channel re-joined");
            }
            None => tracing::info!("connection established, no channel bound"),
        }
        rejoined
    }

    /// Handles a `Disconnected` transition. The channel binding is left
    /// intact; it is the intent to re-join with.
    pub fn handle_disconnected(&self, reason: &str) {
        *self.state.lock() = ConnectionState::Disconnected;
        tracing::warn!(reason = %reason, "connection lost");
    }

    /// Handles a failed connection attempt. The transport keeps retrying,
    /// so the state moves to `Connecting`.
    pub fn handle_connect_error(&self, error: &str) {
        *self.state.lock() = ConnectionState::Connecting;
        tracing::warn!(error = %error, "connection attempt failed");
    }
}
