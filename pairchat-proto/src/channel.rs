//! Channel identifiers for two-party conversations.
//!
//! A channel is the deterministic, symmetric scope for a one-to-one
//! conversation's real-time events: both participants derive the same
//! [`ChannelId`] regardless of which side computes it, so both join the
//! same room without coordination.

use serde::{Deserialize, Serialize};

use crate::message::UserId;

/// Separator between the two participant ids in a channel identifier.
const SEPARATOR: char = ':';

/// Deterministic identifier scoping a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    /// Derives the channel identifier for a pair of participants.
    ///
    /// The two ids are sorted before joining, so the derivation is
    /// symmetric: `between(a, b) == between(b, a)`.
    #[must_use]
    pub fn between(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}{SEPARATOR}{}", lo.as_str(), hi.as_str()))
    }

    /// Reconstructs a `ChannelId` from its wire representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
