//! `PairChat` client engine: keeps a local one-to-one conversation view
//! consistent with the backend under optimistic sends, socket echoes,
//! persistence races, and reconnects.
//!
//! The entry point is [`sync::ConversationSession`], which owns the
//! ordered message log for the active conversation and drives it from
//! three inputs: local sends, transport events, and persistence results.

pub mod api;
pub mod channel;
pub mod config;
pub mod logging;
pub mod reconnect;
pub mod sync;
pub mod transport;
