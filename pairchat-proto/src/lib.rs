//! Shared protocol definitions for the `PairChat` wire format.

pub mod channel;
pub mod codec;
pub mod event;
pub mod message;
