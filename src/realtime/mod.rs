//! # Real-time Channel
//!
//! Live server-to-client notifications. Unlike the mutation queue this path
//! is not durable: a dropped connection is simply reopened.
//!
//! ## Key Components
//!
//! - `reconnector.rs`: connection state machine with exponential backoff
//! - `inbox.rs`: SSE inbox stream and its parser

pub mod inbox;
pub mod reconnector;

pub use inbox::{InboxEvent, SseInboxChannel, SseParser};
pub use reconnector::{ChannelConnector, ChannelState, EventStream, Reconnector};
