//! # Offline Mutation Queue
//!
//! Offline-first write path: the UI queues mutations here and keeps working
//! whether or not the server is reachable.
//!
//! ## Architecture
//!
//! - **Mutation Queue**: durable enqueue plus a best-effort drain kick
//! - **Optimistic Updates**: cache writes so reads reflect queued changes
//! - **Routing**: mutation to remote request mapping
//! - **Retry Logic**: backoff strategies shared with the live channel
//!
//! ## Key Components
//!
//! - `queue.rs`: the queue API
//! - `optimistic.rs`: optimistic entity cache writes
//! - `routing.rs`: the routing table
//! - `retry.rs`: retry policy and backoff strategies

pub mod optimistic;
pub mod queue;
pub mod retry;
pub mod routing;

pub use queue::{MutationQueue, QueueOptions, QueueReceipt};
pub use retry::{BackoffStrategy, RetryPolicy};
