//! Integration tests
//!
//! End-to-end behavior of the engine through its public API.

mod config_test;
mod drain_test;
mod http_api_test;
mod inbox_stream_test;
mod persistence_test;
mod queue_test;
