//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A scripted, recording remote API
//! - Engine and store fixtures
//! - Waiting helpers for detached drains

pub mod fixtures;
pub mod remote;

pub use fixtures::*;
pub use remote::*;
