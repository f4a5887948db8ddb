//! Test suite for FieldSync
//!
//! This module organizes all integration tests

pub mod common;
pub mod integration;
