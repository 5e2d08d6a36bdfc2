//! Internal utilities for llm-gateway
//!
//! This module contains internal implementation details that are not part of the public API.
//! Some types are re-exported through `lib.rs` for public use (RetryPolicy, TokenCounter*).

pub mod retry;
pub mod tokens;
