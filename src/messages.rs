//! Unified, provider-agnostic message architecture.
//!
//! Re-exports the message types used throughout the crate, including by the
//! gateway's dispatcher (`gateway::dispatch`) when translating admitted
//! requests into provider calls.

pub use crate::core_types::messages::*;
