//! The [`LlmProvider`] trait and the request/response types providers share.

pub use crate::core_types::provider::*;
