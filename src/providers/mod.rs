//! LLM Provider implementations
//!
//! This module contains implementations for different LLM providers:
//!
//! - **anthropic**: Anthropic Claude provider with native API format
//! - **openai**: OpenAI provider using OpenAI-compatible API
//! - **lmstudio**: LM Studio provider using OpenAI-compatible API
//! - **openai_shared**: Shared structures and utilities for OpenAI-compatible providers
//!
//! ## Architecture
//!
//! The providers are organized to highlight code reuse:
//!
//! ```text
//! openai_shared.rs    <- Shared OpenAI-compatible structures and utilities
//!      |        |        |
//!      |        |        |
//! openai.rs  lmstudio.rs  ollama.rs  <- All use OpenAI-compatible API
//!
//! anthropic.rs        <- Uses Anthropic's native API format
//! ```

pub mod anthropic;
pub mod groq;
pub mod lmstudio;
pub mod ollama;
pub mod openai;
pub mod openai_shared;

// Re-export the provider structs
pub use anthropic::AnthropicProvider;
pub use groq::GroqProvider;
pub use lmstudio::LMStudioProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
