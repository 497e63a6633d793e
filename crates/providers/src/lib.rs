//! # Foreman Providers
//!
//! Concrete LLM backends behind the `foreman_core::Provider` trait, plus
//! the router that builds the right backend for a parsed model reference.

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_provider;
