//! # Foreman Core
//!
//! Domain types, traits, and error definitions for the Foreman agent runner.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The provider backends, the memory log, and the conversation engine all
//! depend inward on this crate. The `Provider` trait is the single seam the
//! engine needs from a backend, which keeps tests free of any HTTP stack.

pub mod error;
pub mod message;
pub mod model_ref;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, FailureClass, MemoryError, ProviderError, Result};
pub use message::{Message, Role, ToolCall, ToolResultBlock};
pub use model_ref::ModelRef;
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StopReason, ToolDefinition, Usage,
};
