//! # Foreman Agent
//!
//! The conversation engine that drives one agent invocation, the dispatcher
//! that fans delegation requests out to sub-agents, and the retention GC
//! flow over the memory log.

pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod gc;

pub use context::{assemble_system_prompt, SystemContext};
pub use engine::{Engine, ProviderResolver, RunOutcome, ConfigResolver, DELEGATE_TOOL, MAX_TURNS};
pub use gc::{run_gc, run_gc_all, GcReport};

#[cfg(test)]
pub(crate) mod test_support;
