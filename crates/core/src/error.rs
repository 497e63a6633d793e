//! Error types for the Foreman domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Every failure the
//! system can hit falls into one of three classes ([`FailureClass`]):
//! configuration, caller/request, or provider/operational. The CLI maps the
//! class to a process exit code, so callers can distinguish "fix your
//! config" from "try again later" without parsing messages.

use thiserror::Error;

/// The top-level error type for all Foreman operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Agent not found: {name}")]
    AgentNotFound { name: String },

    #[error("Invalid model reference '{reference}': expected 'provider/model-name'")]
    InvalidModelRef { reference: String },

    #[error("No API key configured for provider '{provider}'")]
    MissingApiKey { provider: String },

    /// The backpressure limit against runaway delegation loops.
    #[error("Agent exceeded maximum conversation turns ({turns})")]
    TurnLimitExceeded { turns: u32 },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the three end-to-end failure classes an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Agent not found, malformed policy, invalid retention parameters.
    Config,
    /// Malformed model reference, unsupported provider, provider-rejected request.
    Caller,
    /// Auth, rate-limit, timeout, overloaded, server errors, missing credentials.
    Operational,
}

impl Error {
    /// Classify this error for exit-code mapping.
    pub fn class(&self) -> FailureClass {
        match self {
            Error::Config { .. } | Error::AgentNotFound { .. } => FailureClass::Config,
            Error::InvalidModelRef { .. } => FailureClass::Caller,
            Error::Provider(p) if p.is_caller_error() => FailureClass::Caller,
            Error::Provider(_) | Error::MissingApiKey { .. } => FailureClass::Operational,
            // Turn-budget overrun is its own failure mode, not a provider
            // error; it exits as operational.
            Error::TurnLimitExceeded { .. } => FailureClass::Operational,
            Error::Memory(_) | Error::Serialization(_) | Error::Internal(_) => {
                FailureClass::Operational
            }
        }
    }
}

// --- Bounded context errors ---

/// Categorized failures from a provider backend.
///
/// The first six variants are the wire-level categories; `Network` covers
/// transport failures below HTTP. Everything except `BadRequest` is
/// transient/operational.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    #[error("Provider server error (status {status_code}): {message}")]
    Server { status_code: u16, message: String },

    #[error("Provider rejected request (status {status_code}): {message}")]
    BadRequest { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// True for the one category the caller can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ProviderError::BadRequest { .. })
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
