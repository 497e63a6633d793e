//! # Foreman Memory
//!
//! The append-only, timestamp-delimited memory log, one text file per agent,
//! with bounded tail reads and atomic retention trimming.

mod log;

pub use log::{MemoryLog, TrimOutcome, ENTRY_MARKER, RESULT_LIMIT};
