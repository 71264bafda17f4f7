//! query_forge: synthetic test query generator for NLU and voice assistants.
//!
//! This library prompts an LLM for user queries, canonicalizes and
//! deduplicates them under per-(domain, category) quotas, exports the
//! resulting datasets, and replays them against a classifier endpoint.

// Core modules
pub mod categories;
pub mod cli;
pub mod diversity;
pub mod error;
pub mod eval;
pub mod export;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod text;
pub mod utils;

// Re-export commonly used error types
pub use error::{EvalError, ExportError, GenerationError, LlmError};
pub use pipeline::ConfigError;
