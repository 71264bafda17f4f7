//! Shared utility functions for query-forge.
//!
//! This module provides common utilities used across multiple modules,
//! including JSON extraction from LLM responses.

pub mod json_extraction;

pub use json_extraction::{
    fenced_blocks, find_matching_brace, find_matching_bracket, object_fragments, outermost_array,
    outermost_object,
};
