//! LLM prompts for query generation and taxonomy extraction.
//!
//! - [`categories`] - per-category instruction fragments (a tagged-variant table)
//! - [`taxonomy`] - domain/intent extraction prompt
//!
//! Query-generation prompts are assembled by
//! [`crate::generator::prompt::PromptBuilder`] from the pieces here.

pub mod categories;
pub mod taxonomy;

pub use categories::{guidance_for, CategoryGuidance, CATEGORY_GUIDANCE};
pub use taxonomy::{build_taxonomy_prompt, TAXONOMY_SYSTEM_PROMPT};
