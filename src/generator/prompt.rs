//! Generation prompt construction.
//!
//! The rules encoded here are requests to the model. Nothing downstream
//! assumes they were honored: counts, fields and formats are all re-checked.

use crate::categories::Category;
use crate::generator::taxonomy::Domain;
use crate::llm::{GenerationRequest, Message, SamplingParams};
use crate::prompts::guidance_for;
use crate::text::{DEFAULT_MAX_CHARS, DEFAULT_MIN_CHARS};

/// Target language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "Simplified Chinese";

/// A system/user instruction pair for one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub system: String,
    pub user: String,
}

impl PromptSpec {
    /// Wraps the pair into a backend request with the given sampling parameters.
    pub fn to_request(&self, sampling: &SamplingParams) -> GenerationRequest {
        GenerationRequest::new(
            sampling.model.clone(),
            vec![Message::system(&self.system), Message::user(&self.user)],
        )
        .with_temperature(sampling.temperature)
        .with_max_tokens(sampling.max_tokens)
    }
}

/// Builds generation prompts for a target language and length window.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    min_chars: usize,
    max_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            min_chars: DEFAULT_MIN_CHARS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    /// Sets the query length window quoted to the model.
    pub fn with_length_window(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_chars = min_chars;
        self.max_chars = max_chars;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Builds the instruction pair asking for `count` queries of `category`.
    pub fn build(&self, scenario: &str, category: Category, count: usize) -> PromptSpec {
        let guidance = guidance_for(category);
        let system = format!(
            r#"You are a strict test-set generator for a {language} voice assistant. Produce diverse, natural, colloquial test queries that fit the product scenario.

Rules:
1) Every query must be strongly related to the scenario and written in {language}.
2) Mild slips of the tongue are fine, but never use decorative symbols such as middle dots, and never use emoji.
3) No duplicates, including sentences that differ only in punctuation. Each query is {min} to {max} characters long.
4) Output a single JSON array. Every element is an object with:
   - "query": string
   - "expected_label": string, the intent name ("fallback" if it cannot be narrowed down)
   - "domain": string, the functional domain of the intent
   - "category": always "{category}"
   - "rationale": short explanation of what the query tests
   - "tags": array of strings, may be empty
   Optional fields: "context", "group_id", "step", "difficulty" (integer 1 to 5).
5) Output the JSON array only. No explanations, no prefixes, no code fences."#,
            language = self.language,
            min = self.min_chars,
            max = self.max_chars,
            category = category,
        );

        let user = format!(
            "[Scenario]\n{scenario}\n\n[Target category] {category}\n{instruction}\nTechniques: {techniques}\nAvoid: {avoid}\n\nProduce {count} items, never more, as one JSON array of objects.",
            scenario = scenario.trim(),
            category = category,
            instruction = guidance.instruction,
            techniques = guidance.techniques.join("; "),
            avoid = guidance.avoid.join("; "),
            count = count,
        );

        PromptSpec { system, user }
    }
}

/// Narrows a scenario description to one extracted domain.
pub fn scoped_scenario(description: &str, domain: &Domain) -> String {
    if domain.intents.is_empty() {
        format!("{} (functional domain: {})", description.trim(), domain.name)
    } else {
        format!(
            "{} (functional domain: {}; intents to cover: {})",
            description.trim(),
            domain.name,
            domain.intents.join(", ")
        )
    }
}
