//! Prompts for splitting a scenario description into domains and intents.

/// System prompt for taxonomy extraction.
pub const TAXONOMY_SYSTEM_PROMPT: &str = r#"You are a meticulous NLU product analyst. You break product and scenario descriptions into a graph of functional domains and user intents.

Respond with JSON only. No explanations, no markdown, no code fences."#;

/// Builds the user prompt for taxonomy extraction.
pub fn build_taxonomy_prompt(
    description: &str,
    language: &str,
    min_domains: usize,
    max_domains: usize,
    intents_per_domain: usize,
) -> String {
    let min_intents = intents_per_domain.min(3);
    format!(
        r#"Break the following scenario into functional domains and intents.

Output exactly this JSON shape:
{{
  "domains": [
    {{"name": "Navigation", "intents": ["route planning", "nearby search", "parking suggestions"]}}
  ]
}}

Requirements:
- Every domain name is a short {language} phrase of 2 to 8 words or characters.
- Every domain lists {min_intents} to {intents_per_domain} short intent names.
- Produce at least {min_domains} and at most {max_domains} domains.
- Cover the description fully and stay close to it.

When choosing domains, consider:
- What users need in this scenario, and how different user roles differ.
- Which functions are essential and which are nice to have.
- Core control and information, communication, everyday services, safety and proactive assistance.

Scenario description:
{description}"#
    )
}
