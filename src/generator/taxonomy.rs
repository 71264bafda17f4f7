//! Domain/intent extraction from a scenario description.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::generator::parser::parse_object;
use crate::generator::record::DEFAULT_DOMAIN;
use crate::llm::{GenerationRequest, LlmProvider, Message, SamplingParams};
use crate::prompts::{build_taxonomy_prompt, TAXONOMY_SYSTEM_PROMPT};
use crate::text::Canonicalizer;

/// Longest intent name kept, in characters.
pub const MAX_INTENT_CHARS: usize = 24;
/// Most meaningful tokens a domain name may have.
pub const MAX_DOMAIN_TOKENS: usize = 8;

/// One functional area and the intents it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub intents: Vec<String>,
}

impl Domain {
    /// The synthetic domain used when extraction yields nothing.
    pub fn general() -> Self {
        Self {
            name: DEFAULT_DOMAIN.to_string(),
            intents: Vec::new(),
        }
    }
}

/// Extracted domain graph for one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTaxonomy {
    /// The scenario description, canonicalized.
    pub description: String,
    pub domains: Vec<Domain>,
    /// Whether the single "general" fallback domain was substituted.
    #[serde(default)]
    pub fallback: bool,
}

impl DomainTaxonomy {
    /// A taxonomy holding only the "general" domain.
    pub fn fallback(description: String) -> Self {
        Self {
            description,
            domains: vec![Domain::general()],
            fallback: true,
        }
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Bounds applied to an extracted taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonomyLimits {
    pub min_domains: usize,
    pub max_domains: usize,
    pub intents_per_domain: usize,
}

impl Default for TaxonomyLimits {
    fn default() -> Self {
        Self {
            min_domains: 4,
            max_domains: 8,
            intents_per_domain: 6,
        }
    }
}

/// Asks the backend for a domain graph and normalizes the reply.
pub struct TaxonomyExtractor {
    provider: Arc<dyn LlmProvider>,
    canonicalizer: Arc<Canonicalizer>,
    sampling: SamplingParams,
    limits: TaxonomyLimits,
    language: String,
    timeout: Duration,
    fail_fast: bool,
}

impl TaxonomyExtractor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        canonicalizer: Arc<Canonicalizer>,
        sampling: SamplingParams,
        limits: TaxonomyLimits,
    ) -> Self {
        Self {
            provider,
            canonicalizer,
            sampling,
            limits,
            language: crate::generator::prompt::DEFAULT_LANGUAGE.to_string(),
            timeout: Duration::from_secs(30),
            fail_fast: false,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Propagate backend failures instead of falling back.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Extracts the taxonomy for a description.
    ///
    /// Unparseable replies fall back to the single "general" domain. Backend
    /// failures and timeouts do the same unless fail-fast is set.
    pub async fn extract(&self, description: &str) -> Result<DomainTaxonomy, LlmError> {
        let description = self.canonicalizer.display(description);
        let prompt = build_taxonomy_prompt(
            &description,
            &self.language,
            self.limits.min_domains,
            self.limits.max_domains,
            self.limits.intents_per_domain,
        );
        let request = GenerationRequest::new(
            self.sampling.model.clone(),
            vec![Message::system(TAXONOMY_SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_temperature(self.sampling.temperature)
        .with_max_tokens(self.sampling.max_tokens);

        let outcome = match tokio::time::timeout(self.timeout, self.provider.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        };

        let reply = match outcome {
            Ok(response) => response.first_content().unwrap_or_default().to_string(),
            Err(err) if self.fail_fast && !matches!(err, LlmError::Timeout { .. }) => {
                return Err(err)
            }
            Err(err) => {
                warn!(error = %err, "Taxonomy backend call failed, using fallback domain");
                return Ok(DomainTaxonomy::fallback(description));
            }
        };

        let taxonomy = taxonomy_from_reply(&description, &reply, &self.limits, &self.canonicalizer);
        if taxonomy.fallback {
            warn!("Taxonomy reply had no usable domains, using fallback domain");
        } else {
            info!(
                domains = taxonomy.domains.len(),
                names = ?taxonomy.domain_names(),
                "Extracted taxonomy"
            );
        }
        Ok(taxonomy)
    }
}

/// Builds a normalized taxonomy from a raw backend reply.
///
/// Domain names and intents are canonicalized; intents are deduplicated,
/// length-bounded and capped; domains without intents, with unusable names
/// or repeating an earlier name are dropped; the list is cut to
/// `max_domains`. An empty result becomes the "general" fallback.
pub fn taxonomy_from_reply(
    description: &str,
    reply: &str,
    limits: &TaxonomyLimits,
    canonicalizer: &Canonicalizer,
) -> DomainTaxonomy {
    let entries = parse_object(reply)
        .and_then(|obj| obj.get("domains").and_then(Value::as_array).cloned())
        .unwrap_or_default();

    let mut seen_names = HashSet::new();
    let mut domains = Vec::new();

    for entry in &entries {
        let Some(raw_name) = ["name", "domain", "title"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
        else {
            continue;
        };
        let name = canonicalizer.display(raw_name);
        if !is_usable_domain_name(&name) {
            warn!(name = %name, "Dropping domain with unusable name");
            continue;
        }
        if !seen_names.insert(name.to_lowercase()) {
            continue;
        }

        let intents = entry
            .get("intents")
            .and_then(Value::as_array)
            .map(|items| normalize_intents(items, limits.intents_per_domain, canonicalizer))
            .unwrap_or_default();
        if intents.is_empty() {
            continue;
        }

        domains.push(Domain { name, intents });
        if domains.len() == limits.max_domains {
            break;
        }
    }

    if domains.is_empty() {
        return DomainTaxonomy::fallback(description.to_string());
    }
    if domains.len() < limits.min_domains {
        warn!(
            domains = domains.len(),
            min_domains = limits.min_domains,
            "Taxonomy has fewer domains than requested"
        );
    }

    DomainTaxonomy {
        description: description.to_string(),
        domains,
        fallback: false,
    }
}

fn normalize_intents(items: &[Value], cap: usize, canonicalizer: &Canonicalizer) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => ["name", "id", "intent"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str)),
            _ => None,
        })
        .map(|s| canonicalizer.display(s))
        .filter(|s| !s.is_empty() && s.chars().count() <= MAX_INTENT_CHARS)
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(cap)
        .collect()
}

/// Counts meaningful tokens: each CJK character and each other word.
fn name_tokens(name: &str) -> usize {
    name.split_whitespace()
        .map(|word| {
            let cjk = word.chars().filter(|c| is_cjk(*c)).count();
            let has_other = word.chars().any(|c| c.is_alphanumeric() && !is_cjk(c));
            cjk + usize::from(has_other)
        })
        .sum()
}

/// A domain name has 2 to 8 tokens; a single non-CJK word is also accepted.
fn is_usable_domain_name(name: &str) -> bool {
    let tokens = name_tokens(name);
    let single_word = tokens == 1 && name.chars().all(|c| !is_cjk(c)) && !name.contains(' ');
    (2..=MAX_DOMAIN_TOKENS).contains(&tokens) || single_word
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}
