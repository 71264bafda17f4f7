//! Query generation.
//!
//! The stages, in the order a run uses them:
//!
//! 1. **Taxonomy** - turn a scenario description into functional domains
//!    and intents ([`TaxonomyExtractor`]).
//! 2. **Prompting** - build the category-specific prompt pair for one
//!    (domain, category) pair ([`PromptBuilder`]).
//! 3. **Parsing** - pull candidate objects out of whatever text the backend
//!    returned ([`parse_candidates`]).
//! 4. **Quota loop** - request, canonicalize and deduplicate until the pair's
//!    quota is met or attempts run out ([`QuotaLoop`]).
//! 5. **Assembly** - merge all pairs, deduplicate across the whole dataset,
//!    fill defaults and assign identifiers ([`DatasetAssembler`]).
//!
//! # Example
//!
//! ```ignore
//! use query_forge::generator::{PromptBuilder, QuotaLoop, QuotaSettings};
//!
//! let quota = QuotaLoop::new(provider, canonicalizer, PromptBuilder::default(), sampling, QuotaSettings::default());
//! let outcome = quota.run_pair(&scenario, "导航", Category::Base, 20).await?;
//! println!("{} of {}", outcome.delivered(), outcome.requested);
//! ```

pub mod assembler;
pub mod parser;
pub mod prompt;
pub mod quota;
pub mod record;
pub mod taxonomy;

pub use assembler::{AssemblyStats, Dataset, DatasetAssembler};
pub use parser::{parse_candidates, parse_object, Candidate};
pub use prompt::{scoped_scenario, PromptBuilder, PromptSpec, DEFAULT_LANGUAGE};
pub use quota::{
    next_batch, AttemptStats, PairOutcome, PairState, QuotaLoop, QuotaSettings,
    DEFAULT_BACKEND_TIMEOUT, DEFAULT_BATCH_CEILING, DEFAULT_MAX_ATTEMPTS,
};
pub use record::{
    CandidateRejection, DraftRecord, RecordIdGenerator, TestQueryRecord, DEFAULT_DIFFICULTY,
    DEFAULT_DOMAIN, DEFAULT_LABEL,
};
pub use taxonomy::{
    taxonomy_from_reply, Domain, DomainTaxonomy, TaxonomyExtractor, TaxonomyLimits,
    MAX_DOMAIN_TOKENS, MAX_INTENT_CHARS,
};
