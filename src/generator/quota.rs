//! Quota fulfillment for one (domain, category) pair.
//!
//! Each pair moves through
//! `Pending -> Requesting -> Accumulating -> {Satisfied, Exhausted}`,
//! looping back to `Requesting` while need remains and attempts are left.
//! Every backend call is bounded by a timeout; a timed-out, failed or
//! unparseable attempt simply yields zero records and uses up one attempt.
//!
//! One [`QuotaLoop`] serves a whole run and owns a single duplicate filter,
//! so a candidate already accepted by any pair is rejected everywhere else
//! and the pair keeps asking for replacements.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::categories::Category;
use crate::diversity::DuplicateFilter;
use crate::error::LlmError;
use crate::generator::parser::parse_candidates;
use crate::generator::prompt::PromptBuilder;
use crate::generator::record::{CandidateRejection, DraftRecord};
use crate::llm::{LlmProvider, SamplingParams};
use crate::text::Canonicalizer;

/// Default per-call batch ceiling.
pub const DEFAULT_BATCH_CEILING: usize = 200;
/// Default attempt ceiling per pair.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default backend timeout per call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    Pending,
    Requesting,
    Accumulating,
    Satisfied,
    Exhausted,
}

/// Limits for one pair's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSettings {
    /// Most records requested from the backend in one call.
    pub batch_ceiling: usize,
    /// Most backend calls per pair.
    pub max_attempts: usize,
    /// Bound on each backend call.
    pub backend_timeout: Duration,
    /// Propagate backend transport/auth failures instead of retrying.
    pub fail_fast: bool,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            batch_ceiling: DEFAULT_BATCH_CEILING,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            fail_fast: false,
        }
    }
}

/// Where candidates went, summed over a pair's attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    /// Candidates the parser returned.
    pub candidates: usize,
    /// Attempts cut off by the backend timeout.
    pub timeouts: usize,
    /// Attempts that failed with a backend error.
    pub backend_failures: usize,
    /// Attempts whose reply produced no candidates.
    pub parse_empty: usize,
    /// Candidates without a usable query.
    pub missing_query: usize,
    /// Candidates outside the length bounds.
    pub length_rejections: usize,
    /// Candidates whose signature was already accepted in this run.
    pub duplicates: usize,
}

/// Result of running one pair to completion.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub domain: String,
    pub category: Category,
    pub requested: usize,
    /// Accepted drafts in arrival order, never more than `requested`.
    pub records: Vec<DraftRecord>,
    pub attempts: usize,
    pub state: PairState,
    pub stats: AttemptStats,
}

impl PairOutcome {
    pub fn delivered(&self) -> usize {
        self.records.len()
    }

    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.records.len())
    }
}

/// Drives prompt, backend, parser, canonicalizer and duplicate filter for a pair.
pub struct QuotaLoop {
    provider: Arc<dyn LlmProvider>,
    canonicalizer: Arc<Canonicalizer>,
    prompts: PromptBuilder,
    sampling: SamplingParams,
    settings: QuotaSettings,
    seen: Mutex<DuplicateFilter>,
}

impl QuotaLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        canonicalizer: Arc<Canonicalizer>,
        prompts: PromptBuilder,
        sampling: SamplingParams,
        settings: QuotaSettings,
    ) -> Self {
        let seen = Mutex::new(DuplicateFilter::new(Arc::clone(&canonicalizer)));
        Self {
            provider,
            canonicalizer,
            prompts,
            sampling,
            settings,
            seen,
        }
    }

    /// Runs the loop for one pair.
    ///
    /// # Errors
    ///
    /// Only under fail-fast, with the first non-timeout backend error.
    /// Timeouts, unparseable replies and shortfalls are never errors.
    pub async fn run_pair(
        &self,
        scenario: &str,
        domain: &str,
        category: Category,
        requested: usize,
    ) -> Result<PairOutcome, LlmError> {
        let mut outcome = PairOutcome {
            domain: domain.to_string(),
            category,
            requested,
            records: Vec::new(),
            attempts: 0,
            state: PairState::Pending,
            stats: AttemptStats::default(),
        };
        if requested == 0 {
            outcome.state = PairState::Satisfied;
            return Ok(outcome);
        }

        while outcome.attempts < self.settings.max_attempts {
            outcome.state = PairState::Requesting;
            outcome.attempts += 1;
            let attempt = outcome.attempts;
            let batch = next_batch(self.settings.batch_ceiling, outcome.shortfall());

            debug!(
                domain = %domain,
                category = %category,
                attempt,
                batch,
                "Requesting candidates"
            );

            let request = self
                .prompts
                .build(scenario, category, batch)
                .to_request(&self.sampling);
            let reply = match tokio::time::timeout(
                self.settings.backend_timeout,
                self.provider.generate(request),
            )
            .await
            {
                Err(_) => {
                    outcome.stats.timeouts += 1;
                    warn!(
                        domain = %domain,
                        category = %category,
                        attempt,
                        timeout_secs = self.settings.backend_timeout.as_secs_f64(),
                        "Backend call timed out"
                    );
                    continue;
                }
                Ok(Err(err @ LlmError::Timeout { .. })) => {
                    outcome.stats.timeouts += 1;
                    warn!(
                        domain = %domain,
                        category = %category,
                        attempt,
                        error = %err,
                        "Backend call timed out"
                    );
                    continue;
                }
                Ok(Err(err)) => {
                    if self.settings.fail_fast {
                        return Err(err);
                    }
                    outcome.stats.backend_failures += 1;
                    warn!(
                        domain = %domain,
                        category = %category,
                        attempt,
                        error = %err,
                        "Backend call failed"
                    );
                    continue;
                }
                Ok(Ok(response)) => response.first_content().unwrap_or_default().to_string(),
            };

            outcome.state = PairState::Accumulating;
            let candidates = parse_candidates(&reply);
            outcome.stats.candidates += candidates.len();
            if candidates.is_empty() {
                outcome.stats.parse_empty += 1;
                warn!(
                    domain = %domain,
                    category = %category,
                    attempt,
                    reply_chars = reply.chars().count(),
                    "Backend reply yielded no candidates"
                );
            }

            let mut seen = self.seen.lock().await;
            for candidate in &candidates {
                match DraftRecord::from_candidate(candidate, &self.canonicalizer, category, domain) {
                    Err(CandidateRejection::MissingQuery) => outcome.stats.missing_query += 1,
                    Err(CandidateRejection::Length) => outcome.stats.length_rejections += 1,
                    Ok(draft) => {
                        if !seen.is_new(&draft.query) {
                            outcome.stats.duplicates += 1;
                            continue;
                        }
                        outcome.records.push(draft);
                        if outcome.records.len() >= requested {
                            outcome.state = PairState::Satisfied;
                            break;
                        }
                    }
                }
            }
            drop(seen);

            debug!(
                domain = %domain,
                category = %category,
                attempt,
                delivered = outcome.records.len(),
                requested,
                "Attempt finished"
            );

            if outcome.state == PairState::Satisfied {
                break;
            }
        }

        if outcome.state != PairState::Satisfied {
            outcome.state = PairState::Exhausted;
        }

        info!(
            domain = %domain,
            category = %category,
            delivered = outcome.delivered(),
            requested,
            attempts = outcome.attempts,
            state = ?outcome.state,
            "Pair finished"
        );
        Ok(outcome)
    }
}

/// Size of the next request: the remaining need, capped by the ceiling.
pub fn next_batch(ceiling: usize, remaining: usize) -> usize {
    remaining.min(ceiling).max(1)
}
