//! Merging per-pair results into one finished dataset.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::categories::Category;
use crate::diversity::DuplicateFilter;
use crate::generator::record::{DraftRecord, RecordIdGenerator, TestQueryRecord};
use crate::text::Canonicalizer;

/// What the assembler removed on the way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    /// Records handed to the assembler.
    pub input: usize,
    /// Records whose query was empty (or out of bounds, when enforced).
    pub dropped_invalid: usize,
    /// Records removed by the whole-dataset duplicate pass.
    pub duplicates_removed: usize,
}

/// An ordered, deduplicated, default-filled set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<TestQueryRecord>,
    #[serde(default)]
    pub stats: AssemblyStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn counts_by_domain(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.domain.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Merges drafts in the supplied order and finishes them into records.
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    canonicalizer: Arc<Canonicalizer>,
    enforce_length: bool,
}

impl DatasetAssembler {
    pub fn new(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            canonicalizer,
            enforce_length: true,
        }
    }

    /// Whether queries outside the policy's length bounds are dropped.
    ///
    /// On by default; cleaning an existing file turns it off so only empty
    /// queries are removed.
    pub fn with_length_bounds(mut self, enforce: bool) -> Self {
        self.enforce_length = enforce;
        self
    }

    /// Assembles groups of drafts, e.g. one group per (domain, category) pair.
    ///
    /// Groups are merged in iteration order; within a group, draft order is
    /// kept. A fresh whole-dataset duplicate pass runs over the union, so
    /// identical queries from different pairs collapse onto the first one.
    pub fn assemble<I>(&self, groups: I) -> Dataset
    where
        I: IntoIterator<Item = Vec<DraftRecord>>,
    {
        let drafts: Vec<DraftRecord> = groups.into_iter().flatten().collect();
        let mut ids = RecordIdGenerator::new();
        let (kept, stats) = self.filter(drafts);
        let records: Vec<TestQueryRecord> = kept
            .into_iter()
            .map(|draft| {
                let id = ids.next_id(draft.category);
                draft.finalize(id)
            })
            .collect();
        info!(
            records = records.len(),
            duplicates_removed = stats.duplicates_removed,
            dropped_invalid = stats.dropped_invalid,
            "Assembled dataset"
        );
        Dataset { records, stats }
    }

    /// Re-assembles already-finished records, keeping their identifiers
    /// where they are present and unique.
    pub fn reassemble(&self, records: Vec<TestQueryRecord>) -> Dataset {
        let mut wanted_ids = Vec::with_capacity(records.len());
        let mut drafts = Vec::with_capacity(records.len());
        for record in records {
            wanted_ids.push(record.id.trim().to_string());
            drafts.push(record.into_draft());
        }

        let mut ids = RecordIdGenerator::new();
        let (kept, stats) = self.filter_indexed(drafts);
        let mut claimed = HashSet::new();
        let mut records = Vec::with_capacity(kept.len());
        for (index, draft) in kept {
            let wanted = &wanted_ids[index];
            let id = if !wanted.is_empty() && claimed.insert(wanted.clone()) && ids.reserve(wanted) {
                wanted.clone()
            } else {
                let fresh = ids.next_id(draft.category);
                debug!(old = %wanted, new = %fresh, "Reissued record id");
                fresh
            };
            records.push(draft.finalize(id));
        }
        Dataset { records, stats }
    }

    fn filter(&self, drafts: Vec<DraftRecord>) -> (Vec<DraftRecord>, AssemblyStats) {
        let (kept, stats) = self.filter_indexed(drafts);
        (kept.into_iter().map(|(_, d)| d).collect(), stats)
    }

    fn filter_indexed(&self, drafts: Vec<DraftRecord>) -> (Vec<(usize, DraftRecord)>, AssemblyStats) {
        let mut stats = AssemblyStats {
            input: drafts.len(),
            ..AssemblyStats::default()
        };
        let mut filter = DuplicateFilter::new(Arc::clone(&self.canonicalizer));
        let mut kept = Vec::with_capacity(drafts.len());

        for (index, mut draft) in drafts.into_iter().enumerate() {
            let query = if self.enforce_length {
                self.canonicalizer.candidate(&draft.query)
            } else {
                Some(self.canonicalizer.display(&draft.query)).filter(|q| !q.is_empty())
            };
            let Some(query) = query else {
                stats.dropped_invalid += 1;
                continue;
            };
            if !filter.is_new(&query) {
                stats.duplicates_removed += 1;
                continue;
            }
            draft.query = query;
            if let Some(context) = draft.context.take() {
                let context = self.canonicalizer.display(&context);
                draft.context = (!context.is_empty()).then_some(context);
            }
            kept.push((index, draft));
        }

        (kept, stats)
    }
}
