//! Per-pair fulfillment reporting.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::categories::Category;
use crate::generator::{AttemptStats, Dataset, DomainTaxonomy, PairOutcome, PairState};

/// How one (domain, category) pair fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub domain: String,
    pub category: Category,
    pub requested: usize,
    /// Records the pair loop accepted.
    pub accepted: usize,
    /// Records of this pair that survived into the assembled dataset.
    pub delivered: usize,
    pub attempts: usize,
    pub state: PairState,
    pub stats: AttemptStats,
}

impl PairReport {
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.delivered)
    }
}

impl PairReport {
    fn new(outcome: &PairOutcome, delivered: usize) -> Self {
        Self {
            domain: outcome.domain.clone(),
            category: outcome.category,
            requested: outcome.requested,
            accepted: outcome.delivered(),
            delivered,
            attempts: outcome.attempts,
            state: outcome.state,
            stats: outcome.stats,
        }
    }
}

/// A pair that ended below its quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortfallWarning {
    pub domain: String,
    pub category: Category,
    pub requested: usize,
    pub delivered: usize,
    pub missing: usize,
}

impl std::fmt::Display for ShortfallWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}: {}/{} (missing {})",
            self.domain, self.category, self.delivered, self.requested, self.missing
        )
    }
}

/// Structured summary of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentReport {
    pub generated_at: DateTime<Utc>,
    pub scenario: String,
    pub domains: Vec<String>,
    /// True when taxonomy extraction fell back to the "general" domain.
    pub taxonomy_fallback: bool,
    pub pairs: Vec<PairReport>,
    pub shortfalls: Vec<ShortfallWarning>,
    pub requested_total: usize,
    /// Records accepted by the pair loops, before the whole-dataset pass.
    pub accepted_total: usize,
    /// Pair records that survived into the dataset.
    pub delivered_total: usize,
    /// Records in the assembled dataset.
    pub final_records: usize,
    pub cross_pair_duplicates: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_domain: BTreeMap<String, usize>,
}

impl FulfillmentReport {
    /// Builds the report. Delivered counts come from `dataset`, so records
    /// dropped by the whole-dataset pass count against their pair's quota.
    pub fn new(taxonomy: &DomainTaxonomy, outcomes: &[PairOutcome], dataset: &Dataset) -> Self {
        let mut in_dataset: HashMap<(&str, Category), usize> = HashMap::new();
        for record in &dataset.records {
            *in_dataset.entry((record.domain.as_str(), record.category)).or_default() += 1;
        }
        let pairs: Vec<PairReport> = outcomes
            .iter()
            .map(|outcome| {
                let key = (outcome.domain.as_str(), outcome.category);
                let delivered = in_dataset.get(&key).copied().unwrap_or_default();
                PairReport::new(outcome, delivered.min(outcome.requested))
            })
            .collect();
        let shortfalls = pairs
            .iter()
            .filter(|p| p.shortfall() > 0)
            .map(|p| ShortfallWarning {
                domain: p.domain.clone(),
                category: p.category,
                requested: p.requested,
                delivered: p.delivered,
                missing: p.shortfall(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            scenario: taxonomy.description.clone(),
            domains: taxonomy.domain_names().into_iter().map(String::from).collect(),
            taxonomy_fallback: taxonomy.fallback,
            requested_total: pairs.iter().map(|p| p.requested).sum(),
            accepted_total: pairs.iter().map(|p| p.accepted).sum(),
            delivered_total: pairs.iter().map(|p| p.delivered).sum(),
            final_records: dataset.len(),
            cross_pair_duplicates: dataset.stats.duplicates_removed,
            by_category: dataset.counts_by_category(),
            by_domain: dataset.counts_by_domain(),
            pairs,
            shortfalls,
        }
    }

    pub fn has_shortfall(&self) -> bool {
        !self.shortfalls.is_empty()
    }

    /// One line listing every under-delivered pair.
    pub fn shortfall_summary(&self) -> String {
        self.shortfalls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Emits the run summary and one warning per shortfall.
    pub fn log(&self) {
        info!(
            domains = self.domains.len(),
            pairs = self.pairs.len(),
            requested = self.requested_total,
            accepted = self.accepted_total,
            delivered = self.delivered_total,
            records = self.final_records,
            "Generation finished"
        );
        for s in &self.shortfalls {
            warn!(
                domain = %s.domain,
                category = %s.category,
                requested = s.requested,
                delivered = s.delivered,
                missing = s.missing,
                "Quota shortfall"
            );
        }
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{DatasetAssembler, DraftRecord};
    use crate::text::Canonicalizer;
    use std::sync::Arc;

    fn outcome(domain: &str, category: Category, requested: usize, queries: &[&str]) -> PairOutcome {
        PairOutcome {
            domain: domain.to_string(),
            category,
            requested,
            records: queries
                .iter()
                .map(|q| {
                    let mut d = DraftRecord::new(*q, category);
                    d.domain = Some(domain.to_string());
                    d
                })
                .collect(),
            attempts: 2,
            state: if queries.len() >= requested {
                PairState::Satisfied
            } else {
                PairState::Exhausted
            },
            stats: AttemptStats::default(),
        }
    }

    #[test]
    fn test_report_marks_shortfalls() {
        let outcomes = vec![
            outcome("导航", Category::Base, 2, &["导航到银行", "导航去公司"]),
            outcome("导航", Category::Syn, 3, &["导航，到银行"]),
            outcome("导航", Category::Typo, 4, &[]),
        ];
        let assembler = DatasetAssembler::new(Arc::new(Canonicalizer::default()));
        let dataset = assembler.assemble(outcomes.iter().map(|o| o.records.clone()));
        let taxonomy = DomainTaxonomy::fallback("导航助手".to_string());
        let report = FulfillmentReport::new(&taxonomy, &outcomes, &dataset);

        assert!(report.has_shortfall());
        assert_eq!(report.shortfalls.len(), 2);
        assert_eq!(report.shortfalls[1].missing, 4);
        assert_eq!(report.shortfalls[1].delivered, 0);
        assert_eq!(report.requested_total, 9);
        assert_eq!(report.accepted_total, 3);
        assert_eq!(report.delivered_total, 2);
        assert_eq!(report.final_records, 2);
        assert_eq!(report.cross_pair_duplicates, 1);
        assert!(report.taxonomy_fallback);
        assert!(report.shortfall_summary().contains("导航/TYPO: 0/4"));
    }

    #[test]
    fn test_records_dropped_by_dataset_pass_count_as_shortfall() {
        let outcomes = vec![
            outcome("车控", Category::Base, 2, &["打开空调", "关闭空调"]),
            outcome("车控", Category::Syn, 2, &["打开空调", "关闭空调"]),
        ];
        let assembler = DatasetAssembler::new(Arc::new(Canonicalizer::default()));
        let dataset = assembler.assemble(outcomes.iter().map(|o| o.records.clone()));
        let report = FulfillmentReport::new(&DomainTaxonomy::fallback("车控".into()), &outcomes, &dataset);

        assert_eq!(report.pairs[1].accepted, 2);
        assert_eq!(report.pairs[1].delivered, 0);
        assert!(report.has_shortfall());
        assert_eq!(report.shortfalls.len(), 1);
        assert_eq!(report.shortfalls[0].category, Category::Syn);
        assert_eq!(report.shortfalls[0].missing, 2);
        assert_eq!(report.cross_pair_duplicates, 2);
    }

    #[test]
    fn test_report_json_round_trip() {
        let outcomes = vec![outcome("媒体", Category::Base, 1, &["播放音乐"])];
        let assembler = DatasetAssembler::new(Arc::new(Canonicalizer::default()));
        let dataset = assembler.assemble(outcomes.iter().map(|o| o.records.clone()));
        let report = FulfillmentReport::new(&DomainTaxonomy::fallback("x".into()), &outcomes, &dataset);
        assert!(!report.has_shortfall());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"BASE\": 1"));
        let back: FulfillmentReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, report);
    }
}
