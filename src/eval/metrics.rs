//! Accuracy metrics over a replayed dataset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::eval::runner::PredictionRow;
use crate::generator::TestQueryRecord;

/// Default cut-off for top-k coverage.
pub const DEFAULT_TOP_K: usize = 3;

/// Headline numbers. `None` means the subset was empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub total: usize,
    pub accuracy_top1: Option<f64>,
    pub topk_coverage: Option<f64>,
    pub base_accuracy: Option<f64>,
    pub noisy_accuracy: Option<f64>,
    /// `max(0, base - noisy)` when both are defined.
    pub robustness_drop: Option<f64>,
}

/// Joins predictions to records on `id` and scores them.
///
/// Records without a prediction count as misses. A record is a top-k hit
/// when its label is among the first `k` ranked labels, or, when the
/// predictor returned no ranking, when the top-1 label matches.
pub fn compute_metrics(records: &[TestQueryRecord], predictions: &[PredictionRow], k: usize) -> EvalMetrics {
    let by_id: HashMap<&str, &PredictionRow> =
        predictions.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut top1_hits = 0usize;
    let mut topk_hits = 0usize;
    let mut base = Tally::default();
    let mut noisy = Tally::default();

    for record in records {
        let prediction = by_id.get(record.id.as_str());
        let hit = prediction.is_some_and(|p| p.predicted_label == record.expected_label);
        let topk_hit = prediction.is_some_and(|p| {
            if p.top_k.is_empty() {
                p.predicted_label == record.expected_label
            } else {
                p.top_k.iter().take(k).any(|l| *l == record.expected_label)
            }
        });

        top1_hits += usize::from(hit);
        topk_hits += usize::from(topk_hit);
        if record.category == crate::categories::Category::Base {
            base.add(hit);
        } else if record.category.is_noisy() {
            noisy.add(hit);
        }
    }

    let total = records.len();
    let ratio = |hits: usize| (total > 0).then(|| hits as f64 / total as f64);
    let base_accuracy = base.accuracy();
    let noisy_accuracy = noisy.accuracy();

    EvalMetrics {
        total,
        accuracy_top1: ratio(top1_hits),
        topk_coverage: ratio(topk_hits),
        base_accuracy,
        noisy_accuracy,
        robustness_drop: base_accuracy
            .zip(noisy_accuracy)
            .map(|(b, n)| (b - n).max(0.0)),
    }
}

#[derive(Default)]
struct Tally {
    hits: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, hit: bool) {
        self.total += 1;
        self.hits += usize::from(hit);
    }

    fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.hits as f64 / self.total as f64)
    }
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

/// Renders a short markdown report.
pub fn render_markdown(metrics: &EvalMetrics) -> String {
    [
        "# Evaluation report".to_string(),
        String::new(),
        format!("- Test cases: {}", metrics.total),
        format!("- Top-1 accuracy: {}", pct(metrics.accuracy_top1)),
        format!("- Top-K coverage: {}", pct(metrics.topk_coverage)),
        format!("- BASE accuracy: {}", pct(metrics.base_accuracy)),
        format!("- Noisy accuracy (TYPO/SLANG/DIALECT/NOISE): {}", pct(metrics.noisy_accuracy)),
        format!("- Robustness drop: {}", pct(metrics.robustness_drop)),
        String::new(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Category;

    fn record(id: &str, category: Category, label: &str) -> TestQueryRecord {
        TestQueryRecord {
            id: id.to_string(),
            query: format!("查询{}", id),
            category,
            expected_label: label.to_string(),
            domain: "导航".to_string(),
            difficulty: 2,
            rationale: String::new(),
            tags: vec![],
            context: None,
            group_id: None,
            step: None,
        }
    }

    fn pred(id: &str, label: &str, top_k: &[&str]) -> PredictionRow {
        PredictionRow {
            id: id.to_string(),
            predicted_label: label.to_string(),
            top_k: top_k.iter().map(|s| s.to_string()).collect(),
            ..PredictionRow::default()
        }
    }

    #[test]
    fn test_metrics() {
        let records = vec![
            record("1", Category::Base, "nav"),
            record("2", Category::Base, "nav"),
            record("3", Category::Typo, "nav"),
            record("4", Category::Slang, "music"),
            record("5", Category::Safety, "refuse"),
        ];
        let predictions = vec![
            pred("1", "nav", &["nav", "poi"]),
            pred("2", "poi", &["poi", "nav"]),
            pred("3", "poi", &["poi", "x", "y", "nav"]),
            pred("4", "music", &[]),
        ];
        let m = compute_metrics(&records, &predictions, 3);

        assert_eq!(m.total, 5);
        assert_eq!(m.accuracy_top1, Some(0.4));
        assert_eq!(m.topk_coverage, Some(0.6));
        assert_eq!(m.base_accuracy, Some(0.5));
        assert_eq!(m.noisy_accuracy, Some(0.5));
        assert_eq!(m.robustness_drop, Some(0.0));
    }

    #[test]
    fn test_undefined_subsets() {
        let records = vec![record("1", Category::Base, "nav")];
        let m = compute_metrics(&records, &[pred("1", "nav", &[])], 3);
        assert_eq!(m.base_accuracy, Some(1.0));
        assert_eq!(m.noisy_accuracy, None);
        assert_eq!(m.robustness_drop, None);

        let empty = compute_metrics(&[], &[], 3);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.accuracy_top1, None);
    }

    #[test]
    fn test_robustness_drop_is_positive_gap() {
        let records = vec![
            record("1", Category::Base, "nav"),
            record("2", Category::Noise, "nav"),
        ];
        let m = compute_metrics(&records, &[pred("1", "nav", &[]), pred("2", "x", &[])], 3);
        assert_eq!(m.robustness_drop, Some(1.0));
    }

    #[test]
    fn test_render_markdown() {
        let m = EvalMetrics {
            total: 4,
            accuracy_top1: Some(0.75),
            topk_coverage: Some(1.0),
            base_accuracy: None,
            noisy_accuracy: None,
            robustness_drop: None,
        };
        let md = render_markdown(&m);
        assert!(md.starts_with("# Evaluation report"));
        assert!(md.contains("Top-1 accuracy: 75.00%"));
        assert!(md.contains("Robustness drop: -"));
    }
}
