//! Test-query records and coercion of loosely-typed LLM candidates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::categories::Category;
use crate::diversity::QueryText;
use crate::text::Canonicalizer;

/// Label used when the backend gives none.
pub const DEFAULT_LABEL: &str = "fallback";
/// Domain used when a record has none.
pub const DEFAULT_DOMAIN: &str = "general";
/// Difficulty used when a record has none or an unusable value.
pub const DEFAULT_DIFFICULTY: u8 = 2;

/// One finished, default-filled test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQueryRecord {
    #[serde(alias = "case_id")]
    pub id: String,
    pub query: String,
    #[serde(alias = "test_type")]
    pub category: Category,
    #[serde(alias = "expected_intent", default = "default_label")]
    pub expected_label: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(alias = "design_logic", default)]
    pub rationale: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_difficulty() -> u8 {
    DEFAULT_DIFFICULTY
}

impl QueryText for TestQueryRecord {
    fn query_text(&self) -> &str {
        &self.query
    }
}

impl TestQueryRecord {
    /// Turns the record back into a draft, e.g. to re-run assembly on a loaded file.
    pub fn into_draft(self) -> DraftRecord {
        DraftRecord {
            query: self.query,
            category: self.category,
            expected_label: Some(self.expected_label),
            domain: Some(self.domain),
            difficulty: Some(self.difficulty),
            rationale: Some(self.rationale),
            tags: self.tags,
            context: self.context,
            group_id: self.group_id,
            step: self.step,
        }
    }
}

/// A record accepted by a quota loop but not yet assembled.
///
/// Optional fields stay empty until the assembler fills defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub query: String,
    pub category: Category,
    pub expected_label: Option<String>,
    pub domain: Option<String>,
    pub difficulty: Option<u8>,
    pub rationale: Option<String>,
    pub tags: Vec<String>,
    pub context: Option<String>,
    pub group_id: Option<String>,
    pub step: Option<u32>,
}

impl QueryText for DraftRecord {
    fn query_text(&self) -> &str {
        &self.query
    }
}

/// Why a parsed candidate was not turned into a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRejection {
    /// No string `query` field, or it was blank.
    MissingQuery,
    /// The canonical query fell outside the length bounds.
    Length,
}

impl DraftRecord {
    /// A bare draft with only query and category set.
    pub fn new(query: impl Into<String>, category: Category) -> Self {
        Self {
            query: query.into(),
            category,
            expected_label: None,
            domain: None,
            difficulty: None,
            rationale: None,
            tags: Vec::new(),
            context: None,
            group_id: None,
            step: None,
        }
    }

    /// Coerces one parsed candidate object into a draft.
    ///
    /// The category is always the requested one and the domain is always the
    /// pair's domain, whatever the candidate claims. Fields with unusable
    /// types are dropped rather than rejected.
    pub fn from_candidate(
        candidate: &Map<String, Value>,
        canonicalizer: &Canonicalizer,
        category: Category,
        domain: &str,
    ) -> Result<Self, CandidateRejection> {
        let raw = candidate
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(CandidateRejection::MissingQuery)?;
        let query = canonicalizer
            .candidate(raw)
            .ok_or(CandidateRejection::Length)?;

        let multi_turn = category.is_multi_turn();
        let context = string_field(candidate, &["context"])
            .filter(|_| multi_turn)
            .map(|c| canonicalizer.display(&c))
            .filter(|c| !c.is_empty());

        Ok(Self {
            query,
            category,
            expected_label: string_field(
                candidate,
                &["expected_label", "expected_intent", "intent", "label"],
            ),
            domain: Some(domain.to_string()),
            difficulty: candidate.get("difficulty").and_then(coerce_difficulty),
            rationale: string_field(candidate, &["rationale", "design_logic", "reason"]),
            tags: candidate.get("tags").map(coerce_tags).unwrap_or_default(),
            context,
            group_id: candidate
                .get("group_id")
                .filter(|_| multi_turn)
                .and_then(coerce_group_id),
            step: candidate.get("step").filter(|_| multi_turn).and_then(coerce_step),
        })
    }

    /// Fills defaults and attaches an identifier.
    pub fn finalize(self, id: String) -> TestQueryRecord {
        TestQueryRecord {
            id,
            query: self.query,
            category: self.category,
            expected_label: self
                .expected_label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(default_label),
            domain: self
                .domain
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(default_domain),
            difficulty: self.difficulty.unwrap_or(DEFAULT_DIFFICULTY),
            rationale: self.rationale.unwrap_or_default(),
            tags: self.tags,
            context: self.context,
            group_id: self.group_id,
            step: self.step,
        }
    }
}

fn string_field(candidate: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| candidate.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn coerce_difficulty(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    }
}

fn coerce_tags(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn coerce_group_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_step(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Hands out `{CATEGORY}-{8 hex}` identifiers, unique within one generator.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    issued: HashSet<String>,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an existing identifier so it is never issued.
    pub fn reserve(&mut self, id: &str) -> bool {
        self.issued.insert(id.to_string())
    }

    pub fn next_id(&mut self, category: Category) -> String {
        loop {
            let hex = Uuid::new_v4().simple().to_string();
            let id = format!("{}-{}", category, &hex[..8]);
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("test value is an object")
    }

    #[test]
    fn test_from_candidate_reads_aliases() {
        let canon = Canonicalizer::default();
        let candidate = obj(json!({
            "query": "  导航·到·银行 ",
            "expected_intent": "navigate_poi",
            "domain": "entertainment",
            "test_type": "SYN",
            "design_logic": "直接表达",
            "tags": ["poi", 3, " "],
            "difficulty": "3",
        }));
        let draft = DraftRecord::from_candidate(&candidate, &canon, Category::Base, "导航")
            .expect("valid candidate");
        assert_eq!(draft.query, "导航到银行");
        assert_eq!(draft.category, Category::Base);
        assert_eq!(draft.domain.as_deref(), Some("导航"));
        assert_eq!(draft.expected_label.as_deref(), Some("navigate_poi"));
        assert_eq!(draft.rationale.as_deref(), Some("直接表达"));
        assert_eq!(draft.tags, vec!["poi".to_string()]);
        assert_eq!(draft.difficulty, Some(3));
    }

    #[test]
    fn test_from_candidate_rejections() {
        let canon = Canonicalizer::default();
        let missing = obj(json!({"text": "导航到银行"}));
        assert_eq!(
            DraftRecord::from_candidate(&missing, &canon, Category::Base, "导航"),
            Err(CandidateRejection::MissingQuery)
        );
        let numeric = obj(json!({"query": 12345}));
        assert_eq!(
            DraftRecord::from_candidate(&numeric, &canon, Category::Base, "导航"),
            Err(CandidateRejection::MissingQuery)
        );
        let short = obj(json!({"query": "导航"}));
        assert_eq!(
            DraftRecord::from_candidate(&short, &canon, Category::Base, "导航"),
            Err(CandidateRejection::Length)
        );
    }

    #[test]
    fn test_from_candidate_multi_turn_fields() {
        let canon = Canonicalizer::default();
        let candidate = obj(json!({
            "query": "换成第二个路线",
            "context": "导航去机场",
            "group_id": 7,
            "step": "2",
            "difficulty": 9.5,
        }));
        let draft = DraftRecord::from_candidate(&candidate, &canon, Category::Ctx, "导航")
            .expect("valid candidate");
        assert_eq!(draft.context.as_deref(), Some("导航去机场"));
        assert_eq!(draft.group_id.as_deref(), Some("7"));
        assert_eq!(draft.step, Some(2));
        assert_eq!(draft.difficulty, None);
    }

    #[test]
    fn test_from_candidate_single_turn_drops_turn_fields() {
        let canon = Canonicalizer::default();
        let candidate = obj(json!({
            "query": "导航到最近的银行",
            "context": "导航去机场",
            "group_id": 7,
            "step": 1,
        }));
        let draft = DraftRecord::from_candidate(&candidate, &canon, Category::Base, "导航")
            .expect("valid candidate");
        assert_eq!(draft.context, None);
        assert_eq!(draft.group_id, None);
        assert_eq!(draft.step, None);
    }

    #[test]
    fn test_finalize_fills_defaults() {
        let mut draft = DraftRecord::new("播放音乐", Category::Base);
        draft.expected_label = Some("  ".to_string());
        let record = draft.finalize("BASE-12345678".to_string());
        assert_eq!(record.expected_label, DEFAULT_LABEL);
        assert_eq!(record.domain, DEFAULT_DOMAIN);
        assert_eq!(record.difficulty, DEFAULT_DIFFICULTY);
        assert!(record.tags.is_empty());
        assert_eq!(record.rationale, "");
    }

    #[test]
    fn test_id_generator_format_and_uniqueness() {
        let mut ids = RecordIdGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = ids.next_id(Category::Typo);
            assert!(id.starts_with("TYPO-"));
            assert_eq!(id.len(), "TYPO-".len() + 8);
            assert!(seen.insert(id));
        }
        assert!(ids.reserve("BASE-00000000"));
        assert!(!ids.reserve("BASE-00000000"));
    }

    #[test]
    fn test_record_deserializes_legacy_field_names() {
        let record: TestQueryRecord = serde_json::from_value(json!({
            "case_id": "BASE-abcdef01",
            "query": "打开空调",
            "test_type": "BASE",
            "expected_intent": "ac_on",
        }))
        .expect("legacy row");
        assert_eq!(record.id, "BASE-abcdef01");
        assert_eq!(record.category, Category::Base);
        assert_eq!(record.expected_label, "ac_on");
        assert_eq!(record.domain, DEFAULT_DOMAIN);
        assert_eq!(record.difficulty, DEFAULT_DIFFICULTY);
    }
}
