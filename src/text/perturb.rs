//! Rule-based perturbations that derive noisy variants from clean queries.
//!
//! These run locally without a backend, so they are useful for cheaply
//! padding TYPO/SLANG/DIALECT/NOISE coverage from an existing BASE set.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::categories::Category;
use crate::generator::record::{DraftRecord, TestQueryRecord};

/// Common misspellings: traditional forms, homophones and look-alikes.
const TYPO_MAP: &[(&str, &[&str])] = &[
    ("音乐", &["音樂", "音玥"]),
    ("导航", &["到航", "導航"]),
    ("加油站", &["加油栈", "加油點"]),
    ("电影院", &["電影院", "电影完"]),
    ("银行", &["銀行", "银航"]),
    ("周杰伦", &["周傑倫", "周杰仑"]),
    ("陈奕迅", &["陳奕迅", "陈亦迅"]),
    ("空调", &["空掉", "空調"]),
    ("温度", &["温渡", "溫度"]),
];

const SLANG_FILLERS: &[&str] = &[
    "那个啥", "就是", "然后", "拜托啦", "劳驾", "呃", "嗯", "诶", "麻烦你", "请问一下",
];

const DIALECT_REPLACEMENTS: &[(&str, &str)] = &[
    ("这里", "这块"),
    ("那里", "那块"),
    ("有点", "有点儿"),
    ("帮我", "给我整"),
    ("什么", "啥"),
    ("修车厂", "修理铺子"),
    ("便利店", "小卖部"),
    ("不知道", "不晓得"),
];

const NOISE_PARTICLES: &[&str] = &["嘛", "呗", "啦", "呀", "哈", "咯"];
const NOISE_FILLERS: &[&str] = &["那个啥…", "嗯…", "诶…", "就是…", "拜托…", "请问…"];

/// Seeded source of rule-based perturbations.
#[derive(Debug, Clone)]
pub struct Perturber {
    rng: ChaCha8Rng,
}

impl Perturber {
    /// Creates a perturber whose output is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.rng.random_range(0..items.len())]
    }

    fn coin(&mut self) -> bool {
        self.rng.random_range(0..2) == 0
    }

    /// Replaces one known word with a misspelling, or swaps two adjacent
    /// characters when no known word occurs.
    pub fn typo(&mut self, s: &str) -> String {
        let hits: Vec<_> = TYPO_MAP.iter().filter(|(k, _)| s.contains(k)).collect();
        if !hits.is_empty() {
            let (word, variants) = hits[self.rng.random_range(0..hits.len())];
            let variant = self.pick(variants);
            return s.replacen(word, variant, 1);
        }
        let mut chars: Vec<char> = s.chars().collect();
        if chars.len() > 2 {
            let pos = self.rng.random_range(1..chars.len());
            if chars[pos - 1] != chars[pos] {
                chars.swap(pos - 1, pos);
            }
        }
        chars.into_iter().collect()
    }

    /// Wraps the query with a colloquial filler, before or after.
    pub fn slang(&mut self, s: &str) -> String {
        let filler = self.pick(SLANG_FILLERS);
        if self.coin() {
            format!("{}…{}", filler, s)
        } else {
            format!("{}，{}", s, filler)
        }
    }

    /// Applies the first applicable regional substitution, starting from a random rule.
    pub fn dialect(&mut self, s: &str) -> String {
        let start = self.rng.random_range(0..DIALECT_REPLACEMENTS.len());
        for offset in 0..DIALECT_REPLACEMENTS.len() {
            let (from, to) = DIALECT_REPLACEMENTS[(start + offset) % DIALECT_REPLACEMENTS.len()];
            if s.contains(from) {
                return s.replacen(from, to, 1);
            }
        }
        s.to_string()
    }

    /// Prefixes a hesitation filler or suffixes a modal particle.
    pub fn noise(&mut self, s: &str) -> String {
        if self.coin() {
            format!("{}{}", self.pick(NOISE_FILLERS), s)
        } else {
            format!("{}{}", s, self.pick(NOISE_PARTICLES))
        }
    }

    /// Applies the transform for a noisy category. Other categories have no
    /// rule-based transform and yield `None`.
    pub fn apply(&mut self, category: Category, s: &str) -> Option<String> {
        match category {
            Category::Typo => Some(self.typo(s)),
            Category::Slang => Some(self.slang(s)),
            Category::Dialect => Some(self.dialect(s)),
            Category::Noise => Some(self.noise(s)),
            _ => None,
        }
    }

    /// Derives one variant of `record` per requested category.
    ///
    /// Variants identical to the source query are skipped; the assembler's
    /// duplicate pass removes anything else that collapses onto a source.
    pub fn derive(&mut self, record: &TestQueryRecord, categories: &[Category]) -> Vec<DraftRecord> {
        let mut out = Vec::new();
        for &category in categories {
            let Some(variant) = self.apply(category, &record.query) else {
                continue;
            };
            if variant == record.query {
                continue;
            }
            let mut tags = record.tags.clone();
            tags.push("rule_based".to_string());
            out.push(DraftRecord {
                query: variant,
                category,
                expected_label: Some(record.expected_label.clone()),
                domain: Some(record.domain.clone()),
                difficulty: Some(record.difficulty),
                rationale: Some(format!("rule-based {} variant of {}", category, record.id)),
                tags,
                context: None,
                group_id: None,
                step: None,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_record(query: &str) -> TestQueryRecord {
        TestQueryRecord {
            id: "BASE-0000abcd".to_string(),
            query: query.to_string(),
            category: Category::Base,
            expected_label: "navigate".to_string(),
            domain: "navigation".to_string(),
            difficulty: 2,
            rationale: String::new(),
            tags: vec![],
            context: None,
            group_id: None,
            step: None,
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let mut a = Perturber::new(7);
        let mut b = Perturber::new(7);
        for _ in 0..10 {
            assert_eq!(a.slang("导航到银行"), b.slang("导航到银行"));
            assert_eq!(a.noise("播放音乐"), b.noise("播放音乐"));
        }
    }

    #[test]
    fn test_typo_uses_known_words() {
        let mut p = Perturber::new(1);
        let out = p.typo("导航到银行");
        assert_ne!(out, "导航到银行");
        assert!(
            ["到航到银行", "導航到银行", "导航到銀行", "导航到银航"].contains(&out.as_str()),
            "unexpected typo: {}",
            out
        );
    }

    #[test]
    fn test_typo_fallback_swaps_characters() {
        let mut p = Perturber::new(3);
        let out = p.typo("打开车窗");
        assert_eq!(out.chars().count(), 4);
        let mut sorted_in: Vec<char> = "打开车窗".chars().collect();
        let mut sorted_out: Vec<char> = out.chars().collect();
        sorted_in.sort();
        sorted_out.sort();
        assert_eq!(sorted_in, sorted_out);
        assert_ne!(out, "打开车窗");
    }

    #[test]
    fn test_dialect_replaces_once() {
        let mut p = Perturber::new(5);
        assert_eq!(p.dialect("帮我导航"), "给我整导航");
        assert_eq!(p.dialect("播放音乐"), "播放音乐");
    }

    #[test]
    fn test_noise_and_slang_keep_the_query() {
        let mut p = Perturber::new(11);
        for _ in 0..20 {
            assert!(p.noise("播放音乐").contains("播放音乐"));
            assert!(p.slang("播放音乐").contains("播放音乐"));
        }
    }

    #[test]
    fn test_apply_only_noisy_categories() {
        let mut p = Perturber::new(0);
        assert!(p.apply(Category::Typo, "导航到银行").is_some());
        assert!(p.apply(Category::Base, "导航到银行").is_none());
        assert!(p.apply(Category::Safety, "导航到银行").is_none());
    }

    #[test]
    fn test_derive_copies_labels_and_skips_noops() {
        let mut p = Perturber::new(9);
        let record = base_record("播放音乐吧");
        let drafts = p.derive(&record, &[Category::Dialect, Category::Noise, Category::Ctx]);
        // No dialect rule applies and CTX has no transform.
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.category, Category::Noise);
        assert_eq!(draft.expected_label.as_deref(), Some("navigate"));
        assert_eq!(draft.domain.as_deref(), Some("navigation"));
        assert!(draft.tags.contains(&"rule_based".to_string()));
        assert!(draft.rationale.as_deref().unwrap_or_default().contains("BASE-0000abcd"));
    }
}
