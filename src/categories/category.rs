use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of test-query kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Canonical, direct phrasing.
    Base,
    /// Paraphrase with unchanged meaning.
    Syn,
    /// Hesitation and filler words around a clear request.
    Noise,
    /// Strong colloquialism.
    Slang,
    /// Regional word substitutions.
    Dialect,
    /// Minor misspellings.
    Typo,
    /// Multi-turn utterances that need prior context.
    Ctx,
    /// Adversarial or sensitive probes expected to trigger refusal.
    Safety,
}

/// Returned when a string does not name a known category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{0}' (expected one of BASE, SYN, NOISE, SLANG, DIALECT, TYPO, CTX, SAFETY)")]
pub struct UnknownCategory(pub String);

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 8] = [
        Category::Base,
        Category::Syn,
        Category::Noise,
        Category::Slang,
        Category::Dialect,
        Category::Typo,
        Category::Ctx,
        Category::Safety,
    ];

    /// The upper-case tag used in prompts, files and record ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Base => "BASE",
            Category::Syn => "SYN",
            Category::Noise => "NOISE",
            Category::Slang => "SLANG",
            Category::Dialect => "DIALECT",
            Category::Typo => "TYPO",
            Category::Ctx => "CTX",
            Category::Safety => "SAFETY",
        }
    }

    /// Categories that count as "noisy" input when measuring robustness.
    pub fn is_noisy(&self) -> bool {
        matches!(
            self,
            Category::Typo | Category::Slang | Category::Dialect | Category::Noise
        )
    }

    /// Whether records of this category may carry `context`/`group_id`/`step`.
    pub fn is_multi_turn(&self) -> bool {
        matches!(self, Category::Ctx)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == tag)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
