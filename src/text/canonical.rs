//! Text canonicalization for display cleanup and duplicate keys.
//!
//! Two forms are produced from raw text:
//!
//! - the **display** form, stored on records: NFKC-folded, decorative noise
//!   marks and emoji removed, punctuation unified, whitespace collapsed;
//! - the **dedup key**, used only for signatures: the display form,
//!   lower-cased, with punctuation erased and leading/trailing soft fillers
//!   stripped.
//!
//! The character tables live in [`CanonicalPolicy`], which can be replaced
//! or loaded from YAML since "what counts as a duplicate" is a tuning decision.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::pipeline::config::ConfigError;

/// Minimum length (in characters) of a generated query.
pub const DEFAULT_MIN_CHARS: usize = 4;
/// Maximum length (in characters) of a generated query.
pub const DEFAULT_MAX_CHARS: usize = 40;

const DEFAULT_NOISE_CHARS: &str = "·•●・∙‧⋅";
const DEFAULT_INVISIBLE_CHARS: &str = "\u{200B}\u{200C}\u{200D}\u{2060}\u{FE0E}\u{FE0F}\u{FEFF}";

const DEFAULT_PUNCT_MAP: &[(char, char)] = &[
    ('。', '.'),
    ('、', ','),
    ('“', '"'),
    ('”', '"'),
    ('‘', '\''),
    ('’', '\''),
    ('【', '['),
    ('】', ']'),
    ('「', '"'),
    ('」', '"'),
    ('『', '"'),
    ('』', '"'),
    ('—', '-'),
    ('–', '-'),
];

const DEFAULT_SOFT_FILLERS: &[&str] = &[
    "嗯", "呃", "额", "那个", "然后", "请问", "拜托", "麻烦你", "劳驾", "可以不", "能不能",
    "那个啥", "多谢", "谢谢", "辛苦了", "好嘛", "好吗", "好吧", "好不", "呗", "啦", "please",
    "um", "uh",
];

/// Tunable character tables driving canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalPolicy {
    /// Decorative separators removed from every form.
    pub noise_chars: String,
    /// Zero-width and variation-selector characters removed from every form.
    pub invisible_chars: String,
    /// One-to-one punctuation replacements applied after NFKC.
    pub punct_map: BTreeMap<char, char>,
    /// Courtesy and hesitation words stripped from the ends of dedup keys.
    pub soft_fillers: Vec<String>,
    /// Candidates shorter than this many characters are rejected.
    pub min_chars: usize,
    /// Candidates longer than this many characters are rejected.
    pub max_chars: usize,
}

impl Default for CanonicalPolicy {
    fn default() -> Self {
        Self {
            noise_chars: DEFAULT_NOISE_CHARS.to_string(),
            invisible_chars: DEFAULT_INVISIBLE_CHARS.to_string(),
            punct_map: DEFAULT_PUNCT_MAP.iter().copied().collect(),
            soft_fillers: DEFAULT_SOFT_FILLERS.iter().map(|s| s.to_string()).collect(),
            min_chars: DEFAULT_MIN_CHARS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl CanonicalPolicy {
    /// Loads a policy from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Parses a policy from YAML text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let policy: CanonicalPolicy = serde_yaml::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that the length bounds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_chars == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_chars must be greater than 0".to_string(),
            ));
        }
        if self.min_chars > self.max_chars {
            return Err(ConfigError::ValidationFailed(format!(
                "min_chars ({}) cannot exceed max_chars ({})",
                self.min_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Applies a [`CanonicalPolicy`] to text.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    policy: CanonicalPolicy,
    dropped: HashSet<char>,
    /// Fillers lower-cased and sorted longest first so "那个啥" wins over "那个".
    fillers: Vec<String>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(CanonicalPolicy::default())
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer for the given policy.
    pub fn new(policy: CanonicalPolicy) -> Self {
        let dropped = policy
            .noise_chars
            .chars()
            .chain(policy.invisible_chars.chars())
            .collect();
        let mut fillers: Vec<String> = policy
            .soft_fillers
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        fillers.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        fillers.dedup();
        Self {
            policy,
            dropped,
            fillers,
        }
    }

    /// The active policy.
    pub fn policy(&self) -> &CanonicalPolicy {
        &self.policy
    }

    /// Produces the display form. Idempotent; never enforces length bounds.
    pub fn display(&self, raw: &str) -> String {
        let folded: String = raw.nfkc().collect();
        let cleaned: String = folded
            .chars()
            .filter(|c| !self.dropped.contains(c) && (*c as u32) <= 0xFFFF)
            .map(|c| self.policy.punct_map.get(&c).copied().unwrap_or(c))
            .collect();
        // Removing characters can leave combining marks next to new bases.
        let refolded: String = cleaned.nfkc().collect();
        collapse_whitespace(&refolded)
    }

    /// Produces the display form of generated content, or `None` when it is
    /// empty or outside the configured length bounds.
    pub fn candidate(&self, raw: &str) -> Option<String> {
        let display = self.display(raw);
        let len = display.chars().count();
        if len == 0 || len < self.policy.min_chars || len > self.policy.max_chars {
            return None;
        }
        Some(display)
    }

    /// Produces the duplicate-detection key.
    ///
    /// Punctuation, case and wrapping courtesy words do not affect the key.
    /// Spaces survive only between two ASCII alphanumerics, so "导航 到 银行"
    /// and "导航到银行" share a key while "play jazz" and "playjazz" do not.
    pub fn dedup_key(&self, raw: &str) -> String {
        let lowered = self.display(raw).to_lowercase();
        let depunct: String = lowered
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        let collapsed = collapse_whitespace(&depunct);
        let stripped = self.strip_fillers(&collapsed);
        let core = if stripped.is_empty() {
            collapsed.as_str()
        } else {
            stripped
        };
        join_tokens(core)
    }

    fn strip_fillers<'a>(&self, text: &'a str) -> &'a str {
        let mut current = text.trim();
        loop {
            let before = current;
            for filler in &self.fillers {
                if let Some(rest) = current.strip_prefix(filler.as_str()) {
                    if boundary_ok(filler, rest.chars().next()) {
                        current = rest.trim_start();
                    }
                }
                if let Some(rest) = current.strip_suffix(filler.as_str()) {
                    if boundary_ok(filler, rest.chars().next_back()) {
                        current = rest.trim_end();
                    }
                }
            }
            if current == before {
                return current;
            }
        }
    }
}

/// ASCII fillers must stand alone as a word; other scripts have no spacing.
fn boundary_ok(filler: &str, neighbour: Option<char>) -> bool {
    let ascii_filler = filler.chars().all(|c| c.is_ascii_alphanumeric());
    if !ascii_filler {
        return true;
    }
    !matches!(neighbour, Some(c) if c.is_ascii_alphanumeric())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_tokens(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut tokens = s.split(' ').filter(|t| !t.is_empty()).peekable();
    while let Some(token) = tokens.next() {
        out.push_str(token);
        if let Some(next) = tokens.peek() {
            let left = token.chars().next_back();
            let right = next.chars().next();
            if matches!((left, right), (Some(l), Some(r)) if l.is_ascii_alphanumeric() && r.is_ascii_alphanumeric())
            {
                out.push(' ');
            }
        }
    }
    out
}
