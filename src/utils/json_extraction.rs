//! JSON extraction utilities for parsing LLM responses.
//!
//! LLM replies routinely wrap JSON in markdown fences, surround it with prose,
//! or truncate it mid-object. These helpers locate JSON regions without
//! failing; callers decide what to do with what they find.
//!
//! # Example
//!
//! ```
//! use query_forge::utils::json_extraction::{find_matching_bracket, outermost_array};
//!
//! let reply = "Sure! [{\"query\": \"play jazz\"}] Hope that helps.";
//! assert_eq!(outermost_array(reply), Some("[{\"query\": \"play jazz\"}]"));
//! assert_eq!(find_matching_bracket("[[1], 2] tail"), Some(7));
//! ```

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```(?:[A-Za-z0-9_-]+)?[ \t]*\r?\n?([\s\S]*?)```").ok());

/// Finds the index of the `}` matching the `{` at the start of `s`.
///
/// Handles nesting, string literals and escape sequences. Returns `None` when
/// the object is not closed (for example, a truncated reply).
pub fn find_matching_brace(s: &str) -> Option<usize> {
    find_matching(s, '{', '}')
}

/// Finds the index of the `]` matching the `[` at the start of `s`.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    find_matching(s, '[', ']')
}

fn find_matching(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the contents of every fenced code block, trimmed, in order.
pub fn fenced_blocks(content: &str) -> Vec<&str> {
    let Some(re) = FENCED_BLOCK.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Returns the region from the first `[` to the last `]`, if both exist.
pub fn outermost_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end > start).then(|| &content[start..=end])
}

/// Returns the region from the first `{` to the last `}`, if both exist.
pub fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Returns every balanced `{...}` region, scanning from each `{` in turn.
///
/// Nested objects are reported as well as their parents, so callers should
/// filter by shape. Unclosed regions are skipped.
pub fn object_fragments(content: &str) -> Vec<&str> {
    content
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(|(start, _)| {
            find_matching_brace(&content[start..]).map(|end| &content[start..=start + end])
        })
        .collect()
}
