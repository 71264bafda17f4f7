//! Signature-based duplicate detection for generated queries.
//!
//! Two queries are the same test case when their dedup keys (see
//! [`Canonicalizer::dedup_key`]) hash to the same [`Signature`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::text::Canonicalizer;

/// Hex-encoded SHA-256 of a canonical dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Hashes an already-computed dedup key.
    pub fn from_key(key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything carrying a query text that can be deduplicated.
pub trait QueryText {
    fn query_text(&self) -> &str;
}

impl QueryText for String {
    fn query_text(&self) -> &str {
        self
    }
}

impl QueryText for &str {
    fn query_text(&self) -> &str {
        self
    }
}

/// Stateful seen-set of signatures, scoped to one run or one pair.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    canonicalizer: Arc<Canonicalizer>,
    seen: HashSet<Signature>,
}

impl DuplicateFilter {
    pub fn new(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            canonicalizer,
            seen: HashSet::new(),
        }
    }

    /// Computes the signature of a query without recording it.
    pub fn signature(&self, query: &str) -> Signature {
        Signature::from_key(&self.canonicalizer.dedup_key(query))
    }

    /// Returns `true` the first time a signature is seen and records it.
    pub fn is_new(&mut self, query: &str) -> bool {
        let signature = self.signature(query);
        self.seen.insert(signature)
    }

    /// Whether a query's signature has been seen, without recording it.
    pub fn contains(&self, query: &str) -> bool {
        self.seen.contains(&self.signature(query))
    }

    /// Keeps the first occurrence of each signature, in input order.
    ///
    /// Signatures recorded by earlier calls on this filter also count.
    pub fn filter_keep_first<T: QueryText>(&mut self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.is_new(item.query_text()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
