//! Duplicate detection over canonical query content.
//!
//! Generated datasets are sets over canonical text, not raw text: records
//! differing only in punctuation, decorative marks, case or wrapping
//! courtesy words collapse onto one signature.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use query_forge::diversity::DuplicateFilter;
//! use query_forge::text::Canonicalizer;
//!
//! let mut filter = DuplicateFilter::new(Arc::new(Canonicalizer::default()));
//! let kept = filter.filter_keep_first(vec!["导航·到·银行", "导航到银行"]);
//! assert_eq!(kept.len(), 1);
//! ```

pub mod dedup;

pub use dedup::{DuplicateFilter, QueryText, Signature};
