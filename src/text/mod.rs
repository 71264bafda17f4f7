//! Text processing: canonicalization and rule-based perturbation.

pub mod canonical;
pub mod perturb;

pub use canonical::{CanonicalPolicy, Canonicalizer, DEFAULT_MAX_CHARS, DEFAULT_MIN_CHARS};
pub use perturb::Perturber;
