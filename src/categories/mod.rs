//! Test-query categories.
//!
//! Every generated record carries exactly one category describing its
//! perturbation style.

mod category;

pub use category::{Category, UnknownCategory};
