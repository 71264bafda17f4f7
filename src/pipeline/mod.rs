//! Run orchestration for query generation.
//!
//! # Architecture
//!
//! - **Config**: layered [`RunConfig`] resolution and validation
//! - **Runner**: [`GenerationRun`], which drives taxonomy extraction, the
//!   per-pair quota loops and dataset assembly
//! - **Report**: [`FulfillmentReport`] with per-pair delivery and shortfalls
//!
//! # Pipeline Flow
//!
//! 1. **Configuration**: defaults, environment, YAML file and CLI overrides
//!    are merged and validated; nothing calls the backend before this passes
//! 2. **Taxonomy**: the scenario is split into functional domains, falling
//!    back to a single "general" domain
//! 3. **Quota loops**: each (domain, category) pair is filled independently,
//!    sequentially or with bounded concurrency
//! 4. **Assembly**: pair results are merged in plan order and deduplicated
//!    across the whole dataset
//! 5. **Reporting**: shortfalls are logged and, under the `fail` policy,
//!    turned into an error
//!
//! # Example
//!
//! ```rust,ignore
//! use query_forge::pipeline::{GenerationRun, RunConfig, RunOverrides};
//!
//! let config = RunConfig::resolve(|k| std::env::var(k).ok(), None, &RunOverrides {
//!     scenario: Some("车载语音助手".to_string()),
//!     quotas: Some("BASE:10,SYN:5".to_string()),
//!     ..RunOverrides::default()
//! })?;
//! let output = GenerationRun::new(config, provider)?.run().await?;
//! println!("{} records", output.dataset.len());
//! ```

pub mod config;
pub mod report;
pub mod runner;

pub use config::{
    allocate, parse_quotas, parse_weights, ConfigError, QuotaSpec, RunConfig, RunConfigFile,
    RunOverrides, ShortfallPolicy,
};
pub use report::{FulfillmentReport, PairReport, ShortfallWarning};
pub use runner::{GenerationRun, PairPlan, RunOutput};
