//! Run configuration.
//!
//! A [`RunConfig`] is resolved once, before any backend call, from four
//! layers (lowest to highest precedence):
//!
//! 1. built-in defaults,
//! 2. process environment (`LLM_*` and `QF_*` variables),
//! 3. a YAML run-configuration file,
//! 4. explicit overrides from the command line.
//!
//! The resolved value is validated and then handed by reference to every
//! component; nothing downstream reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::categories::{Category, UnknownCategory};
use crate::generator::quota::{
    QuotaSettings, DEFAULT_BACKEND_TIMEOUT, DEFAULT_BATCH_CEILING, DEFAULT_MAX_ATTEMPTS,
};
use crate::generator::taxonomy::TaxonomyLimits;
use crate::generator::DEFAULT_LANGUAGE;
use crate::llm::SamplingParams;
use crate::text::CanonicalPolicy;

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value was not supplied by any layer.
    #[error("Missing configuration value: {0}")]
    MissingValue(String),

    /// A value could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A quota or weight names a category that does not exist.
    #[error("{0}")]
    UnknownCategory(#[from] UnknownCategory),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Default per-category count when no quotas are configured.
pub const DEFAULT_CATEGORY_QUOTA: usize = 10;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default completion length.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// What to do when a pair ends below its quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Log and return partial data.
    #[default]
    Warn,
    /// Return an error after all pairs ran.
    Fail,
}

impl std::str::FromStr for ShortfallPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(ConfigError::InvalidValue {
                key: "shortfall_policy".to_string(),
                message: format!("expected 'warn' or 'fail', got '{}'", other),
            }),
        }
    }
}

/// How many records each category should receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QuotaSpec {
    /// Fixed counts, in the supplied category order.
    Explicit(Vec<(Category, usize)>),
    /// A total distributed over weights.
    ///
    /// When every weight is at most 1 the weights are ratios of the total;
    /// otherwise they are proportional integers scaled to the total.
    Weighted {
        total: usize,
        weights: Vec<(Category, f64)>,
    },
}

impl Default for QuotaSpec {
    fn default() -> Self {
        QuotaSpec::Explicit(
            Category::ALL
                .iter()
                .map(|c| (*c, DEFAULT_CATEGORY_QUOTA))
                .collect(),
        )
    }
}

impl QuotaSpec {
    /// Sum of the counts this spec asks for across all categories.
    pub fn total(&self) -> usize {
        match self {
            QuotaSpec::Explicit(counts) => counts.iter().map(|(_, n)| n).sum(),
            QuotaSpec::Weighted { total, .. } => *total,
        }
    }

    /// Per-category counts for one domain.
    ///
    /// With `split` the total is first divided evenly across `domain_count`
    /// domains (at least one per domain) and then allocated; without it
    /// every domain receives the full allocation. Zero entries are dropped.
    pub fn per_domain(&self, domain_count: usize, split: bool) -> Vec<(Category, usize)> {
        let domains = domain_count.max(1);
        match self {
            QuotaSpec::Explicit(counts) if !split => {
                counts.iter().copied().filter(|(_, n)| *n > 0).collect()
            }
            QuotaSpec::Explicit(counts) => {
                let weights: Vec<(Category, f64)> =
                    counts.iter().map(|(c, n)| (*c, *n as f64)).collect();
                allocate(split_total(self.total(), domains), &weights)
            }
            QuotaSpec::Weighted { total, weights } => {
                let total = if split { split_total(*total, domains) } else { *total };
                allocate(total, weights)
            }
        }
    }
}

fn split_total(total: usize, domains: usize) -> usize {
    ((total as f64 / domains as f64).round() as usize).max(1)
}

/// Distributes `total` over `weights`; the rounding remainder goes to BASE.
///
/// BASE is appended when it is not among the weights and the remainder is
/// positive.
pub fn allocate(total: usize, weights: &[(Category, f64)]) -> Vec<(Category, usize)> {
    let is_ratio = weights.iter().all(|(_, w)| *w <= 1.0);
    let target = total as i64;

    let mut out: Vec<(Category, i64)> = if is_ratio {
        weights
            .iter()
            .map(|(c, w)| (*c, (w * total as f64).round() as i64))
            .collect()
    } else {
        let counts: Vec<(Category, i64)> = weights.iter().map(|(c, w)| (*c, w.trunc() as i64)).collect();
        let sum: i64 = counts.iter().map(|(_, n)| n).sum();
        if sum > 0 && sum != target {
            counts
                .into_iter()
                .map(|(c, n)| (c, (n as f64 * total as f64 / sum as f64).round() as i64))
                .collect()
        } else {
            counts
        }
    };

    let assigned: i64 = out.iter().map(|(_, n)| n).sum();
    let delta = target - assigned;
    if is_ratio || assigned != target {
        match out.iter_mut().find(|(c, _)| *c == Category::Base) {
            Some((_, n)) => *n += delta,
            None => out.push((Category::Base, delta)),
        }
    }

    out.into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(c, n)| (c, n as usize))
        .collect()
}

/// Parses `BASE:10,SYN:5` into explicit counts.
pub fn parse_quotas(raw: &str) -> Result<Vec<(Category, usize)>, ConfigError> {
    parse_pairs(raw, "quotas")?
        .into_iter()
        .map(|(category, value)| {
            let count = parse_env_value::<usize>(&value, &format!("quotas.{}", category))?;
            Ok((category, count))
        })
        .collect()
}

/// Parses `BASE:0.5,SYN:0.5` (or integer weights) into weights.
pub fn parse_weights(raw: &str) -> Result<Vec<(Category, f64)>, ConfigError> {
    parse_pairs(raw, "weights")?
        .into_iter()
        .map(|(category, value)| {
            let key = format!("weights.{}", category);
            let weight = parse_env_value::<f64>(&value, &key)?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: format!("weight must be a non-negative number, got '{}'", value),
                });
            }
            Ok((category, weight))
        })
        .collect()
}

fn parse_pairs(raw: &str, key: &str) -> Result<Vec<(Category, String)>, ConfigError> {
    let mut pairs = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = item
            .split_once(':')
            .or_else(|| item.split_once('='))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected CATEGORY:VALUE, got '{}'", item),
            })?;
        let category: Category = name.parse()?;
        if pairs.iter().any(|(c, _)| *c == category) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("category {} listed twice", category),
            });
        }
        pairs.push((category, value.trim().to_string()));
    }
    Ok(pairs)
}

/// The fully resolved configuration of one generation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    // Scenario
    /// Free-text description of the product or scenario under test.
    pub scenario: String,
    /// Language the generated queries should be written in.
    pub language: String,

    // Quotas
    pub quotas: QuotaSpec,
    /// Divide the total evenly across extracted domains.
    pub split_across_domains: bool,
    pub taxonomy: TaxonomyLimits,

    // Quota loop
    pub batch_ceiling: usize,
    pub max_attempts: usize,
    pub backend_timeout: Duration,
    /// Pairs processed at once; 1 means strictly sequential.
    pub concurrency: usize,
    pub fail_fast: bool,
    pub shortfall_policy: ShortfallPolicy,

    // Backend
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,

    /// YAML file replacing the built-in canonicalization tables.
    pub policy_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),

            quotas: QuotaSpec::default(),
            split_across_domains: false,
            taxonomy: TaxonomyLimits::default(),

            batch_ceiling: DEFAULT_BATCH_CEILING,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            concurrency: 1,
            fail_fast: false,
            shortfall_policy: ShortfallPolicy::Warn,

            api_key: None,
            base_url: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,

            policy_path: None,
        }
    }
}

impl RunConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves all layers and validates the result.
    ///
    /// `lookup` reads environment variables; pass `|k| std::env::var(k).ok()`
    /// for the real process environment.
    pub fn resolve<F>(
        lookup: F,
        file: Option<&Path>,
        overrides: &RunOverrides,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        if let Some(path) = file {
            config.apply_file(&RunConfigFile::from_yaml_file(path)?)?;
        }
        config.apply_overrides(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LLM_API_KEY`: backend API key
    /// - `LLM_BASE_URL`: OpenAI-compatible endpoint base URL
    /// - `LLM_MODEL`: model identifier
    /// - `LLM_TEMPERATURE`: sampling temperature (default: 0.7)
    /// - `LLM_MAX_TOKENS`: completion length (default: 1024)
    /// - `QF_BACKEND_TIMEOUT_SECS`: per-call timeout (default: 30)
    /// - `QF_CONCURRENCY`: pairs in flight (default: 1)
    /// - `QF_FAIL_FAST`: abort on backend failures (default: false)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = var("LLM_API_KEY") {
            self.api_key = Some(val.trim().to_string());
        }

        if let Some(val) = var("LLM_BASE_URL") {
            self.base_url = Some(val.trim().to_string());
        }

        if let Some(val) = var("LLM_MODEL") {
            self.model = Some(val.trim().to_string());
        }

        if let Some(val) = var("LLM_TEMPERATURE") {
            self.temperature = parse_env_value(&val, "LLM_TEMPERATURE")?;
        }

        if let Some(val) = var("LLM_MAX_TOKENS") {
            self.max_tokens = parse_env_value(&val, "LLM_MAX_TOKENS")?;
        }

        if let Some(val) = var("QF_BACKEND_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "QF_BACKEND_TIMEOUT_SECS")?;
            self.backend_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = var("QF_CONCURRENCY") {
            self.concurrency = parse_env_value(&val, "QF_CONCURRENCY")?;
        }

        if let Some(val) = var("QF_FAIL_FAST") {
            self.fail_fast = parse_env_bool(&val, "QF_FAIL_FAST")?;
        }

        Ok(())
    }

    /// Applies values present in a run-configuration file.
    pub fn apply_file(&mut self, file: &RunConfigFile) -> Result<(), ConfigError> {
        if let Some(scenario) = &file.scenario {
            self.scenario = scenario.clone();
        }
        if let Some(language) = &file.language {
            self.language = language.clone();
        }
        if let Some(policy) = &file.policy {
            self.policy_path = Some(policy.clone());
        }

        let llm = &file.llm;
        if let Some(key) = &llm.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = &llm.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(model) = &llm.model {
            self.model = Some(model.clone());
        }
        if let Some(t) = llm.temperature {
            self.temperature = t;
        }
        if let Some(n) = llm.max_tokens {
            self.max_tokens = n;
        }
        if let Some(secs) = llm.timeout_secs {
            self.backend_timeout = Duration::from_secs(secs);
        }

        let generation = &file.generation;
        if let Some(spec) = generation.quota_spec()? {
            self.quotas = spec;
        }
        if let Some(split) = generation.split_across_domains {
            self.split_across_domains = split;
        }
        if let Some(n) = generation.batch_ceiling {
            self.batch_ceiling = n;
        }
        if let Some(n) = generation.max_attempts {
            self.max_attempts = n;
        }
        if let Some(n) = generation.concurrency {
            self.concurrency = n;
        }
        if let Some(flag) = generation.fail_fast {
            self.fail_fast = flag;
        }
        if let Some(policy) = generation.shortfall_policy {
            self.shortfall_policy = policy;
        }

        let taxonomy = &file.taxonomy;
        if let Some(n) = taxonomy.min_domains {
            self.taxonomy.min_domains = n;
        }
        if let Some(n) = taxonomy.max_domains {
            self.taxonomy.max_domains = n;
        }
        if let Some(n) = taxonomy.intents_per_domain {
            self.taxonomy.intents_per_domain = n;
        }

        Ok(())
    }

    /// Applies explicit overrides.
    pub fn apply_overrides(&mut self, overrides: &RunOverrides) -> Result<(), ConfigError> {
        if let Some(scenario) = &overrides.scenario {
            self.scenario = scenario.clone();
        }
        if let Some(language) = &overrides.language {
            self.language = language.clone();
        }
        if let Some(raw) = &overrides.quotas {
            self.quotas = QuotaSpec::Explicit(parse_quotas(raw)?);
        }
        if let Some(total) = overrides.total {
            let weights = match (&overrides.weights, &self.quotas) {
                (Some(raw), _) => parse_weights(raw)?,
                (None, QuotaSpec::Weighted { weights, .. }) => weights.clone(),
                (None, QuotaSpec::Explicit(counts)) => {
                    counts.iter().map(|(c, n)| (*c, *n as f64)).collect()
                }
            };
            self.quotas = QuotaSpec::Weighted { total, weights };
        } else if let Some(raw) = &overrides.weights {
            self.quotas = QuotaSpec::Weighted {
                total: self.quotas.total(),
                weights: parse_weights(raw)?,
            };
        }
        if let Some(split) = overrides.split_across_domains {
            self.split_across_domains = split;
        }
        if let Some(n) = overrides.min_domains {
            self.taxonomy.min_domains = n;
        }
        if let Some(n) = overrides.max_domains {
            self.taxonomy.max_domains = n;
        }
        if let Some(n) = overrides.intents_per_domain {
            self.taxonomy.intents_per_domain = n;
        }
        if let Some(n) = overrides.batch_ceiling {
            self.batch_ceiling = n;
        }
        if let Some(n) = overrides.max_attempts {
            self.max_attempts = n;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.backend_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = overrides.concurrency {
            self.concurrency = n;
        }
        if let Some(flag) = overrides.fail_fast {
            self.fail_fast = flag;
        }
        if let Some(policy) = overrides.shortfall_policy {
            self.shortfall_policy = policy;
        }
        if let Some(key) = &overrides.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = &overrides.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(model) = &overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(t) = overrides.temperature {
            self.temperature = t;
        }
        if let Some(n) = overrides.max_tokens {
            self.max_tokens = n;
        }
        if let Some(path) = &overrides.policy_path {
            self.policy_path = Some(path.clone());
        }
        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingValue` for absent credentials and
    /// `ConfigError::ValidationFailed` for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_backend()?;
        self.validate_generation()
    }

    /// Checks only what a taxonomy-only run needs.
    pub fn validate_backend(&self) -> Result<(), ConfigError> {
        if self.scenario.trim().is_empty() {
            return Err(ConfigError::MissingValue("scenario".to_string()));
        }

        if is_blank(&self.api_key) {
            return Err(ConfigError::MissingValue("api_key (LLM_API_KEY)".to_string()));
        }

        if is_blank(&self.base_url) {
            return Err(ConfigError::MissingValue("base_url (LLM_BASE_URL)".to_string()));
        }

        if is_blank(&self.model) {
            return Err(ConfigError::MissingValue("model (LLM_MODEL)".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.backend_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "backend_timeout must be greater than 0".to_string(),
            ));
        }

        let limits = &self.taxonomy;
        if limits.min_domains == 0 || limits.max_domains == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_domains and max_domains must be greater than 0".to_string(),
            ));
        }

        if limits.min_domains > limits.max_domains {
            return Err(ConfigError::ValidationFailed(format!(
                "min_domains ({}) cannot exceed max_domains ({})",
                limits.min_domains, limits.max_domains
            )));
        }

        if limits.intents_per_domain == 0 {
            return Err(ConfigError::ValidationFailed(
                "intents_per_domain must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_generation(&self) -> Result<(), ConfigError> {
        if self.batch_ceiling == 0 {
            return Err(ConfigError::ValidationFailed(
                "batch_ceiling must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.quotas.per_domain(1, false).is_empty() {
            return Err(ConfigError::ValidationFailed(
                "quotas must request at least one record".to_string(),
            ));
        }

        Ok(())
    }

    /// Sampling parameters for backend calls.
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            model: self.model.clone().unwrap_or_default(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Limits for each pair's quota loop.
    pub fn quota_settings(&self) -> QuotaSettings {
        QuotaSettings {
            batch_ceiling: self.batch_ceiling,
            max_attempts: self.max_attempts,
            backend_timeout: self.backend_timeout,
            fail_fast: self.fail_fast,
        }
    }

    /// Loads the canonicalization policy, falling back to the built-in one.
    pub fn canonical_policy(&self) -> Result<CanonicalPolicy, ConfigError> {
        match &self.policy_path {
            Some(path) => CanonicalPolicy::from_yaml_file(path),
            None => Ok(CanonicalPolicy::default()),
        }
    }

    /// Builder method to set the scenario.
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    /// Builder method to set backend credentials and model.
    pub fn with_backend(
        mut self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.base_url = Some(base_url.into());
        self.api_key = Some(api_key.into());
        self.model = Some(model.into());
        self
    }

    /// Builder method to set quotas.
    pub fn with_quotas(mut self, quotas: QuotaSpec) -> Self {
        self.quotas = quotas;
        self
    }

    /// Builder method to set the batch ceiling.
    pub fn with_batch_ceiling(mut self, ceiling: usize) -> Self {
        self.batch_ceiling = ceiling;
        self
    }

    /// Builder method to set the attempt ceiling.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Builder method to set the backend timeout.
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Builder method to set concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder method to enable or disable fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Builder method to set the shortfall policy.
    pub fn with_shortfall_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.shortfall_policy = policy;
        self
    }

    /// Builder method to set taxonomy limits.
    pub fn with_taxonomy_limits(mut self, limits: TaxonomyLimits) -> Self {
        self.taxonomy = limits;
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builder method to split the total across domains.
    pub fn with_split_across_domains(mut self, split: bool) -> Self {
        self.split_across_domains = split;
        self
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

/// Explicit per-run overrides, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub scenario: Option<String>,
    pub language: Option<String>,
    /// `BASE:10,SYN:5`
    pub quotas: Option<String>,
    pub total: Option<usize>,
    /// `BASE:0.5,SYN:0.5`
    pub weights: Option<String>,
    pub split_across_domains: Option<bool>,
    pub min_domains: Option<usize>,
    pub max_domains: Option<usize>,
    pub intents_per_domain: Option<usize>,
    pub batch_ceiling: Option<usize>,
    pub max_attempts: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
    pub shortfall_policy: Option<ShortfallPolicy>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub policy_path: Option<PathBuf>,
}

/// On-disk shape of a run-configuration file.
///
/// ```yaml
/// scenario: 车载语音助手，支持导航、音乐和车控
/// llm:
///   model: deepseek-chat
///   temperature: 0.7
/// generation:
///   allocation: {BASE: 10, SYN: 10, TYPO: 5}
///   max_attempts: 3
/// taxonomy:
///   max_domains: 6
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfigFile {
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Path of a canonicalization policy file.
    #[serde(default)]
    pub policy: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub taxonomy: TaxonomySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationSection {
    /// Category to count (or weight, when `total` is set).
    pub allocation: Option<serde_yaml::Mapping>,
    pub total: Option<usize>,
    pub split_across_domains: Option<bool>,
    pub batch_ceiling: Option<usize>,
    pub max_attempts: Option<usize>,
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
    pub shortfall_policy: Option<ShortfallPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxonomySection {
    pub min_domains: Option<usize>,
    pub max_domains: Option<usize>,
    pub intents_per_domain: Option<usize>,
}

impl RunConfigFile {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

impl GenerationSection {
    /// Reads `allocation`/`total` into a quota spec, keeping mapping order.
    fn quota_spec(&self) -> Result<Option<QuotaSpec>, ConfigError> {
        let mut weights = Vec::new();
        if let Some(mapping) = &self.allocation {
            for (key, value) in mapping {
                let name = key.as_str().ok_or_else(|| ConfigError::InvalidValue {
                    key: "generation.allocation".to_string(),
                    message: "category names must be strings".to_string(),
                })?;
                let category: Category = name.parse()?;
                let weight = value.as_f64().ok_or_else(|| ConfigError::InvalidValue {
                    key: format!("generation.allocation.{}", name),
                    message: "expected a number".to_string(),
                })?;
                if weight < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        key: format!("generation.allocation.{}", name),
                        message: "must not be negative".to_string(),
                    });
                }
                weights.push((category, weight));
            }
        }

        match (self.total, weights.is_empty()) {
            (None, true) => Ok(None),
            (Some(total), true) => Ok(Some(QuotaSpec::Weighted {
                total,
                weights: vec![(Category::Base, 1.0)],
            })),
            (Some(total), false) => Ok(Some(QuotaSpec::Weighted { total, weights })),
            (None, false) => {
                let counts = weights
                    .into_iter()
                    .map(|(c, w)| {
                        if w.fract() != 0.0 {
                            return Err(ConfigError::InvalidValue {
                                key: format!("generation.allocation.{}", c),
                                message: "counts must be whole numbers unless total is set"
                                    .to_string(),
                            });
                        }
                        Ok((c, w as usize))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(QuotaSpec::Explicit(counts)))
            }
        }
    }
}

/// Parse an environment variable value into a type.
pub(crate) fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
pub(crate) fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
