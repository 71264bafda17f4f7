//! CLI command definitions for query_forge.
//!
//! Every command reads or writes datasets through [`crate::export`], so the
//! file extension (`.parquet`, `.csv`, `.jsonl`) picks the format.

use crate::categories::Category;
use crate::error::GenerationError;
use crate::eval::{
    compute_metrics, read_predictions, render_markdown, EvalMetrics, EvalRunner, HttpPredictor,
    DEFAULT_TOP_K,
};
use crate::export::{read_dataset, write_dataset, write_jsonl};
use crate::generator::{Dataset, DatasetAssembler, DomainTaxonomy, TestQueryRecord};
use crate::llm::{LlmProvider, OpenAiCompatClient};
use crate::pipeline::{
    FulfillmentReport, GenerationRun, RunConfig, RunOutput, RunOverrides, ShortfallPolicy,
};
use crate::text::{CanonicalPolicy, Canonicalizer, Perturber};
use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default dataset path for `generate`.
const DEFAULT_OUTPUT: &str = "./generated-datasets/queries.parquet";

/// Default directory for `eval` artifacts.
const DEFAULT_EVAL_DIR: &str = "./eval-results";

/// Categories `perturb` derives when none are given.
const DEFAULT_PERTURB_CATEGORIES: &str = "TYPO,SLANG,DIALECT,NOISE";

/// Synthetic test query generator for NLU and voice assistants.
#[derive(Parser)]
#[command(name = "query-forge")]
#[command(about = "Generate and evaluate synthetic test queries for intent classifiers")]
#[command(version)]
#[command(
    long_about = "query-forge asks an OpenAI-compatible LLM for user queries, canonicalizes and \
                  deduplicates them under per-(domain, category) quotas, and replays the result \
                  against a classifier endpoint.\n\nExample usage:\n  query-forge generate \
                  --scenario \"in-car voice assistant\" --quotas BASE:20,TYPO:10 \
                  --output ./generated-datasets/car.parquet"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a test-query dataset for a scenario.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Extract and print the domain taxonomy for a scenario.
    Taxonomy(TaxonomyArgs),

    /// Re-canonicalize and deduplicate an existing dataset.
    Clean(CleanArgs),

    /// Derive rule-based TYPO/SLANG/DIALECT/NOISE variants from BASE records.
    Perturb(PerturbArgs),

    /// Replay a dataset against a classifier endpoint and score it.
    #[command(alias = "evaluate")]
    Eval(EvalArgs),

    /// Score an existing predictions file against a dataset.
    Report(ReportArgs),
}

/// Options shared by commands that talk to the generation backend.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// YAML run configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Free-text description of the assistant under test.
    #[arg(short = 's', long)]
    pub scenario: Option<String>,

    /// Language the generated queries should be written in.
    #[arg(long)]
    pub language: Option<String>,

    /// OpenAI-compatible API key.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "LLM_BASE_URL")]
    pub base_url: Option<String>,

    /// Model identifier.
    #[arg(short = 'm', long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Completion length cap per backend call.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Per-call backend timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Minimum number of domains to extract.
    #[arg(long)]
    pub min_domains: Option<usize>,

    /// Maximum number of domains to extract.
    #[arg(long)]
    pub max_domains: Option<usize>,

    /// Intents to request per domain.
    #[arg(long)]
    pub intents_per_domain: Option<usize>,

    /// Canonicalization policy YAML.
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Abort on backend transport or auth failures.
    #[arg(long)]
    pub fail_fast: bool,
}

impl RunArgs {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            scenario: self.scenario.clone(),
            language: self.language.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
            min_domains: self.min_domains,
            max_domains: self.max_domains,
            intents_per_domain: self.intents_per_domain,
            policy_path: self.policy.clone(),
            fail_fast: self.fail_fast.then_some(true),
            ..RunOverrides::default()
        }
    }
}

/// Arguments for `query-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Explicit per-domain quotas, e.g. "BASE:20,TYPO:10".
    #[arg(short = 'q', long, conflicts_with = "weights")]
    pub quotas: Option<String>,

    /// Total records to request, split by --weights.
    #[arg(short = 'n', long)]
    pub total: Option<usize>,

    /// Category weights for --total, e.g. "BASE:0.6,TYPO:0.4" or "BASE:3,SYN:1".
    #[arg(short = 'w', long)]
    pub weights: Option<String>,

    /// Divide the total evenly across extracted domains.
    #[arg(long)]
    pub split_across_domains: bool,

    /// Largest batch requested per backend call.
    #[arg(long)]
    pub batch_ceiling: Option<usize>,

    /// Backend calls allowed per (domain, category) pair.
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Pairs generated in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// What to do when a pair misses its quota: warn or fail.
    #[arg(long)]
    pub shortfall: Option<String>,

    /// Dataset output path (.parquet, .csv or .jsonl).
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Fulfillment report path (default: <output stem>.report.json).
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl GenerateArgs {
    fn overrides(&self) -> anyhow::Result<RunOverrides> {
        let shortfall_policy = self
            .shortfall
            .as_deref()
            .map(ShortfallPolicy::from_str)
            .transpose()?;
        Ok(RunOverrides {
            quotas: self.quotas.clone(),
            total: self.total,
            weights: self.weights.clone(),
            split_across_domains: self.split_across_domains.then_some(true),
            batch_ceiling: self.batch_ceiling,
            max_attempts: self.max_attempts,
            concurrency: self.concurrency,
            shortfall_policy,
            ..self.run.overrides()
        })
    }
}

/// Arguments for `query-forge taxonomy`.
#[derive(Parser, Debug)]
pub struct TaxonomyArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

/// Arguments for `query-forge clean`.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Dataset to clean.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Where to write the cleaned dataset (default: overwrite input).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Canonicalization policy YAML.
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `query-forge perturb`.
#[derive(Parser, Debug)]
pub struct PerturbArgs {
    /// Dataset holding BASE records.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Where to write the source records plus their variants.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Noisy categories to derive.
    #[arg(long, default_value = DEFAULT_PERTURB_CATEGORIES)]
    pub categories: String,

    /// RNG seed.
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Write only the derived variants.
    #[arg(long)]
    pub variants_only: bool,

    /// Canonicalization policy YAML.
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `query-forge eval`.
#[derive(Parser, Debug)]
pub struct EvalArgs {
    /// Dataset to replay.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Classifier endpoint receiving {"query", "context"} POSTs.
    #[arg(long, env = "QF_EVAL_API_URL")]
    pub api_url: String,

    /// Directory for predictions.jsonl, metrics.json and report.md.
    #[arg(short = 'o', long, default_value = DEFAULT_EVAL_DIR)]
    pub output_dir: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Cut-off for top-k coverage.
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Output JSON metrics.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `query-forge report`.
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Dataset the predictions were made for.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Predictions JSONL file.
    #[arg(short = 'p', long)]
    pub predictions: PathBuf,

    /// Cut-off for top-k coverage.
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Also write the markdown report here.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Output JSON metrics instead of markdown.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Summary printed after `generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub status: String,
    pub scenario: String,
    pub domains: Vec<String>,
    pub records: usize,
    pub requested: usize,
    pub delivered: usize,
    pub cross_pair_duplicates: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub shortfalls: Vec<String>,
    pub output: String,
    pub report: String,
    pub total_duration_ms: u64,
}

impl GenerationSummary {
    fn new(report: &FulfillmentReport, output: &Path, report_path: &Path, elapsed: Duration) -> Self {
        let status = if report.final_records == 0 {
            "failed"
        } else if report.has_shortfall() {
            "partial"
        } else {
            "success"
        };
        Self {
            status: status.to_string(),
            scenario: report.scenario.clone(),
            domains: report.domains.clone(),
            records: report.final_records,
            requested: report.requested_total,
            delivered: report.delivered_total,
            cross_pair_duplicates: report.cross_pair_duplicates,
            by_category: report.by_category.clone(),
            shortfalls: report.shortfalls.iter().map(ToString::to_string).collect(),
            output: output.display().to_string(),
            report: report_path.display().to_string(),
            total_duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Summary printed after `clean` and `perturb`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteSummary {
    pub input_records: usize,
    pub output_records: usize,
    pub dropped_invalid: usize,
    pub duplicates_removed: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub output: String,
}

impl RewriteSummary {
    fn new(input_records: usize, dataset: &Dataset, output: &Path) -> Self {
        Self {
            input_records,
            output_records: dataset.len(),
            dropped_invalid: dataset.stats.dropped_invalid,
            duplicates_removed: dataset.stats.duplicates_removed,
            by_category: dataset.counts_by_category(),
            output: output.display().to_string(),
        }
    }

    fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        println!("✓ Wrote {} records to {}", self.output_records, self.output);
        println!("  Input records:      {}", self.input_records);
        println!("  Dropped (invalid):  {}", self.dropped_invalid);
        println!("  Duplicates removed: {}", self.duplicates_removed);
        for (category, count) in &self.by_category {
            println!("    {}: {}", category, count);
        }
        Ok(())
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Taxonomy(args) => run_taxonomy_command(args).await,
        Commands::Clean(args) => run_clean_command(args),
        Commands::Perturb(args) => run_perturb_command(args),
        Commands::Eval(args) => run_eval_command(args).await,
        Commands::Report(args) => run_report_command(args),
    }
}

// ============================================================================
// Generation
// ============================================================================

fn resolve_config(config_file: Option<&Path>, overrides: &RunOverrides) -> anyhow::Result<RunConfig> {
    RunConfig::resolve(|key| std::env::var(key).ok(), config_file, overrides)
        .context("Invalid run configuration")
}

fn build_provider(config: &RunConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let client = OpenAiCompatClient::new(
        config.base_url.clone().unwrap_or_default(),
        config.api_key.clone().unwrap_or_default(),
        config.model.clone().unwrap_or_default(),
        config.backend_timeout,
    )
    .context("Failed to initialize LLM client")?;
    info!(base_url = %client.base_url(), model = %client.default_model(), "Using OpenAI-compatible backend");
    Ok(Arc::new(client))
}

/// `<dir>/<stem>.report.json` next to a dataset path.
fn report_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    output.with_file_name(format!("{}.report.json", stem))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn persist_run(output: &RunOutput, dataset_path: &Path, report_path: &Path) -> anyhow::Result<()> {
    ensure_parent(report_path)?;
    output
        .report
        .write_json(report_path)
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;

    if output.dataset.is_empty() {
        warn!("No records survived generation; dataset file not written");
        return Ok(());
    }
    ensure_parent(dataset_path)?;
    write_dataset(&output.dataset.records, dataset_path)
        .with_context(|| format!("Failed to write dataset {}", dataset_path.display()))?;
    info!(path = %dataset_path.display(), records = output.dataset.len(), "Dataset written");
    Ok(())
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let overrides = args.overrides()?;
    let config = resolve_config(args.run.config.as_deref(), &overrides)?;
    let provider = build_provider(&config)?;
    let run = GenerationRun::new(config, provider)?;
    let report_path = args.report.clone().unwrap_or_else(|| report_path_for(&args.output));

    let start = Instant::now();
    let (output, failure) = match run.run().await {
        Ok(output) => (output, None),
        Err(GenerationError::Shortfall {
            pairs,
            summary,
            output,
        }) => (*output, Some(format!("{} pair(s) missed quota: {}", pairs, summary))),
        Err(e) => return Err(e.into()),
    };

    persist_run(&output, &args.output, &report_path)?;
    let summary = GenerationSummary::new(&output.report, &args.output, &report_path, start.elapsed());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("✓ Generation finished ({})", summary.status);
        println!("  Scenario: {}", summary.scenario);
        println!("  Domains:  {}", summary.domains.join(", "));
        println!(
            "  Records:  {} (requested {}, delivered {}, cross-pair duplicates {})",
            summary.records, summary.requested, summary.delivered, summary.cross_pair_duplicates
        );
        for (category, count) in &summary.by_category {
            println!("    {}: {}", category, count);
        }
        for shortfall in &summary.shortfalls {
            println!("  ! {}", shortfall);
        }
        println!("  Dataset:  {}", summary.output);
        println!("  Report:   {}", summary.report);
    }

    if let Some(message) = failure {
        anyhow::bail!(message);
    }
    if output.dataset.is_empty() {
        anyhow::bail!("No records were generated; see {}", report_path.display());
    }
    Ok(())
}

async fn run_taxonomy_command(args: TaxonomyArgs) -> anyhow::Result<()> {
    let config = resolve_config(args.run.config.as_deref(), &args.run.overrides())?;
    let provider = build_provider(&config)?;
    let run = GenerationRun::new(config, provider)?;
    let taxonomy: DomainTaxonomy = run.extract_taxonomy().await?;
    if taxonomy.fallback {
        warn!("Taxonomy extraction fell back to the general domain");
    }
    println!("{}", serde_json::to_string_pretty(&taxonomy)?);
    Ok(())
}

// ============================================================================
// Dataset maintenance
// ============================================================================

fn load_canonicalizer(policy: Option<&Path>) -> anyhow::Result<Arc<Canonicalizer>> {
    let policy = match policy {
        Some(path) => CanonicalPolicy::from_yaml_file(path)
            .with_context(|| format!("Failed to load policy {}", path.display()))?,
        None => CanonicalPolicy::default(),
    };
    policy.validate()?;
    Ok(Arc::new(Canonicalizer::new(policy)))
}

fn load_records(path: &Path) -> anyhow::Result<Vec<TestQueryRecord>> {
    let records =
        read_dataset(path).with_context(|| format!("Failed to read dataset {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Dataset loaded");
    Ok(records)
}

fn save_records(dataset: &Dataset, path: &Path) -> anyhow::Result<()> {
    ensure_parent(path)?;
    write_dataset(&dataset.records, path)
        .with_context(|| format!("Failed to write dataset {}", path.display()))
}

/// Re-canonicalizes and deduplicates records; length bounds are not applied.
pub fn clean_records(records: Vec<TestQueryRecord>, canonicalizer: Arc<Canonicalizer>) -> Dataset {
    DatasetAssembler::new(canonicalizer)
        .with_length_bounds(false)
        .reassemble(records)
}

fn run_clean_command(args: CleanArgs) -> anyhow::Result<()> {
    let canonicalizer = load_canonicalizer(args.policy.as_deref())?;
    let records = load_records(&args.input)?;
    let input_records = records.len();
    let dataset = clean_records(records, canonicalizer);
    let output = args.output.unwrap_or_else(|| args.input.clone());
    save_records(&dataset, &output)?;
    RewriteSummary::new(input_records, &dataset, &output).print(args.json)
}

/// Parses a comma-separated list of noisy categories.
pub fn parse_noisy_categories(raw: &str) -> anyhow::Result<Vec<Category>> {
    let mut categories = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let category = Category::from_str(part)?;
        if !category.is_noisy() {
            anyhow::bail!("{} has no rule-based transform; expected TYPO, SLANG, DIALECT or NOISE", category);
        }
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        anyhow::bail!("No categories given");
    }
    Ok(categories)
}

/// Derives variants from every BASE record and assembles them with the sources.
pub fn perturb_records(
    records: Vec<TestQueryRecord>,
    categories: &[Category],
    seed: u64,
    variants_only: bool,
    canonicalizer: Arc<Canonicalizer>,
) -> Dataset {
    let mut perturber = Perturber::new(seed);
    let mut variants = Vec::new();
    for record in records.iter().filter(|r| r.category == Category::Base) {
        variants.extend(
            perturber
                .derive(record, categories)
                .into_iter()
                .map(|draft| draft.finalize(String::new())),
        );
    }
    info!(variants = variants.len(), "Derived rule-based variants");

    let combined: Vec<TestQueryRecord> = if variants_only {
        variants
    } else {
        records.into_iter().chain(variants).collect()
    };
    DatasetAssembler::new(canonicalizer).reassemble(combined)
}

fn run_perturb_command(args: PerturbArgs) -> anyhow::Result<()> {
    let categories = parse_noisy_categories(&args.categories)?;
    let canonicalizer = load_canonicalizer(args.policy.as_deref())?;
    let records = load_records(&args.input)?;
    let input_records = records.len();
    if !records.iter().any(|r| r.category == Category::Base) {
        anyhow::bail!("{} holds no BASE records to perturb", args.input.display());
    }
    let dataset = perturb_records(records, &categories, args.seed, args.variants_only, canonicalizer);
    save_records(&dataset, &args.output)?;
    RewriteSummary::new(input_records, &dataset, &args.output).print(args.json)
}

// ============================================================================
// Evaluation
// ============================================================================

fn print_metrics(metrics: &EvalMetrics, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(metrics)?);
    } else {
        print!("{}", render_markdown(metrics));
    }
    Ok(())
}

async fn run_eval_command(args: EvalArgs) -> anyhow::Result<()> {
    let records = load_records(&args.input)?;
    if records.is_empty() {
        anyhow::bail!("{} holds no records", args.input.display());
    }
    let predictor = HttpPredictor::new(args.api_url.clone(), Duration::from_secs(args.timeout_secs))?;
    info!(url = %predictor.url(), records = records.len(), "Replaying dataset");

    let rows = EvalRunner::new(Arc::new(predictor)).run(&records).await;
    let metrics = compute_metrics(&records, &rows, args.top_k);

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create directory {}", args.output_dir.display()))?;
    write_jsonl(&rows, &args.output_dir.join("predictions.jsonl"))?;
    fs::write(
        args.output_dir.join("metrics.json"),
        serde_json::to_string_pretty(&metrics)?,
    )?;
    fs::write(args.output_dir.join("report.md"), render_markdown(&metrics))?;
    info!(dir = %args.output_dir.display(), "Evaluation artifacts written");

    let failures = rows.iter().filter(|r| r.error.is_some()).count();
    if failures > 0 {
        warn!(failures, "Some predictions failed and were scored as misses");
    }
    print_metrics(&metrics, args.json)
}

fn run_report_command(args: ReportArgs) -> anyhow::Result<()> {
    let records = load_records(&args.input)?;
    let predictions = read_predictions(&args.predictions)
        .with_context(|| format!("Failed to read predictions {}", args.predictions.display()))?;
    let metrics = compute_metrics(&records, &predictions, args.top_k);
    if let Some(path) = &args.output {
        ensure_parent(path)?;
        fs::write(path, render_markdown(&metrics))?;
    }
    print_metrics(&metrics, args.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn record(id: &str, query: &str, category: Category) -> TestQueryRecord {
        TestQueryRecord {
            id: id.to_string(),
            query: query.to_string(),
            category,
            expected_label: "nav.route".to_string(),
            domain: "导航".to_string(),
            difficulty: 2,
            rationale: String::new(),
            tags: vec![],
            context: None,
            group_id: None,
            step: None,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_args_to_overrides() {
        let cli = Cli::try_parse_from([
            "query_forge",
            "generate",
            "--scenario",
            "车载语音助手",
            "--quotas",
            "BASE:4,TYPO:2",
            "--concurrency",
            "3",
            "--shortfall",
            "fail",
            "--fail-fast",
            "-o",
            "out/car.csv",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides.scenario.as_deref(), Some("车载语音助手"));
        assert_eq!(overrides.quotas.as_deref(), Some("BASE:4,TYPO:2"));
        assert_eq!(overrides.concurrency, Some(3));
        assert_eq!(overrides.shortfall_policy, Some(ShortfallPolicy::Fail));
        assert_eq!(overrides.fail_fast, Some(true));
        assert_eq!(overrides.split_across_domains, None);
        assert_eq!(args.output, PathBuf::from("out/car.csv"));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_quotas_conflict_with_weights() {
        let parsed = Cli::try_parse_from([
            "query_forge",
            "generate",
            "--quotas",
            "BASE:4",
            "--weights",
            "BASE:1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_bad_shortfall_policy_rejected() {
        let cli = Cli::try_parse_from(["query_forge", "gen", "--shortfall", "explode"]).unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert!(args.overrides().is_err());
    }

    #[test]
    fn test_report_path_for() {
        assert_eq!(
            report_path_for(Path::new("out/car.parquet")),
            PathBuf::from("out/car.report.json")
        );
        assert_eq!(report_path_for(Path::new("q.jsonl")), PathBuf::from("q.report.json"));
    }

    #[test]
    fn test_parse_noisy_categories() {
        assert_eq!(
            parse_noisy_categories("typo, NOISE,TYPO").unwrap(),
            vec![Category::Typo, Category::Noise]
        );
        assert!(parse_noisy_categories("SYN").is_err());
        assert!(parse_noisy_categories("BOGUS").is_err());
        assert!(parse_noisy_categories(" , ").is_err());
    }

    #[test]
    fn test_clean_records_drops_empty_and_duplicates() {
        let records = vec![
            record("BASE-00000001", "导航·到·银行", Category::Base),
            record("BASE-00000002", "导航到银行", Category::Base),
            record("BASE-00000003", "   ", Category::Base),
            record("BASE-00000004", "播放音乐", Category::Base),
        ];
        let dataset = clean_records(records, Arc::new(Canonicalizer::default()));
        let ids: Vec<&str> = dataset.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["BASE-00000001", "BASE-00000004"]);
        assert_eq!(dataset.stats.duplicates_removed, 1);
        assert_eq!(dataset.stats.dropped_invalid, 1);
    }

    #[test]
    fn test_perturb_records_keeps_sources_and_labels() {
        let records = vec![
            record("BASE-00000001", "导航到银行", Category::Base),
            record("SYN-00000002", "带我去银行", Category::Syn),
        ];
        let dataset = perturb_records(
            records,
            &[Category::Typo],
            7,
            false,
            Arc::new(Canonicalizer::default()),
        );
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records[0].id, "BASE-00000001");
        assert_eq!(dataset.records[1].id, "SYN-00000002");
        let variant = &dataset.records[2];
        assert_eq!(variant.category, Category::Typo);
        assert_ne!(variant.query, "导航到银行");
        assert_eq!(variant.expected_label, "nav.route");
        assert!(variant.id.starts_with("TYPO-"));
        assert!(variant.tags.contains(&"rule_based".to_string()));
    }

    #[test]
    fn test_perturb_records_variants_only() {
        let records = vec![record("BASE-00000001", "导航到银行", Category::Base)];
        let dataset = perturb_records(
            records,
            &[Category::Typo],
            3,
            true,
            Arc::new(Canonicalizer::default()),
        );
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].category, Category::Typo);
    }

    #[test]
    fn test_generation_summary_serializes() {
        let report = FulfillmentReport::new(
            &DomainTaxonomy::fallback("车载".to_string()),
            &[],
            &Dataset::default(),
        );
        let summary = GenerationSummary::new(
            &report,
            Path::new("a.parquet"),
            Path::new("a.report.json"),
            Duration::from_millis(5),
        );
        assert_eq!(summary.status, "failed");
        let json = serde_json::to_string_pretty(&summary).unwrap();
        assert!(json.contains("\"report\": \"a.report.json\""));
    }
}
