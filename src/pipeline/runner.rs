//! End-to-end generation run.
//!
//! [`GenerationRun`] ties the stages together: taxonomy extraction, one
//! quota loop per (domain, category) pair, assembly and reporting.

use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{info, warn};

use crate::categories::Category;
use crate::error::GenerationError;
use crate::generator::{
    scoped_scenario, Dataset, DatasetAssembler, Domain, DomainTaxonomy, PairOutcome,
    PromptBuilder, QuotaLoop, TaxonomyExtractor,
};
use crate::llm::LlmProvider;
use crate::pipeline::config::{RunConfig, ShortfallPolicy};
use crate::pipeline::report::FulfillmentReport;
use crate::text::Canonicalizer;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub taxonomy: DomainTaxonomy,
    pub dataset: Dataset,
    pub report: FulfillmentReport,
}

/// One unit of quota work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairPlan {
    pub domain: Domain,
    pub category: Category,
    pub requested: usize,
}

/// A configured generation run.
pub struct GenerationRun {
    config: RunConfig,
    provider: Arc<dyn LlmProvider>,
    canonicalizer: Arc<Canonicalizer>,
}

impl GenerationRun {
    /// Validates `config` and loads its canonicalization policy.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Config` before any backend call is made.
    pub fn new(config: RunConfig, provider: Arc<dyn LlmProvider>) -> Result<Self, GenerationError> {
        config.validate()?;
        let policy = config.canonical_policy()?;
        policy.validate()?;
        Ok(Self {
            config,
            provider,
            canonicalizer: Arc::new(Canonicalizer::new(policy)),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn canonicalizer(&self) -> Arc<Canonicalizer> {
        Arc::clone(&self.canonicalizer)
    }

    /// Extracts the domain taxonomy for the configured scenario.
    pub async fn extract_taxonomy(&self) -> Result<DomainTaxonomy, GenerationError> {
        TaxonomyExtractor::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.canonicalizer),
            self.config.sampling(),
            self.config.taxonomy,
        )
        .with_language(self.config.language.clone())
        .with_timeout(self.config.backend_timeout)
        .with_fail_fast(self.config.fail_fast)
        .extract(&self.config.scenario)
        .await
        .map_err(GenerationError::Taxonomy)
    }

    /// Lists the pairs to run: domains in taxonomy order, categories in
    /// quota order within each domain.
    pub fn plan(&self, taxonomy: &DomainTaxonomy) -> Vec<PairPlan> {
        let quotas = self
            .config
            .quotas
            .per_domain(taxonomy.domains.len(), self.config.split_across_domains);
        taxonomy
            .domains
            .iter()
            .flat_map(|domain| {
                quotas.iter().map(move |(category, requested)| PairPlan {
                    domain: domain.clone(),
                    category: *category,
                    requested: *requested,
                })
            })
            .collect()
    }

    /// Runs taxonomy extraction followed by generation.
    pub async fn run(&self) -> Result<RunOutput, GenerationError> {
        let taxonomy = self.extract_taxonomy().await?;
        self.run_with_taxonomy(taxonomy).await
    }

    /// Generates, assembles and reports against a known taxonomy.
    ///
    /// # Errors
    ///
    /// `GenerationError::Backend` under fail-fast; `GenerationError::Shortfall`
    /// when the shortfall policy is `fail` and any pair under-delivered.
    pub async fn run_with_taxonomy(
        &self,
        taxonomy: DomainTaxonomy,
    ) -> Result<RunOutput, GenerationError> {
        let plan = self.plan(&taxonomy);
        info!(
            domains = taxonomy.domains.len(),
            pairs = plan.len(),
            concurrency = self.config.concurrency,
            "Starting generation"
        );

        let quota = QuotaLoop::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.canonicalizer),
            PromptBuilder::new(self.config.language.clone()).with_length_window(
                self.canonicalizer.policy().min_chars,
                self.canonicalizer.policy().max_chars,
            ),
            self.config.sampling(),
            self.config.quota_settings(),
        );

        // `buffered` yields in input order, so assembly order is stable.
        let outcomes: Vec<PairOutcome> = stream::iter(plan)
            .map(|pair| {
                let quota = &quota;
                let scenario = scoped_scenario(&taxonomy.description, &pair.domain);
                async move {
                    quota
                        .run_pair(&scenario, &pair.domain.name, pair.category, pair.requested)
                        .await
                        .map_err(|source| GenerationError::Backend {
                            domain: pair.domain.name.clone(),
                            category: pair.category.to_string(),
                            source,
                        })
                }
            })
            .buffered(self.config.concurrency)
            .try_collect()
            .await?;

        let assembler = DatasetAssembler::new(Arc::clone(&self.canonicalizer));
        let dataset = assembler.assemble(outcomes.iter().map(|o| o.records.clone()));
        let report = FulfillmentReport::new(&taxonomy, &outcomes, &dataset);
        report.log();

        let output = RunOutput {
            taxonomy,
            dataset,
            report,
        };

        if output.report.has_shortfall() && self.config.shortfall_policy == ShortfallPolicy::Fail {
            warn!(
                pairs = output.report.shortfalls.len(),
                "Shortfall policy is 'fail', rejecting run"
            );
            return Err(GenerationError::Shortfall {
                pairs: output.report.shortfalls.len(),
                summary: output.report.shortfall_summary(),
                output: Box::new(output),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::mock::{reply_with, MockLlmProvider, Scripted};
    use crate::pipeline::config::QuotaSpec;
    use std::time::Duration;

    fn config(quotas: Vec<(Category, usize)>) -> RunConfig {
        RunConfig::new()
            .with_scenario("车载语音助手")
            .with_backend("https://api.example.com/v1", "sk-test", "test-model")
            .with_quotas(QuotaSpec::Explicit(quotas))
            .with_max_attempts(2)
            .with_backend_timeout(Duration::from_millis(200))
    }

    const TAXONOMY: &str = r#"{"domains": [
        {"name": "导航", "intents": ["路线规划"]},
        {"name": "多媒体", "intents": ["播放音乐"]}
    ]}"#;

    #[test]
    fn test_new_rejects_invalid_config() {
        let provider = Arc::new(MockLlmProvider::new(vec![]));
        let result = GenerationRun::new(config(vec![]).with_batch_ceiling(0), provider);
        assert!(matches!(result, Err(GenerationError::Config(_))));
    }

    #[test]
    fn test_plan_order() {
        let provider = Arc::new(MockLlmProvider::new(vec![]));
        let run = GenerationRun::new(
            config(vec![(Category::Syn, 2), (Category::Base, 3)]),
            provider,
        )
        .unwrap();
        let taxonomy = DomainTaxonomy {
            description: "x".to_string(),
            domains: vec![
                Domain { name: "a".to_string(), intents: vec!["i".to_string()] },
                Domain { name: "b".to_string(), intents: vec!["j".to_string()] },
            ],
            fallback: false,
        };
        let plan: Vec<(String, Category, usize)> = run
            .plan(&taxonomy)
            .into_iter()
            .map(|p| (p.domain.name, p.category, p.requested))
            .collect();
        assert_eq!(
            plan,
            vec![
                ("a".to_string(), Category::Syn, 2),
                ("a".to_string(), Category::Base, 3),
                ("b".to_string(), Category::Syn, 2),
                ("b".to_string(), Category::Base, 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            Scripted::Reply(TAXONOMY.to_string()),
            Scripted::Reply(reply_with(&["导航到最近的银行", "导航去公司"])),
            Scripted::Reply(reply_with(&["播放周杰伦的歌", "来点轻音乐"])),
        ]));
        let run = GenerationRun::new(config(vec![(Category::Base, 2)]), provider.clone()).unwrap();
        let output = run.run().await.expect("run");

        assert_eq!(output.taxonomy.domain_names(), vec!["导航", "多媒体"]);
        assert_eq!(output.dataset.len(), 4);
        assert_eq!(output.dataset.records[0].domain, "导航");
        assert_eq!(output.dataset.records[2].domain, "多媒体");
        assert!(!output.report.has_shortfall());
        assert_eq!(provider.calls(), 3);

        let second = provider.requests()[1].user_content().unwrap_or_default().to_string();
        assert!(second.contains("导航"));
        assert!(second.contains("路线规划"));
    }

    #[tokio::test]
    async fn test_shortfall_is_reported_not_fatal() {
        let provider = Arc::new(MockLlmProvider::new(vec![Scripted::Reply(
            "no structure here".to_string(),
        )]));
        let run = GenerationRun::new(config(vec![(Category::Typo, 3)]), provider.clone()).unwrap();
        let output = run.run().await.expect("shortfall is soft");

        assert!(output.taxonomy.fallback);
        assert!(output.dataset.is_empty());
        assert_eq!(output.report.shortfalls.len(), 1);
        assert_eq!(output.report.shortfalls[0].domain, "general");
        assert_eq!(output.report.shortfalls[0].missing, 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_shortfall_policy_fail() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            Scripted::Reply("[]".to_string()),
            Scripted::Reply(reply_with(&["打开车窗"])),
        ]));
        let run = GenerationRun::new(
            config(vec![(Category::Base, 2)]).with_shortfall_policy(ShortfallPolicy::Fail),
            provider,
        )
        .unwrap();
        match run.run().await {
            Err(GenerationError::Shortfall { pairs, summary, output }) => {
                assert_eq!(pairs, 1);
                assert!(summary.contains("general/BASE: 1/2"));
                assert_eq!(output.dataset.len(), 1);
            }
            other => panic!("expected shortfall, got {:?}", other.map(|o| o.dataset.len())),
        }
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_run() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            Scripted::Reply(TAXONOMY.to_string()),
            Scripted::Fail(LlmError::ApiError {
                code: 401,
                message: "bad key".to_string(),
            }),
        ]));
        let run = GenerationRun::new(
            config(vec![(Category::Base, 2)]).with_fail_fast(true),
            provider.clone(),
        )
        .unwrap();
        match run.run().await {
            Err(GenerationError::Backend { domain, category, source }) => {
                assert_eq!(domain, "导航");
                assert_eq!(category, "BASE");
                assert!(source.is_auth_failure());
            }
            other => panic!("expected backend error, got {:?}", other.map(|o| o.dataset.len())),
        }
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_run_keeps_pair_order() {
        let provider = Arc::new(MockLlmProvider::always(reply_with(&[
            "打开空调",
            "关闭空调",
        ])));
        let run = GenerationRun::new(
            config(vec![(Category::Base, 2), (Category::Syn, 2), (Category::Slang, 2)])
                .with_concurrency(3),
            provider,
        )
        .unwrap();
        let output = run.run().await.expect("run");

        let categories: Vec<Category> = output.report.pairs.iter().map(|p| p.category).collect();
        assert_eq!(categories, vec![Category::Base, Category::Syn, Category::Slang]);
        // Whichever pair reached the backend first owns both queries.
        assert_eq!(output.dataset.len(), 2);
        assert_eq!(output.report.pairs.iter().filter(|p| p.delivered == 2).count(), 1);
        assert_eq!(output.report.shortfalls.len(), 2);
        assert_eq!(output.report.cross_pair_duplicates, 0);
    }

    #[tokio::test]
    async fn test_identical_replies_leave_later_pair_short() {
        let provider = Arc::new(MockLlmProvider::always(reply_with(&[
            "打开空调",
            "关闭空调",
        ])));
        let run = GenerationRun::new(
            config(vec![(Category::Base, 2), (Category::Syn, 2)]).with_concurrency(1),
            provider.clone(),
        )
        .unwrap();
        let output = run.run().await.expect("shortfall is soft");

        assert_eq!(output.dataset.len(), 2);
        assert!(output.dataset.records.iter().all(|r| r.category == Category::Base));
        assert_eq!(output.report.pairs[1].delivered, 0);
        assert_eq!(output.report.shortfalls.len(), 1);
        assert_eq!(output.report.shortfalls[0].category, Category::Syn);
        assert_eq!(output.report.shortfalls[0].missing, 2);
        // taxonomy, one BASE call, two SYN attempts
        assert_eq!(provider.calls(), 4);

        let run = GenerationRun::new(
            config(vec![(Category::Base, 2), (Category::Syn, 2)])
                .with_concurrency(1)
                .with_shortfall_policy(ShortfallPolicy::Fail),
            Arc::new(MockLlmProvider::always(reply_with(&["打开空调", "关闭空调"]))),
        )
        .unwrap();
        match run.run().await {
            Err(GenerationError::Shortfall { pairs, summary, .. }) => {
                assert_eq!(pairs, 1);
                assert!(summary.contains("general/SYN: 0/2"), "got: {}", summary);
            }
            other => panic!("expected shortfall, got {:?}", other.map(|o| o.dataset.len())),
        }
    }
}
