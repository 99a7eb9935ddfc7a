//! Thin orchestrator tying the Importer and Scorer to a durable Run record
//! (§4.8).

use std::path::Path;

use crate::config::{AchievementsConfig, PreferencesConfig};
use crate::error::Result;
use crate::external_api::TailorAdapter;
use crate::importer;
use crate::llm::ProviderRegistry;
use crate::prefilter::PreFilter;
use crate::scorer::{Scorer, Stats as ScoringStats};
use crate::store::types::{RunStatsUpdate, RunStatus};
use crate::store::Store;

/// Where the Importer reads source records from for one [`Pipeline::run`]
/// call.
pub enum ImportSource<'a> {
    /// A single JSON file.
    File(&'a Path),
    /// Every file under a directory matching `glob_pattern`.
    Directory { dir: &'a Path, glob_pattern: &'a str },
    /// No import this run — score whatever is already unprocessed.
    None,
}

/// Knobs for one [`Pipeline::run`] invocation, mirroring the CLI's `run`
/// subcommand flags (§6.7).
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub batch_size: usize,
    pub limit: Option<i64>,
    pub enable_semantic_dedup: bool,
    pub enable_tier1_resume: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            limit: None,
            enable_semantic_dedup: true,
            enable_tier1_resume: true,
        }
    }
}

/// Combined outcome of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub import_stats: Option<importer::ImportStats>,
    pub scoring_stats: ScoringStats,
}

/// Runs Importer then Scorer under a single Run record, absorbing per-job
/// and per-file failures while letting Store integrity failures fail the
/// whole run (§4.8).
pub struct Pipeline<'a> {
    store: &'a Store,
    prefilter: &'a PreFilter,
    registry: &'a ProviderRegistry,
    achievements: &'a AchievementsConfig,
    preferences: &'a PreferencesConfig,
    tailor: Option<&'a (dyn TailorAdapter)>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a Store,
        prefilter: &'a PreFilter,
        registry: &'a ProviderRegistry,
        achievements: &'a AchievementsConfig,
        preferences: &'a PreferencesConfig,
        tailor: Option<&'a (dyn TailorAdapter)>,
    ) -> Self {
        Self {
            store,
            prefilter,
            registry,
            achievements,
            preferences,
            tailor,
        }
    }

    #[tracing::instrument(skip(self, source))]
    pub async fn run(&self, source: ImportSource<'_>, options: RunOptions) -> Result<RunReport> {
        let run_id = self.store.start_run()?;
        tracing::info!(run_id, "run started");

        let outcome = self.run_inner(source, options, run_id).await;

        match outcome {
            Ok(report) => {
                self.store.complete_run(run_id, RunStatus::Completed)?;
                tracing::info!(run_id, "run completed");
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "run failed");
                self.store.complete_run(run_id, RunStatus::Failed)?;
                Err(e)
            }
        }
    }

    async fn run_inner(&self, source: ImportSource<'_>, options: RunOptions, run_id: i64) -> Result<RunReport> {
        let import_stats = match source {
            ImportSource::File(path) => Some(importer::import_file(self.store, path)?),
            ImportSource::Directory { dir, glob_pattern } => Some(importer::import_directory(self.store, dir, glob_pattern)?),
            ImportSource::None => None,
        };

        if let Some(stats) = &import_stats {
            self.store.update_run_stats(
                run_id,
                &RunStatsUpdate {
                    jobs_scraped: Some(stats.inserted as i64),
                    ..Default::default()
                },
            )?;
        }

        let scorer = Scorer::new(self.store, self.prefilter, self.registry, self.achievements, self.preferences, self.tailor);
        let scoring_stats = scorer
            .process_unfiltered(options.batch_size, options.limit, options.enable_semantic_dedup, options.enable_tier1_resume)
            .await?;

        self.store.update_run_stats(
            run_id,
            &RunStatsUpdate {
                jobs_filtered: Some(scoring_stats.total_processed as i64),
                jobs_matched: Some((scoring_stats.tier1 + scoring_stats.tier2) as i64),
                jobs_pending_decision: Some(scoring_stats.tier2 as i64),
                jobs_failed: Some(scoring_stats.errors as i64),
                ..Default::default()
            },
        )?;

        Ok(RunReport {
            run_id,
            import_stats,
            scoring_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Provider, ProviderSelection};
    use std::collections::HashMap;

    fn empty_registry() -> ProviderRegistry {
        ProviderRegistry::new(
            HashMap::new(),
            ProviderSelection {
                provider: Provider::Anthropic,
                model: "claude-3-5-haiku-20241022".to_string(),
                api_key: "test-key".to_string(),
                base_url: None,
            },
        )
    }

    #[tokio::test]
    async fn run_with_no_import_and_no_unprocessed_jobs_completes() {
        let store = Store::in_memory().unwrap();
        let preferences = PreferencesConfig::default();
        let achievements = AchievementsConfig::default();
        let prefilter = PreFilter::new(&preferences);
        let registry = empty_registry();

        let pipeline = Pipeline::new(&store, &prefilter, &registry, &achievements, &preferences, None);
        let report = pipeline.run(ImportSource::None, RunOptions::default()).await.unwrap();

        assert_eq!(report.scoring_stats.total_processed, 0);
        let run = store.get_run(report.run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }
}
