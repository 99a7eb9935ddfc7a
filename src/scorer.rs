//! Three-tier LLM scoring engine (§4.6): pre-filter and semantic-dedup
//! short-circuit before any paid call, then score via the configured
//! provider and route the job to its terminal state.

use std::time::Duration;

use serde::Deserialize;

use crate::config::{AchievementsConfig, PreferencesConfig};
use crate::error::{Error, Result};
use crate::external_api::TailorAdapter;
use crate::llm::{parse_structured_response, ChatMessage, ProviderRegistry, Purpose};
use crate::prefilter::PreFilter;
use crate::semantic_dedup::SemanticDedup;
use crate::store::types::{DecisionType, Job, JobStatus};
use crate::store::Store;

const WINDOW_PAUSE: Duration = Duration::from_millis(1000);

/// Aggregate counters from one [`process_unfiltered`] call. `total_processed`
/// counts every job a window attempted, including ones that errored, so
/// that `tier1 + tier2 + tier3 + errors + semantic_duplicates_found ==
/// total_processed` holds unconditionally.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Stats {
    pub total_processed: u64,
    pub tier1: u64,
    pub tier2: u64,
    pub tier3: u64,
    /// Subset of `tier3` rejected by [`PreFilter`] before any LLM call
    /// (§4.6.2 step 1). Not an additional addend in the additivity identity
    /// (§8.1) — every pre-filtered job is also counted in `tier3`.
    pub pre_filtered: u64,
    pub resumes_generated: u64,
    pub semantic_duplicates_found: u64,
    pub errors: u64,
    pub cost_usd: f64,
}

impl Stats {
    /// Total jobs landing in `status=rejected`: low-score plus pre-filtered
    /// plus semantic-duplicate rejections (§8.1: `pre_filtered <= rejected`).
    pub fn rejected(&self) -> u64 {
        self.tier3 + self.semantic_duplicates_found
    }

    fn merge(&mut self, delta: JobOutcome) {
        self.total_processed += 1;
        self.cost_usd += delta.cost_usd;
        match delta.kind {
            OutcomeKind::Tier1 => self.tier1 += 1,
            OutcomeKind::Tier2 => self.tier2 += 1,
            OutcomeKind::Tier3 => self.tier3 += 1,
            OutcomeKind::PreFiltered => {
                self.tier3 += 1;
                self.pre_filtered += 1;
            }
            OutcomeKind::SemanticDuplicate => self.semantic_duplicates_found += 1,
            OutcomeKind::Error => self.errors += 1,
        }
        if delta.resume_generated {
            self.resumes_generated += 1;
        }
    }
}

enum OutcomeKind {
    Tier1,
    Tier2,
    Tier3,
    PreFiltered,
    SemanticDuplicate,
    Error,
}

struct JobOutcome {
    kind: OutcomeKind,
    cost_usd: f64,
    resume_generated: bool,
}

impl JobOutcome {
    fn error() -> Self {
        Self {
            kind: OutcomeKind::Error,
            cost_usd: 0.0,
            resume_generated: false,
        }
    }

    fn pre_filtered() -> Self {
        Self {
            kind: OutcomeKind::PreFiltered,
            cost_usd: 0.0,
            resume_generated: false,
        }
    }

    fn semantic_duplicate() -> Self {
        Self {
            kind: OutcomeKind::SemanticDuplicate,
            cost_usd: 0.0,
            resume_generated: false,
        }
    }
}

/// JSON shape the scoring prompt instructs the provider to return.
#[derive(Debug, Deserialize)]
struct ScoreRecord {
    score: i64,
    reasoning: String,
    #[serde(default)]
    red_flags: Vec<String>,
    #[serde(default)]
    key_matches: Vec<String>,
}

/// Everything the Scorer needs beyond the job itself: the pre-filter, the
/// LLM provider registry, the formatted candidate profile, and optionally a
/// tailor adapter for Tier 1 résumé generation.
pub struct Scorer<'a> {
    store: &'a Store,
    prefilter: &'a PreFilter,
    registry: &'a ProviderRegistry,
    achievements_text: String,
    preferences_text: String,
    auto_apply_threshold: f64,
    notify_threshold: f64,
    tailor: Option<&'a (dyn TailorAdapter)>,
}

impl<'a> Scorer<'a> {
    pub fn new(
        store: &'a Store,
        prefilter: &'a PreFilter,
        registry: &'a ProviderRegistry,
        achievements: &AchievementsConfig,
        preferences: &PreferencesConfig,
        tailor: Option<&'a (dyn TailorAdapter)>,
    ) -> Self {
        Self {
            store,
            prefilter,
            registry,
            achievements_text: format_achievements(achievements),
            preferences_text: format_preferences(preferences),
            auto_apply_threshold: preferences.settings.auto_apply_threshold,
            notify_threshold: preferences.settings.notify_threshold,
            tailor,
        }
    }

    /// Scores every `is_processed=false` job (up to `limit`), `batch_size`
    /// at a time, pausing [`WINDOW_PAUSE`] between windows.
    #[tracing::instrument(skip(self))]
    pub async fn process_unfiltered(&self, batch_size: usize, limit: Option<i64>, enable_semantic_dedup: bool, enable_tier1_resume: bool) -> Result<Stats> {
        let jobs = self.store.unprocessed_jobs(limit)?;
        let mut stats = Stats::default();

        if jobs.is_empty() {
            tracing::info!("no unprocessed jobs found");
            return Ok(stats);
        }

        tracing::info!(count = jobs.len(), batch_size, "scoring unfiltered jobs");

        let windows: Vec<&[Job]> = jobs.chunks(batch_size.max(1)).collect();
        let window_count = windows.len();

        for (window_idx, window) in windows.into_iter().enumerate() {
            let futures = window.iter().map(|job| self.process_one(job, enable_semantic_dedup, enable_tier1_resume));
            let outcomes = futures::future::join_all(futures).await;
            for outcome in outcomes {
                stats.merge(outcome);
            }

            if window_idx + 1 < window_count {
                tokio::time::sleep(WINDOW_PAUSE).await;
            }
        }

        tracing::info!(
            tier1 = stats.tier1,
            tier2 = stats.tier2,
            tier3 = stats.tier3,
            errors = stats.errors,
            cost_usd = stats.cost_usd,
            "scoring complete"
        );

        Ok(stats)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = job.id, title = %job.title, company = %job.company))]
    async fn process_one(&self, job: &Job, enable_semantic_dedup: bool, enable_tier1_resume: bool) -> JobOutcome {
        match self.process_one_inner(job, enable_semantic_dedup, enable_tier1_resume).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "failed to score job");
                JobOutcome::error()
            }
        }
    }

    async fn process_one_inner(&self, job: &Job, enable_semantic_dedup: bool, enable_tier1_resume: bool) -> Result<JobOutcome> {
        let (should_reject, reason) = self.prefilter.should_reject(job);
        if should_reject {
            let reason = reason.unwrap_or_else(|| "Pre-filter rejection".to_string());
            tracing::debug!(job_id = job.id, reason = %reason, "pre-filtered");
            self.store.update_job_scoring(job.id, 0.0, &format!("Pre-filter: {reason}"), &[], std::slice::from_ref(&reason))?;
            self.store.update_job_status(job.id, JobStatus::Rejected, None)?;
            self.store.mark_processed(job.id)?;
            return Ok(JobOutcome::pre_filtered());
        }

        if enable_semantic_dedup {
            if let Some(similar_id) = SemanticDedup::check(self.store, job)? {
                let reasoning = format!("Semantic duplicate of job #{similar_id}");
                self.store
                    .update_job_scoring(job.id, 0.0, &reasoning, &[], &["Duplicate job posting".to_string()])?;
                self.store.update_job_status(job.id, JobStatus::Rejected, None)?;
                self.store.mark_processed(job.id)?;
                return Ok(JobOutcome::semantic_duplicate());
            }
        }

        let client = self.registry.client_for(Purpose::Filter);
        let prompt = self.build_prompt(job);
        let response = client.chat(&[ChatMessage::user(prompt)], 0.3, 800).await?;

        let value = parse_structured_response(&response.content)?;
        let record: ScoreRecord = serde_json::from_value(value)
            .map_err(|e| Error::invalid_response(format!("scoring response missing expected fields: {e}")))?;

        let score = record.score.clamp(0, 100);
        let match_score = score as f64 / 100.0;

        self.store
            .update_job_scoring(job.id, match_score, &record.reasoning, &record.key_matches, &record.red_flags)?;

        let (status, decision_type, kind) = if match_score >= self.auto_apply_threshold {
            (JobStatus::Matched, Some(DecisionType::Auto), OutcomeKind::Tier1)
        } else if match_score >= self.notify_threshold {
            (JobStatus::Matched, Some(DecisionType::Manual), OutcomeKind::Tier2)
        } else {
            (JobStatus::Rejected, None, OutcomeKind::Tier3)
        };

        self.store.update_job_status(job.id, status, decision_type)?;
        self.store.mark_processed(job.id)?;

        let mut resume_generated = false;
        if matches!(kind, OutcomeKind::Tier1) && enable_tier1_resume {
            if let Some(tailor) = self.tailor {
                match tailor.tailor_for_job(job.id, "modern").await {
                    Ok(result) => {
                        tracing::info!(job_id = job.id, pdf_path = %result.pdf_path, cost_usd = result.cost_usd, "resume generated");
                        resume_generated = true;
                    }
                    Err(e) => tracing::warn!(job_id = job.id, error = %e, "resume generation failed"),
                }
            }
        }

        Ok(JobOutcome {
            kind,
            cost_usd: response.cost_usd,
            resume_generated,
        })
    }

    fn build_prompt(&self, job: &Job) -> String {
        let location = job.location.as_deref().unwrap_or("Not specified");
        let salary = format_salary(job);
        let description = job.jd_markdown.as_deref().or(job.jd_raw.as_deref()).unwrap_or("No description available");

        format!(
            "You are a job filtering AI analyzing jobs for this candidate.\n\n\
             # CANDIDATE ACHIEVEMENTS\n{achievements}\n\n\
             # CANDIDATE PREFERENCES/REQUIREMENTS\n{preferences}\n\n\
             # JOB TO ANALYZE\n\
             Title: {title}\n\
             Company: {company}\n\
             Location: {location}\n\
             Salary: {salary}\n\
             Description:\n{description}\n\
             Source: {source}\n\n\
             # YOUR TASK\n\
             Score this job 0-100 based on:\n\n\
             ## Match Criteria (0-100 points)\n\
             - Skills match with achievements (0-40 points)\n\
             - Experience level match (0-20 points)\n\
             - Tech stack alignment (0-15 points)\n\
             - Remote work availability (0-10 points)\n\
             - Salary range (0-10 points)\n\
             - Visa sponsorship if needed (0-5 points)\n\n\
             ## Red Flags (subtract points)\n\
             - On-site required when remote needed (-20)\n\
             - No visa sponsorship when needed (-15)\n\
             - Salary below minimum (-10)\n\
             - Staffing agency/contract-to-hire (-10)\n\
             - Skills completely mismatched (-20)\n\n\
             Return a single JSON object, no markdown fences, no extra prose:\n\
             {{\"score\": 85, \"reasoning\": \"...\", \"red_flags\": [], \"key_matches\": [], \"tier\": \"high\"}}\n\n\
             SCORE GUIDELINES:\n\
             - 85-100: Excellent match -> tier \"high\"\n\
             - 60-84: Good match -> tier \"medium\"\n\
             - 0-59: Poor match -> tier \"low\"",
            achievements = self.achievements_text,
            preferences = self.preferences_text,
            title = job.title,
            company = job.company,
            location = location,
            salary = salary,
            description = description,
            source = job.platform,
        )
    }
}

fn format_salary(job: &Job) -> String {
    match (job.salary_min, job.salary_max) {
        (Some(min), Some(max)) => format!("${}k-${}k {}", min / 1000, max / 1000, job.salary_currency),
        (Some(min), None) => format!("${}k+ {}", min / 1000, job.salary_currency),
        (None, Some(max)) => format!("Up to ${}k {}", max / 1000, job.salary_currency),
        (None, None) => "Not specified".to_string(),
    }
}

fn format_achievements(achievements: &AchievementsConfig) -> String {
    let mut lines = Vec::new();
    for achievement in &achievements.items {
        lines.push(format!("## {}", achievement.name));
        if !achievement.category.is_empty() {
            lines.push(format!("Category: {}", achievement.category.join(", ")));
        }
        if !achievement.keywords.is_empty() {
            lines.push(format!("Keywords: {}", achievement.keywords.join(", ")));
        }
        for bullet in &achievement.bullets {
            lines.push(format!("- {bullet}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn format_preferences(preferences: &PreferencesConfig) -> String {
    let mut lines = Vec::new();
    if !preferences.target_positions.is_empty() {
        lines.push(format!("Target Positions: {}", preferences.target_positions.join(", ")));
    }
    if !preferences.location.preferred.is_empty() {
        lines.push(format!("Preferred Location: {}", preferences.location.preferred.join(", ")));
    }
    lines.push(format!("Minimum Salary: ${} {}", preferences.salary.minimum, preferences.salary.currency));
    if let Some(target_min) = preferences.salary.target_min {
        lines.push(format!("Target Salary: ${target_min} {}", preferences.salary.currency));
    }
    lines.push(format!("Visa Sponsorship Required: {}", preferences.work_authorization.needs_sponsorship));
    if !preferences.keywords.prefer_keywords.is_empty() {
        lines.push(format!("Preferred Keywords: {}", preferences.keywords.prefer_keywords.join(", ")));
    }

    if lines.is_empty() {
        "No specific preferences".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::llm::{Provider, ProviderSelection};
    use crate::store::types::{JobStatus as Status, NewJob};

    fn registry() -> ProviderRegistry {
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

    fn insert(store: &Store, company: &str, title: &str, description: &str) -> i64 {
        store
            .insert_job(&NewJob {
                platform: "greenhouse".into(),
                url: format!("https://example.com/{company}/{title}"),
                title: title.into(),
                company: company.into(),
                jd_raw: Some(description.into()),
                source: "greenhouse".into(),
                source_priority: 1,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn format_salary_covers_all_branches() {
        let mut job = sample_job();
        job.salary_min = Some(150_000);
        job.salary_max = Some(200_000);
        assert_eq!(format_salary(&job), "$150k-$200k USD");

        job.salary_max = None;
        assert_eq!(format_salary(&job), "$150k+ USD");

        job.salary_min = None;
        job.salary_max = Some(200_000);
        assert_eq!(format_salary(&job), "Up to $200k USD");

        job.salary_max = None;
        assert_eq!(format_salary(&job), "Not specified");
    }

    fn sample_job() -> Job {
        Job {
            id: 1,
            external_id: None,
            platform: "greenhouse".into(),
            url: "https://example.com/1".into(),
            url_hash: "h".into(),
            fuzzy_hash: None,
            title: "Backend Engineer".into(),
            company: "Acme".into(),
            location: None,
            salary_min: None,
            salary_max: None,
            salary_currency: "USD".into(),
            remote_type: None,
            visa_sponsorship: None,
            easy_apply: false,
            jd_markdown: None,
            jd_raw: None,
            match_score: None,
            match_reasoning: None,
            key_requirements: None,
            red_flags: None,
            status: Status::New,
            decision_type: None,
            source: "greenhouse".into(),
            source_priority: 1,
            is_processed: false,
            scraped_at: chrono::Utc::now(),
            filtered_at: None,
            decided_at: None,
            applied_at: None,
        }
    }

    #[test]
    fn stats_merge_keeps_additivity_with_pre_filtered_subset_of_tier3() {
        let mut stats = Stats::default();
        stats.merge(JobOutcome::pre_filtered());
        stats.merge(JobOutcome {
            kind: OutcomeKind::Tier1,
            cost_usd: 0.01,
            resume_generated: true,
        });
        stats.merge(JobOutcome::semantic_duplicate());
        stats.merge(JobOutcome::error());

        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.pre_filtered, 1);
        assert_eq!(stats.tier3, 1);
        assert_eq!(stats.resumes_generated, 1);
        assert_eq!(
            stats.tier1 + stats.tier2 + stats.tier3 + stats.errors + stats.semantic_duplicates_found,
            stats.total_processed
        );
        assert!(stats.pre_filtered <= stats.rejected());
    }

    #[tokio::test]
    async fn pre_filtered_job_is_rejected_without_llm_call() {
        let store = Store::in_memory().unwrap();
        insert(&store, "Acme", "Backend Engineer", "This role requires an active security clearance");

        let preferences = PreferencesConfig::default();
        let prefilter = PreFilter::new(&preferences);
        let achievements = AchievementsConfig::default();
        let reg = registry();
        let scorer = Scorer::new(&store, &prefilter, &reg, &achievements, &preferences, None);

        let stats = scorer.process_unfiltered(5, None, true, false).await.unwrap();

        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.pre_filtered, 1);
        assert_eq!(stats.tier3, 1);
        assert_eq!(stats.cost_usd, 0.0);

        let job = store.jobs_by_status(Status::Rejected, 10, 0).unwrap();
        assert_eq!(job.len(), 1);
        assert_eq!(job[0].match_score, Some(0.0));
        assert!(job[0].red_flags.as_ref().unwrap()[0].starts_with("Reject keyword found:"));
        assert!(job[0].is_processed);
    }

    #[tokio::test]
    async fn semantic_duplicate_is_rejected_without_llm_call() {
        let store = Store::in_memory().unwrap();
        let existing_id = insert(&store, "Acme", "Machine Learning Engineer", "great ML role");
        store.update_job_scoring(existing_id, 0.7, "ok fit", &[], &[]).unwrap();
        store.update_job_status(existing_id, Status::Matched, Some(DecisionType::Manual)).unwrap();
        store.mark_processed(existing_id).unwrap();

        insert(&store, "Acme", "ML Engineer", "great ML role, same posting");

        let preferences = PreferencesConfig::default();
        let prefilter = PreFilter::new(&preferences);
        let achievements = AchievementsConfig::default();
        let reg = registry();
        let scorer = Scorer::new(&store, &prefilter, &reg, &achievements, &preferences, None);

        let stats = scorer.process_unfiltered(5, None, true, false).await.unwrap();

        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.semantic_duplicates_found, 1);
        assert_eq!(stats.pre_filtered, 0);
        assert_eq!(stats.cost_usd, 0.0);

        let rejected = store.jobs_by_status(Status::Rejected, 10, 0).unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].match_reasoning.as_ref().unwrap().starts_with("Semantic duplicate of job #"));
    }

    #[tokio::test]
    async fn no_unprocessed_jobs_returns_empty_stats() {
        let store = Store::in_memory().unwrap();
        let preferences = PreferencesConfig::default();
        let prefilter = PreFilter::new(&preferences);
        let achievements = AchievementsConfig::default();
        let reg = registry();
        let scorer = Scorer::new(&store, &prefilter, &reg, &achievements, &preferences, None);

        let stats = scorer.process_unfiltered(5, None, true, false).await.unwrap();
        assert_eq!(stats.total_processed, 0);
    }
}
