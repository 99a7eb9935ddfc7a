//! Durable job/application/run/blacklist/log records (§4.1).
//!
//! `Store` wraps a single SQLite connection behind a mutex, following the
//! same `with_conn` shape used elsewhere in this codebase for embedded
//! storage. Write operations serialize per-connection; the schema enables
//! WAL so reads are not blocked by an in-flight write.

mod schema;
pub mod types;

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::hashing;

pub use types::{
    Application, ApplicationStatus, BlacklistEntry, DailyStats, DecisionType, DuplicateCheck,
    DuplicateReason, Job, JobStatus, LogEntry, NewJob, ResumeRecord, Run, RunStatsUpdate, RunStatus,
};

/// Durable store over the entities of §3, backed by SQLite. Cheap to clone:
/// clones share the same underlying connection via `Arc`.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if absent) a store at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        if !schema::is_initialized(&conn) {
            schema::initialize_schema(&conn)?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory store, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("job store connection mutex poisoned".into()))?;
        Ok(f(&conn)?)
    }

    /// Runs `f` inside a SQLite transaction; any `Err` rolls the transaction
    /// back instead of committing.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("job store connection mutex poisoned".into()))?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // -------------------------------------------------------------
    // Jobs
    // -------------------------------------------------------------

    /// Inserts a new job. Fails with `Duplicate` if `url_hash` or
    /// `(platform, external_id)` collide with an existing row.
    pub fn insert_job(&self, record: &NewJob) -> Result<i64> {
        let url_hash = hashing::url_hash(&record.url);
        let scraped_at = record.scraped_at.unwrap_or_else(Utc::now);

        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("job store connection mutex poisoned".into()))?;

        conn.execute(
            "INSERT INTO jobs (
                external_id, platform, url, url_hash, fuzzy_hash, title, company,
                location, salary_min, salary_max, salary_currency, remote_type,
                visa_sponsorship, easy_apply, jd_markdown, jd_raw, status, source,
                source_priority, is_processed, scraped_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                'new', ?17, ?18, 0, ?19
            )",
            params![
                record.external_id,
                record.platform,
                record.url,
                url_hash,
                record.fuzzy_hash,
                record.title,
                record.company,
                record.location,
                record.salary_min,
                record.salary_max,
                record.salary_currency,
                record.remote_type,
                record.visa_sponsorship,
                record.easy_apply,
                record.jd_markdown,
                record.jd_raw,
                record.source,
                record.source_priority,
                scraped_at.to_rfc3339(),
            ],
        )
        .map(|_| conn.last_insert_rowid())
        .map_err(|e| classify_insert_error(e, &record.url))
    }

    /// Returns `None` instead of raising when the insert collides on
    /// `url_hash` or `(platform, external_id)`.
    pub fn insert_job_if_new(&self, record: &NewJob) -> Result<Option<i64>> {
        match self.insert_job(record) {
            Ok(id) => Ok(Some(id)),
            Err(Error::Duplicate(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{} WHERE id = ?1", SELECT_JOB), params![id], row_to_job)
                .optional()
        })
    }

    pub fn jobs_by_status(&self, status: JobStatus, limit: i64, offset: i64) -> Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE status = ?1 ORDER BY scraped_at DESC LIMIT ?2 OFFSET ?3",
                SELECT_JOB
            ))?;
            let rows = stmt.query_map(params![status.as_str(), limit, offset], row_to_job)?;
            rows.collect()
        })
    }

    /// Jobs with `is_processed = false`, most recently scraped first — the
    /// Scorer's input queue. `limit=None` returns every unprocessed job.
    pub fn unprocessed_jobs(&self, limit: Option<i64>) -> Result<Vec<Job>> {
        self.with_conn(|conn| {
            let sql = match limit {
                Some(_) => format!("{} WHERE is_processed = 0 ORDER BY scraped_at DESC LIMIT ?1", SELECT_JOB),
                None => format!("{} WHERE is_processed = 0 ORDER BY scraped_at DESC", SELECT_JOB),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match limit {
                Some(limit) => stmt.query_map(params![limit], row_to_job)?.collect(),
                None => stmt.query_map([], row_to_job)?.collect(),
            };
            rows
        })
    }

    /// Matched jobs in `[min, max]` match-score range, ordered by
    /// `match_score` descending.
    pub fn matched_jobs(&self, min: f64, max: f64, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE status = ?1 AND match_score >= ?2 AND match_score <= ?3 \
                 ORDER BY match_score DESC LIMIT ?4",
                SELECT_JOB
            ))?;
            let rows = stmt.query_map(params![status.as_str(), min, max, limit], row_to_job)?;
            rows.collect()
        })
    }

    /// Sets status and advances the single timestamp column the target
    /// status maps to (`filtered_at` / `decided_at` / `applied_at`).
    pub fn update_job_status(&self, id: i64, status: JobStatus, decision_type: Option<DecisionType>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let decision_type_str = decision_type.map(|d| d.as_str());
        self.with_conn(|conn| match status.timestamp_column() {
            Some("filtered_at") => conn.execute(
                "UPDATE jobs SET status = ?1, decision_type = ?2, filtered_at = ?3 WHERE id = ?4",
                params![status.as_str(), decision_type_str, now, id],
            ),
            Some("decided_at") => conn.execute(
                "UPDATE jobs SET status = ?1, decision_type = ?2, decided_at = ?3 WHERE id = ?4",
                params![status.as_str(), decision_type_str, now, id],
            ),
            Some("applied_at") => conn.execute(
                "UPDATE jobs SET status = ?1, decision_type = ?2, applied_at = ?3 WHERE id = ?4",
                params![status.as_str(), decision_type_str, now, id],
            ),
            _ => conn.execute(
                "UPDATE jobs SET status = ?1, decision_type = ?2 WHERE id = ?3",
                params![status.as_str(), decision_type_str, id],
            ),
        })?;
        Ok(())
    }

    /// Atomically sets the scoring columns, `filtered_at = now`, and
    /// `status = filtered`.
    pub fn update_job_scoring(
        &self,
        id: i64,
        score: f64,
        reasoning: &str,
        requirements: &[String],
        red_flags: &[String],
    ) -> Result<()> {
        let requirements_json = serde_json::to_string(requirements)?;
        let red_flags_json = serde_json::to_string(red_flags)?;
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET
                    match_score = ?1, match_reasoning = ?2, key_requirements = ?3,
                    red_flags = ?4, status = 'filtered', filtered_at = ?5
                 WHERE id = ?6",
                params![score, reasoning, requirements_json, red_flags_json, now, id],
            )
        })?;
        Ok(())
    }

    /// Idempotently marks `is_processed = true`.
    pub fn mark_processed(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| conn.execute("UPDATE jobs SET is_processed = 1 WHERE id = ?1", params![id]))?;
        Ok(())
    }

    /// Looks up a job id by `fuzzy_hash`, used by the importer's second
    /// dedup level.
    pub fn job_id_by_fuzzy_hash(&self, fuzzy_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM jobs WHERE fuzzy_hash = ?1", params![fuzzy_hash], |row| row.get(0))
                .optional()
        })
    }

    /// Looks up an existing job by `(platform, external_id)` or `url`, and
    /// classifies its status as a duplicate reason.
    pub fn check_duplicate(&self, platform: Option<&str>, external_id: Option<&str>, url: Option<&str>) -> Result<DuplicateCheck> {
        let existing = self.with_conn(|conn| {
            if let (Some(platform), Some(external_id)) = (platform, external_id) {
                let found: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT id, status FROM jobs WHERE platform = ?1 AND external_id = ?2",
                        params![platform, external_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                if found.is_some() {
                    return Ok(found);
                }
            }
            if let Some(url) = url {
                let hash = hashing::url_hash(url);
                return conn
                    .query_row(
                        "SELECT id, status FROM jobs WHERE url_hash = ?1",
                        params![hash],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional();
            }
            Ok(None)
        })?;

        Ok(match existing {
            None => DuplicateCheck {
                is_duplicate: false,
                reason: None,
                existing_job_id: None,
            },
            Some((id, status)) => {
                let status = JobStatus::parse(&status).unwrap_or(JobStatus::New);
                let reason = if status == JobStatus::Applied {
                    Some(DuplicateReason::AlreadyApplied)
                } else {
                    Some(DuplicateReason::AlreadyScraped)
                };
                DuplicateCheck {
                    is_duplicate: true,
                    reason,
                    existing_job_id: Some(id),
                }
            }
        })
    }

    /// Replaces an existing job's content fields with those of `record`,
    /// preserving scoring/workflow columns — the "more trusted source
    /// replaces everything" branch of source-priority resolution.
    pub fn replace_job_content(&self, id: i64, record: &NewJob) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET
                    platform = ?1, url = ?2, url_hash = ?3, title = ?4, company = ?5,
                    location = ?6, salary_min = ?7, salary_max = ?8, salary_currency = ?9,
                    remote_type = ?10, visa_sponsorship = ?11, easy_apply = ?12,
                    jd_markdown = ?13, jd_raw = ?14, source = ?15, source_priority = ?16
                 WHERE id = ?17",
                params![
                    record.platform,
                    record.url,
                    hashing::url_hash(&record.url),
                    record.title,
                    record.company,
                    record.location,
                    record.salary_min,
                    record.salary_max,
                    record.salary_currency,
                    record.remote_type,
                    record.visa_sponsorship,
                    record.easy_apply,
                    record.jd_markdown,
                    record.jd_raw,
                    record.source,
                    record.source_priority,
                    id,
                ],
            )
        })?;
        Ok(())
    }

    /// Updates only the description of an existing job — the "same
    /// priority, longer description wins" branch of source-priority
    /// resolution.
    pub fn update_job_description(&self, id: i64, jd_raw: &str, jd_markdown: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET jd_raw = ?1, jd_markdown = COALESCE(?2, jd_markdown) WHERE id = ?3",
                params![jd_raw, jd_markdown, id],
            )
        })?;
        Ok(())
    }

    /// Up to 10 non-rejected jobs from `company`, for semantic dedup (§4.7).
    pub fn recent_non_rejected_by_company(&self, company: &str, exclude_id: Option<i64>) -> Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE company = ?1 AND status != 'rejected' AND id != ?2 \
                 ORDER BY scraped_at DESC LIMIT 10",
                SELECT_JOB
            ))?;
            let rows = stmt.query_map(params![company, exclude_id.unwrap_or(-1)], row_to_job)?;
            rows.collect()
        })
    }

    // -------------------------------------------------------------
    // Blacklist
    // -------------------------------------------------------------

    /// Idempotent insert: a duplicate `(type, value)` pair is swallowed.
    pub fn upsert_blacklist(&self, entry_type: &str, value: &str, reason: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blacklist (entry_type, value, reason) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entry_type, value) DO UPDATE SET reason = excluded.reason",
                params![entry_type, value, reason],
            )
        })?;
        Ok(())
    }

    pub fn is_blacklisted(&self, company: &str) -> Result<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM blacklist WHERE entry_type = 'company' AND lower(value) = lower(?1)",
                params![company],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|count| count > 0)
    }

    pub fn get_blacklist(&self) -> Result<Vec<BlacklistEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entry_type, value, reason, created_at FROM blacklist ORDER BY created_at",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(BlacklistEntry {
                    id: row.get(0)?,
                    entry_type: row.get(1)?,
                    value: row.get(2)?,
                    reason: row.get(3)?,
                    created_at: parse_timestamp(row.get::<_, String>(4)?),
                })
            })?;
            rows.collect()
        })
    }

    // -------------------------------------------------------------
    // Applications
    // -------------------------------------------------------------

    pub fn insert_application(&self, job_id: i64, resume_path: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO applications (job_id, resume_path, status) VALUES (?1, ?2, 'pending')",
                params![job_id, resume_path],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_application_status(&self, id: i64, status: ApplicationStatus, error_message: Option<&str>) -> Result<()> {
        let submitted_at = matches!(status, ApplicationStatus::Submitted).then(|| Utc::now().to_rfc3339());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE applications SET
                    status = ?1, error_message = ?2, attempts = attempts + 1,
                    submitted_at = COALESCE(?3, submitted_at)
                 WHERE id = ?4",
                params![status.as_str(), error_message, submitted_at, id],
            )
        })?;
        Ok(())
    }

    pub fn applications_today(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM applications WHERE date(submitted_at) = date('now')",
                [],
                |row| row.get(0),
            )
        })
    }

    // -------------------------------------------------------------
    // Resumes
    // -------------------------------------------------------------

    pub fn insert_resume(
        &self,
        job_id: i64,
        pdf_path: &str,
        highlights: &[String],
        tailoring_notes: Option<&str>,
    ) -> Result<i64> {
        let highlights_json = serde_json::to_string(highlights)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO resumes (job_id, pdf_path, highlights, tailoring_notes) VALUES (?1, ?2, ?3, ?4)",
                params![job_id, pdf_path, highlights_json, tailoring_notes],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Most recent résumé for a job, if any — "multiple per job allowed; the
    /// most recent wins" (§3.1).
    pub fn resume_for_job(&self, job_id: i64) -> Result<Option<ResumeRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, job_id, pdf_path, highlights, tailoring_notes, generated_at
                 FROM resumes WHERE job_id = ?1 ORDER BY generated_at DESC LIMIT 1",
                params![job_id],
                row_to_resume,
            )
            .optional()
        })
    }

    // -------------------------------------------------------------
    // Runs
    // -------------------------------------------------------------

    pub fn start_run(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO runs (status) VALUES ('running')", [])?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_run_stats(&self, run_id: i64, delta: &RunStatsUpdate) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE runs SET
                    jobs_scraped = jobs_scraped + ?1,
                    jobs_filtered = jobs_filtered + ?2,
                    jobs_matched = jobs_matched + ?3,
                    jobs_auto_applied = jobs_auto_applied + ?4,
                    jobs_pending_decision = jobs_pending_decision + ?5,
                    jobs_failed = jobs_failed + ?6
                 WHERE id = ?7",
                params![
                    delta.jobs_scraped.unwrap_or(0),
                    delta.jobs_filtered.unwrap_or(0),
                    delta.jobs_matched.unwrap_or(0),
                    delta.jobs_auto_applied.unwrap_or(0),
                    delta.jobs_pending_decision.unwrap_or(0),
                    delta.jobs_failed.unwrap_or(0),
                    run_id,
                ],
            )
        })?;
        Ok(())
    }

    pub fn complete_run(&self, run_id: i64, status: RunStatus) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE runs SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), run_id],
            )
        })?;
        Ok(())
    }

    pub fn current_run(&self) -> Result<Option<Run>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, started_at, completed_at, jobs_scraped, jobs_filtered, jobs_matched,
                        jobs_auto_applied, jobs_pending_decision, jobs_failed, status
                 FROM runs WHERE status = 'running' ORDER BY started_at DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()
        })
    }

    pub fn get_run(&self, id: i64) -> Result<Option<Run>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, started_at, completed_at, jobs_scraped, jobs_filtered, jobs_matched,
                        jobs_auto_applied, jobs_pending_decision, jobs_failed, status
                 FROM runs WHERE id = ?1",
                params![id],
                row_to_run,
            )
            .optional()
        })
    }

    // -------------------------------------------------------------
    // Stats & logging
    // -------------------------------------------------------------

    /// Aggregate counters for `date` (format `YYYY-MM-DD`), for the report
    /// surface.
    pub fn daily_stats(&self, date: &str) -> Result<DailyStats> {
        self.with_conn(|conn| {
            let scraped: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(scraped_at) = ?1",
                params![date],
                |r| r.get(0),
            )?;
            let high_match: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(filtered_at) = ?1 AND decision_type = 'auto'",
                params![date],
                |r| r.get(0),
            )?;
            let medium_match: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(filtered_at) = ?1 AND decision_type = 'manual'",
                params![date],
                |r| r.get(0),
            )?;
            let rejected: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(decided_at) = ?1 AND status = 'rejected'",
                params![date],
                |r| r.get(0),
            )?;
            let auto_applied: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(applied_at) = ?1 AND decision_type = 'auto'",
                params![date],
                |r| r.get(0),
            )?;
            let manual_applied: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE date(applied_at) = ?1 AND decision_type = 'manual'",
                params![date],
                |r| r.get(0),
            )?;
            let failed: i64 = conn.query_row(
                "SELECT COUNT(*) FROM applications a JOIN jobs j ON j.id = a.job_id
                 WHERE date(a.created_at) = ?1 AND a.status = 'failed'",
                params![date],
                |r| r.get(0),
            )?;
            let pending: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = 'matched' AND decision_type = 'manual' AND decided_at IS NULL",
                [],
                |r| r.get(0),
            )?;
            let total_applications: i64 = conn.query_row(
                "SELECT COUNT(*) FROM applications WHERE date(created_at) = ?1",
                params![date],
                |r| r.get(0),
            )?;
            let success_rate = if total_applications > 0 {
                (auto_applied + manual_applied) as f64 / total_applications as f64
            } else {
                0.0
            };

            Ok(DailyStats {
                scraped,
                high_match,
                medium_match,
                rejected,
                auto_applied,
                manual_applied,
                failed,
                pending,
                success_rate,
                glm_cost: 0.0,
                claude_cost: 0.0,
                total_cost: 0.0,
            })
        })
    }

    /// Durable append-only log insert, mirroring the in-process `tracing`
    /// event so skip reasons and per-job failures survive log rotation.
    pub fn log(&self, level: &str, component: &str, message: &str, details: Option<&serde_json::Value>) -> Result<()> {
        let details_json = details.map(|d| d.to_string());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO log_entries (level, component, message, details) VALUES (?1, ?2, ?3, ?4)",
                params![level, component, message, details_json],
            )
        })?;
        Ok(())
    }

    pub fn recent_logs(&self, limit: i64) -> Result<Vec<LogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, level, component, message, details, created_at
                 FROM log_entries ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let details: Option<String> = row.get(4)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    level: row.get(1)?,
                    component: row.get(2)?,
                    message: row.get(3)?,
                    details: details.and_then(|d| serde_json::from_str(&d).ok()),
                    created_at: parse_timestamp(row.get::<_, String>(5)?),
                })
            })?;
            rows.collect()
        })
    }
}

const SELECT_JOB: &str = "SELECT id, external_id, platform, url, url_hash, fuzzy_hash, title, company,
           location, salary_min, salary_max, salary_currency, remote_type, visa_sponsorship,
           easy_apply, jd_markdown, jd_raw, match_score, match_reasoning, key_requirements,
           red_flags, status, decision_type, source, source_priority, is_processed,
           scraped_at, filtered_at, decided_at, applied_at
    FROM jobs";

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let key_requirements: Option<String> = row.get(19)?;
    let red_flags: Option<String> = row.get(20)?;
    let status: String = row.get(21)?;
    let decision_type: Option<String> = row.get(22)?;
    let filtered_at: Option<String> = row.get(27)?;
    let decided_at: Option<String> = row.get(28)?;
    let applied_at: Option<String> = row.get(29)?;

    Ok(Job {
        id: row.get(0)?,
        external_id: row.get(1)?,
        platform: row.get(2)?,
        url: row.get(3)?,
        url_hash: row.get(4)?,
        fuzzy_hash: row.get(5)?,
        title: row.get(6)?,
        company: row.get(7)?,
        location: row.get(8)?,
        salary_min: row.get(9)?,
        salary_max: row.get(10)?,
        salary_currency: row.get(11)?,
        remote_type: row.get(12)?,
        visa_sponsorship: row.get(13)?,
        easy_apply: row.get(14)?,
        jd_markdown: row.get(15)?,
        jd_raw: row.get(16)?,
        match_score: row.get(17)?,
        match_reasoning: row.get(18)?,
        key_requirements: key_requirements.and_then(|s| serde_json::from_str(&s).ok()),
        red_flags: red_flags.and_then(|s| serde_json::from_str(&s).ok()),
        status: JobStatus::parse(&status).unwrap_or(JobStatus::New),
        decision_type: decision_type.and_then(|d| DecisionType::parse(&d)),
        source: row.get(23)?,
        source_priority: row.get(24)?,
        is_processed: row.get(25)?,
        scraped_at: parse_timestamp(row.get::<_, String>(26)?),
        filtered_at: filtered_at.map(parse_timestamp),
        decided_at: decided_at.map(parse_timestamp),
        applied_at: applied_at.map(parse_timestamp),
    })
}

fn row_to_resume(row: &rusqlite::Row) -> rusqlite::Result<ResumeRecord> {
    let highlights: Option<String> = row.get(3)?;
    Ok(ResumeRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        pdf_path: row.get(2)?,
        html_content: None,
        highlights: highlights.and_then(|s| serde_json::from_str(&s).ok()),
        tailoring_notes: row.get(4)?,
        generated_at: parse_timestamp(row.get::<_, String>(5)?),
    })
}

fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
    let completed_at: Option<String> = row.get(2)?;
    let status: String = row.get(9)?;
    Ok(Run {
        id: row.get(0)?,
        started_at: parse_timestamp(row.get::<_, String>(1)?),
        completed_at: completed_at.map(parse_timestamp),
        jobs_scraped: row.get(3)?,
        jobs_filtered: row.get(4)?,
        jobs_matched: row.get(5)?,
        jobs_auto_applied: row.get(6)?,
        jobs_pending_decision: row.get(7)?,
        jobs_failed: row.get(8)?,
        status: RunStatus::parse(&status).unwrap_or(RunStatus::Running),
    })
}

fn parse_timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn classify_insert_error(err: rusqlite::Error, url: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(ref sqlite_err, _) = err {
        if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation {
            return Error::duplicate(format!("job already exists for url {url}"));
        }
    }
    Error::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(url: &str, platform: &str, external_id: Option<&str>) -> NewJob {
        NewJob {
            external_id: external_id.map(String::from),
            platform: platform.to_string(),
            url: url.to_string(),
            fuzzy_hash: Some(hashing::fuzzy_hash("Acme", "Backend Engineer")),
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            salary_currency: "USD".to_string(),
            source: platform.to_string(),
            source_priority: 1,
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_get_round_trips() {
        let store = Store::in_memory().unwrap();
        let id = store.insert_job(&sample_job("https://x/1", "indeed", Some("abc"))).unwrap();
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.title, "Backend Engineer");
        assert_eq!(job.status, JobStatus::New);
        assert!(!job.is_processed);
    }

    #[test]
    fn duplicate_url_hash_rejected() {
        let store = Store::in_memory().unwrap();
        store.insert_job(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        let err = store.insert_job(&sample_job("https://x/1", "linkedin", Some("b"))).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn insert_job_if_new_returns_none_on_duplicate() {
        let store = Store::in_memory().unwrap();
        store.insert_job(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        let second = store.insert_job_if_new(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn update_job_scoring_sets_status_filtered() {
        let store = Store::in_memory().unwrap();
        let id = store.insert_job(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        store
            .update_job_scoring(id, 0.9, "great fit", &["Rust".into()], &[])
            .unwrap();
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Filtered);
        assert_eq!(job.match_score, Some(0.9));
        assert!(job.filtered_at.is_some());
    }

    #[test]
    fn update_job_status_sets_decided_at_for_terminal_statuses() {
        let store = Store::in_memory().unwrap();
        let id = store.insert_job(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        store.update_job_status(id, JobStatus::Approved, None).unwrap();
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Approved);
        assert!(job.decided_at.is_some());
        assert!(job.filtered_at.is_none());
    }

    #[test]
    fn check_duplicate_reports_already_applied() {
        let store = Store::in_memory().unwrap();
        let id = store.insert_job(&sample_job("https://x/1", "indeed", Some("a"))).unwrap();
        store.update_job_status(id, JobStatus::Applied, None).unwrap();
        let check = store.check_duplicate(Some("indeed"), Some("a"), None).unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.reason, Some(DuplicateReason::AlreadyApplied));
    }

    #[test]
    fn blacklist_upsert_is_idempotent() {
        let store = Store::in_memory().unwrap();
        store.upsert_blacklist("company", "Revature", Some("known staffing mill")).unwrap();
        store.upsert_blacklist("company", "Revature", None).unwrap();
        assert!(store.is_blacklisted("revature").unwrap());
        assert_eq!(store.get_blacklist().unwrap().len(), 1);
    }

    #[test]
    fn matched_jobs_orders_by_score_descending() {
        let store = Store::in_memory().unwrap();
        for (url, score) in [("https://x/1", 0.7), ("https://x/2", 0.95), ("https://x/3", 0.6)] {
            let id = store.insert_job(&sample_job(url, "indeed", None)).unwrap();
            store.update_job_scoring(id, score, "r", &[], &[]).unwrap();
            store.update_job_status(id, JobStatus::Matched, Some(DecisionType::Auto)).unwrap();
        }
        let jobs = store.matched_jobs(0.0, 1.0, JobStatus::Matched, 10).unwrap();
        let scores: Vec<f64> = jobs.iter().map(|j| j.match_score.unwrap()).collect();
        assert_eq!(scores, vec![0.95, 0.7, 0.6]);
    }

    #[test]
    fn run_stats_accumulate_additively() {
        let store = Store::in_memory().unwrap();
        let run_id = store.start_run().unwrap();
        store
            .update_run_stats(
                run_id,
                &RunStatsUpdate {
                    jobs_scraped: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .update_run_stats(
                run_id,
                &RunStatsUpdate {
                    jobs_scraped: Some(3),
                    jobs_matched: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.jobs_scraped, 8);
        assert_eq!(run.jobs_matched, 2);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = Store::in_memory().unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO blacklist (entry_type, value) VALUES ('company', 'Evil Corp')",
                [],
            )?;
            Err(Error::Internal("force rollback".into()))
        });
        assert!(result.is_err());
        assert!(!store.is_blacklisted("Evil Corp").unwrap());
    }
}
