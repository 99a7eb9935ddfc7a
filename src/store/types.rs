//! Entity types backing the job store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a [`Job`], progressing along the DAG:
/// `new -> (filtered | rejected)`, `filtered -> (matched | rejected)`,
/// `matched -> (approved | skipped)`, `approved -> (applied | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Filtered,
    Matched,
    Rejected,
    Approved,
    Skipped,
    Applied,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Filtered => "filtered",
            Self::Matched => "matched",
            Self::Rejected => "rejected",
            Self::Approved => "approved",
            Self::Skipped => "skipped",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "new" => Self::New,
            "filtered" => Self::Filtered,
            "matched" => Self::Matched,
            "rejected" => Self::Rejected,
            "approved" => Self::Approved,
            "skipped" => Self::Skipped,
            "applied" => Self::Applied,
            "failed" => Self::Failed,
            _ => return None,
        })
    }

    /// The single timestamp column each status transition advances, per the mapping
    /// `{filtered -> filtered_at, approved|rejected|skipped -> decided_at, applied -> applied_at}`.
    pub fn timestamp_column(&self) -> Option<&'static str> {
        match self {
            Self::Filtered => Some("filtered_at"),
            Self::Approved | Self::Rejected | Self::Skipped => Some("decided_at"),
            Self::Applied => Some("applied_at"),
            _ => None,
        }
    }
}

/// `auto` (score >= 0.85) or `manual` (0.60 <= score < 0.85); non-null iff `status=matched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Auto,
    Manual,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A single job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub external_id: Option<String>,
    pub platform: String,
    pub url: String,
    pub url_hash: String,
    pub fuzzy_hash: Option<String>,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: String,
    pub remote_type: Option<String>,
    pub visa_sponsorship: Option<bool>,
    pub easy_apply: bool,
    pub jd_markdown: Option<String>,
    pub jd_raw: Option<String>,
    pub match_score: Option<f64>,
    pub match_reasoning: Option<String>,
    pub key_requirements: Option<Vec<String>>,
    pub red_flags: Option<Vec<String>>,
    pub status: JobStatus,
    pub decision_type: Option<DecisionType>,
    pub source: String,
    pub source_priority: i32,
    pub is_processed: bool,
    pub scraped_at: DateTime<Utc>,
    pub filtered_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Fields required to insert a new job; the store fills in id, hashes, and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub external_id: Option<String>,
    pub platform: String,
    pub url: String,
    pub fuzzy_hash: Option<String>,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: String,
    pub remote_type: Option<String>,
    pub visa_sponsorship: Option<bool>,
    pub easy_apply: bool,
    pub jd_markdown: Option<String>,
    pub jd_raw: Option<String>,
    pub source: String,
    pub source_priority: i32,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Application record: exactly one per applied-to job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub resume_path: Option<String>,
    pub cover_letter_path: Option<String>,
    pub status: ApplicationStatus,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Submitted,
    Failed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A generated résumé artifact. Multiple per job are allowed; the most recent wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: i64,
    pub job_id: i64,
    pub pdf_path: String,
    pub html_content: Option<String>,
    pub highlights: Option<Vec<String>>,
    pub tailoring_notes: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// One pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub jobs_scraped: i64,
    pub jobs_filtered: i64,
    pub jobs_matched: i64,
    pub jobs_auto_applied: i64,
    pub jobs_pending_decision: i64,
    pub jobs_failed: i64,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Delta counters applied to a [`Run`] via `update_run_stats`.
#[derive(Debug, Clone, Default)]
pub struct RunStatsUpdate {
    pub jobs_scraped: Option<i64>,
    pub jobs_filtered: Option<i64>,
    pub jobs_matched: Option<i64>,
    pub jobs_auto_applied: Option<i64>,
    pub jobs_pending_decision: Option<i64>,
    pub jobs_failed: Option<i64>,
}

/// A `(type, value)` unique pair, e.g. `company:Revature`, with optional reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: i64,
    pub entry_type: String,
    pub value: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only structured log row, the durable mirror of `tracing` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub level: String,
    pub component: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`crate::store::Store::check_duplicate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub reason: Option<DuplicateReason>,
    pub existing_job_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    AlreadyApplied,
    AlreadyScraped,
}

/// Aggregate counters for the report surface, as produced by `daily_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyStats {
    pub scraped: i64,
    pub high_match: i64,
    pub medium_match: i64,
    pub rejected: i64,
    pub auto_applied: i64,
    pub manual_applied: i64,
    pub failed: i64,
    pub pending: i64,
    pub success_rate: f64,
    pub glm_cost: f64,
    pub claude_cost: f64,
    pub total_cost: f64,
}
