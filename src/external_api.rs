//! Adapter traits for the external surfaces named in §6.2–§6.5: scraping,
//! résumé tailoring, application submission, and notifications. The core
//! treats all four as opaque — it calls them and reacts to their typed
//! results, never reimplementing what they do.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One record produced by a scraper, shaped like the importer's source
/// records (§6.1) before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub posted_date: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<String>,
    pub visa_sponsorship: Option<bool>,
    #[serde(default)]
    pub easy_apply: bool,
    pub external_id: Option<String>,
}

/// Produces raw job records for a platform; the core never scrapes itself
/// (§6.2). Records flow into the Importer.
#[async_trait]
pub trait ScraperAdapter: Send + Sync {
    async fn scrape(&self, platform: &str, limit: u32, keywords: &[String], remote_only: bool) -> Result<Vec<ScrapedRecord>>;
}

/// Result of a successful résumé tailoring call (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailorResult {
    pub job_id: i64,
    pub resume_id: i64,
    pub pdf_path: String,
    pub summary: String,
    pub selected_achievements: Vec<String>,
    pub highlighted_skills: Vec<String>,
    pub tailoring_notes: String,
    pub cost_usd: f64,
}

/// Generates a tailored résumé for a Tier 1 job. Called only when
/// `enable_tier1_resume` is set; failure is logged and non-fatal to the
/// enclosing scoring pass.
#[async_trait]
pub trait TailorAdapter: Send + Sync {
    async fn tailor_for_job(&self, job_id: i64, template: &str) -> Result<TailorResult>;
}

/// Result of an application attempt (§6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub success: bool,
    pub job_id: i64,
    pub company: String,
    pub title: String,
    pub platform: String,
    pub method: String,
    pub error: Option<String>,
    pub screenshot_path: Option<String>,
}

/// Submits an application to a platform. Rate limits
/// (`max_applications_per_day`/`max_applications_per_hour`) are the
/// adapter's responsibility, not the core's.
#[async_trait]
pub trait ApplierAdapter: Send + Sync {
    async fn apply_to_job(&self, job_id: i64, resume_path: Option<&str>) -> Result<ApplyResult>;
}

/// Markdown flavor understood by the notification channel, mirroring
/// Telegram's `parse_mode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    PlainText,
    Markdown,
    Html,
}

/// Sends operator-facing notifications (§6.5): a free-form message, or a
/// digest of jobs awaiting a manual decision.
#[async_trait]
pub trait NotificationAdapter: Send + Sync {
    async fn notify(&self, message: &str, parse_mode: ParseMode) -> Result<()>;
    async fn notify_pending_decisions(&self, job_ids: &[i64]) -> Result<()>;
}
