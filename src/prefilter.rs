//! Keyword/blacklist rejection, applied before any paid LLM call (§4.5).

use crate::config::PreferencesConfig;
use crate::store::Job;

/// Always rejected regardless of user configuration, covering the common
/// non-negotiables: clearance requirements, citizenship-only postings,
/// no-sponsorship language, and staffing-agency markers.
const DEFAULT_REJECT_KEYWORDS: &[&str] = &[
    "security clearance",
    "clearance required",
    "secret clearance",
    "ts/sci",
    "top secret",
    "us citizen only",
    "us citizens only",
    "must be a us citizen",
    "permanent resident required",
    "no sponsorship",
    "not able to sponsor",
    "unable to sponsor",
    "must be authorized to work without sponsorship",
    "without visa sponsorship",
    "no visa sponsorship",
    "sponsorship not available",
    "cannot sponsor",
    "will not sponsor",
    "w2 through our vendor",
    "contract to hire",
    "corp to corp",
    "c2c position",
    "third party",
    "staffing agency",
];

/// Fast rejection of jobs by company blacklist or description keyword,
/// applied ahead of LLM scoring to save cost.
pub struct PreFilter {
    blacklisted_companies: Vec<String>,
    reject_keywords: Vec<String>,
}

impl PreFilter {
    /// Builds the filter from candidate preferences, folding the user's
    /// reject keywords together with the built-in defaults (deduplicated).
    pub fn new(preferences: &PreferencesConfig) -> Self {
        let mut reject_keywords: Vec<String> = preferences
            .keywords
            .reject_keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .collect();

        for default_kw in DEFAULT_REJECT_KEYWORDS {
            if !reject_keywords.iter().any(|kw| kw == default_kw) {
                reject_keywords.push(default_kw.to_string());
            }
        }

        let blacklisted_companies = preferences
            .blacklisted_companies
            .iter()
            .map(|c| c.to_lowercase())
            .collect();

        tracing::info!(
            blacklisted_companies = blacklisted_companies.len(),
            reject_keywords = reject_keywords.len(),
            "prefilter initialized"
        );

        Self {
            blacklisted_companies,
            reject_keywords,
        }
    }

    /// Returns `(true, reason)` if `job` should be rejected without an LLM
    /// call, checking the company blacklist first and then keyword presence
    /// in the description (case-insensitive substring match).
    pub fn should_reject(&self, job: &Job) -> (bool, Option<String>) {
        if self.blacklisted_companies.iter().any(|c| c == &job.company.to_lowercase()) {
            return (true, Some(format!("Blacklisted company: {}", job.company)));
        }

        let jd_lower = job.jd_markdown.as_deref().or(job.jd_raw.as_deref()).unwrap_or("").to_lowercase();
        for keyword in &self.reject_keywords {
            if jd_lower.contains(keyword.as_str()) {
                return (true, Some(format!("Reject keyword found: '{keyword}'")));
            }
        }

        (false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeywordPreferences, PreferencesConfig};
    use crate::store::types::JobStatus;
    use chrono::Utc;

    fn job_with(company: &str, description: &str) -> Job {
        Job {
            id: 1,
            external_id: None,
            platform: "greenhouse".into(),
            url: "https://example.com/job/1".into(),
            url_hash: "hash".into(),
            fuzzy_hash: None,
            title: "Software Engineer".into(),
            company: company.into(),
            location: None,
            salary_min: None,
            salary_max: None,
            salary_currency: "USD".into(),
            remote_type: None,
            visa_sponsorship: None,
            easy_apply: false,
            jd_markdown: Some(description.into()),
            jd_raw: Some(description.into()),
            match_score: None,
            match_reasoning: None,
            key_requirements: None,
            red_flags: None,
            status: JobStatus::New,
            decision_type: None,
            source: "greenhouse".into(),
            source_priority: 1,
            is_processed: false,
            scraped_at: Utc::now(),
            filtered_at: None,
            decided_at: None,
            applied_at: None,
        }
    }

    #[test]
    fn rejects_blacklisted_company_case_insensitively() {
        let mut prefs = PreferencesConfig::default();
        prefs.blacklisted_companies = vec!["Revature".to_string()];
        let filter = PreFilter::new(&prefs);
        let (rejected, reason) = filter.should_reject(&job_with("REVATURE", "Great role"));
        assert!(rejected);
        assert!(reason.unwrap().contains("REVATURE"));
    }

    #[test]
    fn rejects_default_clearance_keyword() {
        let prefs = PreferencesConfig::default();
        let filter = PreFilter::new(&prefs);
        let (rejected, reason) = filter.should_reject(&job_with("Acme", "Requires an active security clearance"));
        assert!(rejected);
        assert!(reason.unwrap().contains("security clearance"));
    }

    #[test]
    fn user_keyword_is_merged_with_defaults() {
        let mut prefs = PreferencesConfig::default();
        prefs.keywords = KeywordPreferences {
            reject_keywords: vec!["unpaid internship".to_string()],
            prefer_keywords: Vec::new(),
        };
        let filter = PreFilter::new(&prefs);
        assert!(filter.reject_keywords.iter().any(|k| k == "unpaid internship"));
        assert!(filter.reject_keywords.iter().any(|k| k == "staffing agency"));
    }

    #[test]
    fn passes_clean_job() {
        let prefs = PreferencesConfig::default();
        let filter = PreFilter::new(&prefs);
        let (rejected, reason) = filter.should_reject(&job_with("Acme", "Remote-friendly Rust role"));
        assert!(!rejected);
        assert!(reason.is_none());
    }
}
