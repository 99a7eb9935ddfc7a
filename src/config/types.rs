//! Typed configuration structs for the candidate profile, preferences,
//! achievements, credentials, and LLM provider map (§6.6).
//!
//! These are the shapes the core consumes; parsing lives in [`super::loader`]
//! and never touches free-form markdown — only TOML.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::llm::Provider;

/// Candidate résumé: personal info, summary, and the experience used to
/// ground tailoring decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeConfig {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub skills: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub graduated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// Candidate preferences: target roles, location rules, salary floor,
/// keyword policy, blacklist, and the tier thresholds (§3.2 invariant 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub target_positions: Vec<String>,
    #[serde(default)]
    pub location: LocationPreferences,
    #[serde(default)]
    pub salary: SalaryPreferences,
    #[serde(default)]
    pub keywords: KeywordPreferences,
    #[serde(default)]
    pub blacklisted_companies: Vec<String>,
    #[serde(default)]
    pub work_authorization: WorkAuthorization,
    #[serde(default)]
    pub settings: PipelineSettings,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            target_positions: Vec::new(),
            location: LocationPreferences::default(),
            salary: SalaryPreferences::default(),
            keywords: KeywordPreferences::default(),
            blacklisted_companies: Vec::new(),
            work_authorization: WorkAuthorization::default(),
            settings: PipelineSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationPreferences {
    #[serde(default)]
    pub preferred: Vec<String>,
    #[serde(default)]
    pub remote_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalaryPreferences {
    #[serde(default)]
    pub minimum: i64,
    #[serde(default)]
    pub target_min: Option<i64>,
    #[serde(default)]
    pub target_max: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordPreferences {
    #[serde(default)]
    pub reject_keywords: Vec<String>,
    #[serde(default)]
    pub prefer_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkAuthorization {
    #[serde(default)]
    pub needs_sponsorship: bool,
}

/// Thresholds and rate limits (§6.6), validated by [`super::loader::ConfigLoader::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: f64,
    #[serde(default = "default_max_per_day")]
    pub max_applications_per_day: i64,
    #[serde(default = "default_max_per_hour")]
    pub max_applications_per_hour: i64,
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_hours: i64,
    #[serde(default)]
    pub enabled_platforms: HashMap<String, bool>,
}

fn default_auto_apply_threshold() -> f64 {
    0.85
}
fn default_notify_threshold() -> f64 {
    0.60
}
fn default_max_per_day() -> i64 {
    20
}
fn default_max_per_hour() -> i64 {
    5
}
fn default_scrape_interval() -> i64 {
    6
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            auto_apply_threshold: default_auto_apply_threshold(),
            notify_threshold: default_notify_threshold(),
            max_applications_per_day: default_max_per_day(),
            max_applications_per_hour: default_max_per_hour(),
            scrape_interval_hours: default_scrape_interval(),
            enabled_platforms: HashMap::new(),
        }
    }
}

/// One achievement used by the tailor adapter to select résumé bullets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AchievementsConfig {
    #[serde(default)]
    pub items: Vec<Achievement>,
}

/// Platform credentials and service API keys (§6.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub platforms: HashMap<String, PlatformCredential>,
    #[serde(default)]
    pub services: HashMap<String, ServiceCredential>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformCredential {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCredential {
    pub api_key: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One `purpose -> {provider, model}` entry consumed by `ProviderRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderEntry {
    pub provider: Provider,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmProvidersConfig {
    #[serde(default)]
    pub active: HashMap<String, LlmProviderEntry>,
}
