//! Typed, layered configuration for the candidate profile, preferences,
//! achievements, credentials, and LLM provider map.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    Achievement, AchievementsConfig, CredentialsConfig, Education, Experience, KeywordPreferences,
    LlmProviderEntry, LlmProvidersConfig, LocationPreferences, PersonalInfo, PipelineSettings,
    PlatformCredential, PreferencesConfig, Project, ResumeConfig, SalaryPreferences, ServiceCredential,
    WorkAuthorization,
};
