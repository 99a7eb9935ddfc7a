//! Layered TOML + environment-variable configuration loading (§6.6, §9
//! non-goal leakage: the core never parses markdown, only these typed
//! structs).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::types::{AchievementsConfig, CredentialsConfig, LlmProvidersConfig, PreferencesConfig, ResumeConfig};

/// Loads and caches the five configuration documents from a directory of
/// TOML files (`resume.toml`, `preferences.toml`, `achievements.toml`,
/// `credentials.toml`, `llm_providers.toml`), with environment-variable
/// overlay for secrets that should not live on disk in plaintext.
pub struct ConfigLoader {
    config_dir: PathBuf,
    resume: once_cell_lite::OnceCell<ResumeConfig>,
    preferences: once_cell_lite::OnceCell<PreferencesConfig>,
    achievements: once_cell_lite::OnceCell<AchievementsConfig>,
    credentials: once_cell_lite::OnceCell<CredentialsConfig>,
    llm_providers: once_cell_lite::OnceCell<LlmProvidersConfig>,
}

mod once_cell_lite {
    use std::cell::OnceCell as StdOnceCell;

    /// Single-threaded lazy cell; the loader is used from one async task at
    /// pipeline startup, never concurrently.
    pub struct OnceCell<T>(StdOnceCell<T>);

    impl<T> OnceCell<T> {
        pub fn new() -> Self {
            Self(StdOnceCell::new())
        }

        pub fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
            if let Some(v) = self.0.get() {
                return Ok(v);
            }
            let value = f()?;
            // get_or_init-style race is impossible under single-threaded use;
            // `set` cannot fail here.
            let _ = self.0.set(value);
            Ok(self.0.get().expect("value was just set"))
        }
    }
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            resume: once_cell_lite::OnceCell::new(),
            preferences: once_cell_lite::OnceCell::new(),
            achievements: once_cell_lite::OnceCell::new(),
            credentials: once_cell_lite::OnceCell::new(),
            llm_providers: once_cell_lite::OnceCell::new(),
        }
    }

    pub fn resume(&self) -> Result<&ResumeConfig> {
        self.resume.get_or_try_init(|| load_toml(&self.config_dir, "resume.toml"))
    }

    pub fn preferences(&self) -> Result<&PreferencesConfig> {
        self.preferences
            .get_or_try_init(|| load_toml(&self.config_dir, "preferences.toml"))
    }

    pub fn achievements(&self) -> Result<&AchievementsConfig> {
        self.achievements
            .get_or_try_init(|| load_toml(&self.config_dir, "achievements.toml"))
    }

    /// Unlike the other documents, missing credentials are fatal only when a
    /// caller actually needs them — `credentials.toml` commonly does not
    /// exist in dry-run/import-only invocations.
    pub fn credentials(&self) -> Result<&CredentialsConfig> {
        self.credentials.get_or_try_init(|| {
            let path = self.config_dir.join("credentials.toml");
            if !path.exists() {
                return Err(Error::config(format!(
                    "credentials file not found: {} (copy credentials.example.toml)",
                    path.display()
                )));
            }
            load_toml(&self.config_dir, "credentials.toml")
        })
    }

    /// Falls back to a built-in default mapping (both purposes on a single
    /// cheap Anthropic model) when `llm_providers.toml` is absent, per §4.3.
    pub fn llm_providers(&self) -> Result<&LlmProvidersConfig> {
        self.llm_providers.get_or_try_init(|| {
            let path = self.config_dir.join("llm_providers.toml");
            if !path.exists() {
                tracing::warn!(path = %path.display(), "llm_providers.toml not found, using built-in default");
                return Ok(default_llm_providers());
            }
            load_toml(&self.config_dir, "llm_providers.toml")
        })
    }

    /// Validates the loaded preferences and resume against the invariants
    /// the original markdown config validator enforced, adapted to this
    /// config's typed shape.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();

        match self.resume() {
            Ok(resume) => {
                if resume.personal_info.name.trim().is_empty() {
                    errors.push("resume: name is required".to_string());
                }
                if !resume.personal_info.email.contains('@') {
                    errors.push("resume: email must be a valid address".to_string());
                }
            }
            Err(e) => errors.push(format!("resume: {e}")),
        }

        match self.preferences() {
            Ok(prefs) => {
                if prefs.target_positions.is_empty() {
                    errors.push("preferences: at least one target position required".to_string());
                }
                if !(0.0..=1.0).contains(&prefs.settings.notify_threshold) {
                    errors.push("preferences: notify_threshold must be between 0.0 and 1.0".to_string());
                }
                if !(0.0..=1.0).contains(&prefs.settings.auto_apply_threshold) {
                    errors.push("preferences: auto_apply_threshold must be between 0.0 and 1.0".to_string());
                }
                if prefs.settings.notify_threshold > prefs.settings.auto_apply_threshold {
                    errors.push("preferences: notify_threshold must be <= auto_apply_threshold".to_string());
                }
                if prefs.settings.max_applications_per_day <= 0 {
                    errors.push("preferences: max_applications_per_day must be positive".to_string());
                }
            }
            Err(e) => errors.push(format!("preferences: {e}")),
        }

        match self.achievements() {
            Ok(achievements) => {
                if achievements.items.is_empty() {
                    errors.push("achievements: at least one achievement required".to_string());
                }
            }
            Err(e) => errors.push(format!("achievements: {e}")),
        }

        Ok(errors)
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(dir: &Path, filename: &str) -> Result<T> {
    let path = dir.join(filename);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&content).map_err(Error::from)
}

fn default_llm_providers() -> LlmProvidersConfig {
    use crate::llm::Provider;
    use crate::config::types::LlmProviderEntry;

    let mut active = HashMap::new();
    active.insert(
        "filter".to_string(),
        LlmProviderEntry {
            provider: Provider::Anthropic,
            model: "claude-3-5-haiku-20241022".to_string(),
        },
    );
    active.insert(
        "tailor".to_string(),
        LlmProviderEntry {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
        },
    );
    LlmProvidersConfig { active }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn loads_resume_and_caches_on_repeat_calls() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "resume.toml",
            r#"
            [personal_info]
            name = "Ada Lovelace"
            email = "ada@example.com"
            "#,
        );
        let loader = ConfigLoader::new(dir.path());
        let first = loader.resume().unwrap();
        assert_eq!(first.personal_info.name, "Ada Lovelace");
        let second = loader.resume().unwrap();
        assert_eq!(first as *const _, second as *const _);
    }

    #[test]
    fn missing_resume_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        assert!(matches!(loader.resume(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_llm_providers_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let providers = loader.llm_providers().unwrap();
        assert!(providers.active.contains_key("filter"));
        assert!(providers.active.contains_key("tailor"));
    }

    #[test]
    fn validate_flags_missing_target_positions() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "resume.toml",
            r#"
            [personal_info]
            name = "Ada Lovelace"
            email = "ada@example.com"
            "#,
        );
        write_file(dir.path(), "preferences.toml", "");
        write_file(dir.path(), "achievements.toml", "");
        let loader = ConfigLoader::new(dir.path());
        let errors = loader.validate().unwrap();
        assert!(errors.iter().any(|e| e.contains("target position")));
        assert!(errors.iter().any(|e| e.contains("achievement")));
    }
}
