//! Ingests source records (one JSON array per platform) into the job
//! store, with two-level deduplication and source-priority resolution
//! (§4.4).

mod salary;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::hashing;
use crate::store::types::NewJob;
use crate::store::Store;

/// One entry of a scraped JSON array, before normalization.
#[derive(Debug, Clone, Deserialize)]
struct SourceRecord {
    title: Option<String>,
    company: Option<String>,
    url: Option<String>,
    description: Option<String>,
    salary: Option<String>,
    posted_date: Option<String>,
    location: Option<String>,
    remote_type: Option<String>,
    visa_sponsorship: Option<bool>,
    #[serde(default)]
    easy_apply: bool,
    external_id: Option<String>,
}

/// Per-source breakdown of [`ImportStats`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SourceStats {
    pub total: u64,
    pub inserted: u64,
    pub url_duplicates: u64,
    pub fuzzy_duplicates_skipped: u64,
    pub fuzzy_duplicates_updated: u64,
    pub invalid: u64,
}

/// Aggregate counters from one or more [`import_file`] calls.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportStats {
    pub total: u64,
    pub inserted: u64,
    pub url_duplicates: u64,
    pub fuzzy_duplicates_skipped: u64,
    pub fuzzy_duplicates_updated: u64,
    pub invalid: u64,
    pub by_source: HashMap<String, SourceStats>,
}

impl ImportStats {
    fn merge(&mut self, other: ImportStats) {
        self.total += other.total;
        self.inserted += other.inserted;
        self.url_duplicates += other.url_duplicates;
        self.fuzzy_duplicates_skipped += other.fuzzy_duplicates_skipped;
        self.fuzzy_duplicates_updated += other.fuzzy_duplicates_updated;
        self.invalid += other.invalid;
        for (source, stats) in other.by_source {
            let entry = self.by_source.entry(source).or_default();
            entry.total += stats.total;
            entry.inserted += stats.inserted;
            entry.url_duplicates += stats.url_duplicates;
            entry.fuzzy_duplicates_skipped += stats.fuzzy_duplicates_skipped;
            entry.fuzzy_duplicates_updated += stats.fuzzy_duplicates_updated;
            entry.invalid += stats.invalid;
        }
    }
}

/// Platforms whose postings are ATS-direct or otherwise text-complete.
const HIGH_PRIORITY_SOURCES: &[&str] = &["greenhouse", "lever", "ashby", "workable", "indeed", "wellfound"];
/// Visual-first platforms that tend to truncate descriptions.
const MEDIUM_PRIORITY_SOURCES: &[&str] = &["linkedin", "glassdoor"];

fn source_priority(source: &str) -> i32 {
    let lower = source.to_lowercase();
    if HIGH_PRIORITY_SOURCES.contains(&lower.as_str()) {
        1
    } else if MEDIUM_PRIORITY_SOURCES.contains(&lower.as_str()) {
        2
    } else {
        3
    }
}

/// Detects the platform from a scraped file's name, e.g.
/// `linkedin_scraped.json` -> `linkedin`, `acme_co.json` -> `acme_co`.
fn detect_source_from_filename(filename: &str) -> String {
    let lower = filename.to_lowercase();
    for known in ["linkedin", "indeed", "glassdoor", "wellfound"] {
        if lower.contains(known) {
            return known.to_string();
        }
    }
    lower.replace("_scraped.json", "").replace(".json", "")
}

/// Imports all jobs in the JSON array at `path`, tagging them with the
/// source detected from the filename.
pub fn import_file(store: &Store, path: impl AsRef<Path>) -> Result<ImportStats> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records: Vec<SourceRecord> = serde_json::from_str(&content)?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::invalid_record("import path has no file name"))?;
    let source = detect_source_from_filename(filename);

    tracing::info!(source = %source, path = %path.display(), jobs = records.len(), "importing source file");

    let mut stats = ImportStats::default();

    for record in records {
        stats.total += 1;
        let outcome = process_record(store, record, &source);
        let source_stats = stats.by_source.entry(source.clone()).or_default();
        source_stats.total += 1;
        match outcome {
            Ok(Outcome::Inserted) => {
                stats.inserted += 1;
                source_stats.inserted += 1;
            }
            Ok(Outcome::UrlDuplicate) => {
                stats.url_duplicates += 1;
                source_stats.url_duplicates += 1;
            }
            Ok(Outcome::FuzzyDuplicateSkipped) => {
                stats.fuzzy_duplicates_skipped += 1;
                source_stats.fuzzy_duplicates_skipped += 1;
            }
            Ok(Outcome::FuzzyDuplicateUpdated) => {
                stats.fuzzy_duplicates_updated += 1;
                source_stats.fuzzy_duplicates_updated += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, source = %source, "rejected invalid record");
                stats.invalid += 1;
                source_stats.invalid += 1;
            }
        }
    }

    tracing::info!(
        inserted = stats.inserted,
        url_duplicates = stats.url_duplicates,
        fuzzy_skipped = stats.fuzzy_duplicates_skipped,
        fuzzy_updated = stats.fuzzy_duplicates_updated,
        invalid = stats.invalid,
        "import complete"
    );

    Ok(stats)
}

/// Imports every file matching `glob_pattern` under `dir` (e.g.
/// `*_scraped.json`), isolating per-file failures — one malformed file is
/// logged and skipped without aborting the rest.
pub fn import_directory(store: &Store, dir: impl AsRef<Path>, glob_pattern: &str) -> Result<ImportStats> {
    let pattern = dir.as_ref().join(glob_pattern);
    let pattern = pattern.to_string_lossy().into_owned();

    let mut stats = ImportStats::default();
    let paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::invalid_record(format!("invalid glob pattern {pattern}: {e}")))?
        .filter_map(|entry| entry.ok())
        .collect();

    if paths.is_empty() {
        tracing::warn!(pattern = %pattern, "no files matched import glob");
        return Ok(stats);
    }

    for path in paths {
        match import_file(store, &path) {
            Ok(file_stats) => stats.merge(file_stats),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to import file, skipping"),
        }
    }

    Ok(stats)
}

#[derive(Debug)]
enum Outcome {
    Inserted,
    UrlDuplicate,
    FuzzyDuplicateSkipped,
    FuzzyDuplicateUpdated,
}

fn process_record(store: &Store, raw: SourceRecord, source: &str) -> Result<Outcome> {
    let record = normalize(raw, source)?;

    let duplicate = store.check_duplicate(Some(&record.platform), record.external_id.as_deref(), Some(&record.url))?;
    if duplicate.is_duplicate {
        return Ok(Outcome::UrlDuplicate);
    }

    if let Some(fuzzy_hash) = &record.fuzzy_hash {
        if let Some(existing_id) = find_by_fuzzy_hash(store, fuzzy_hash)? {
            let existing = store
                .get_job(existing_id)?
                .ok_or_else(|| Error::not_found(format!("job {existing_id}")))?;

            return Ok(match resolve_duplicate(existing.source_priority, record.source_priority, &existing.jd_raw, &record.jd_raw) {
                DuplicateResolution::Skip => Outcome::FuzzyDuplicateSkipped,
                DuplicateResolution::ReplaceAll => {
                    store.replace_job_content(existing_id, &record)?;
                    Outcome::FuzzyDuplicateUpdated
                }
                DuplicateResolution::UpdateDescription => {
                    store.update_job_description(existing_id, record.jd_raw.as_deref().unwrap_or(""), record.jd_markdown.as_deref())?;
                    Outcome::FuzzyDuplicateUpdated
                }
            });
        }
    }

    store.insert_job(&record)?;
    Ok(Outcome::Inserted)
}

enum DuplicateResolution {
    Skip,
    ReplaceAll,
    UpdateDescription,
}

/// Decides how to reconcile an incoming fuzzy-duplicate record against the
/// existing job (§4.4.2): the more trusted source wins outright; equal
/// priority keeps whichever description is longer; a less trusted source
/// never overwrites.
fn resolve_duplicate(existing_priority: i32, new_priority: i32, existing_desc: &Option<String>, new_desc: &Option<String>) -> DuplicateResolution {
    if new_priority < existing_priority {
        return DuplicateResolution::ReplaceAll;
    }
    if new_priority > existing_priority {
        return DuplicateResolution::Skip;
    }

    let existing_len = existing_desc.as_deref().unwrap_or("").len();
    let new_len = new_desc.as_deref().unwrap_or("").len();
    if new_len > existing_len {
        DuplicateResolution::UpdateDescription
    } else {
        DuplicateResolution::Skip
    }
}

fn find_by_fuzzy_hash(store: &Store, fuzzy_hash: &str) -> Result<Option<i64>> {
    store.job_id_by_fuzzy_hash(fuzzy_hash)
}

/// Validates and converts a raw source record into a [`NewJob`], rejecting
/// records with an empty title, company, or url (§4.4 Normalization).
fn normalize(raw: SourceRecord, source: &str) -> Result<NewJob> {
    let title = raw.title.unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(Error::invalid_record("job title is required"));
    }

    let company = raw.company.unwrap_or_default().trim().to_string();
    if company.is_empty() {
        return Err(Error::invalid_record("company is required"));
    }

    let url = raw.url.unwrap_or_default().trim().to_string();
    if url.is_empty() {
        return Err(Error::invalid_record("job url is required"));
    }

    let (salary_min, salary_max) = salary::parse_salary(raw.salary.as_deref().unwrap_or(""));
    let fuzzy_hash = hashing::fuzzy_hash(&company, &title);
    let scraped_at = raw
        .posted_date
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);

    Ok(NewJob {
        external_id: raw.external_id,
        platform: source.to_string(),
        url,
        fuzzy_hash: Some(fuzzy_hash),
        title,
        company,
        location: raw.location,
        salary_min,
        salary_max,
        salary_currency: "USD".to_string(),
        remote_type: raw.remote_type,
        visa_sponsorship: raw.visa_sponsorship,
        easy_apply: raw.easy_apply,
        jd_markdown: raw.description.clone(),
        jd_raw: raw.description,
        source: source.to_string(),
        source_priority: source_priority(source),
        scraped_at: Some(scraped_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, company: &str, url: &str) -> SourceRecord {
        SourceRecord {
            title: Some(title.to_string()),
            company: Some(company.to_string()),
            url: Some(url.to_string()),
            description: Some("A great role".to_string()),
            salary: Some("$150k-200k".to_string()),
            posted_date: None,
            location: Some("Remote".to_string()),
            remote_type: Some("remote".to_string()),
            visa_sponsorship: Some(true),
            easy_apply: false,
            external_id: None,
        }
    }

    #[test]
    fn rejects_blank_title_after_trim() {
        let store = Store::in_memory().unwrap();
        let err = process_record(&store, record("   ", "Acme", "https://x/1"), "greenhouse").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn rejects_missing_url() {
        let store = Store::in_memory().unwrap();
        let mut r = record("Engineer", "Acme", "");
        r.url = None;
        let err = process_record(&store, r, "greenhouse").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn inserts_new_job() {
        let store = Store::in_memory().unwrap();
        let outcome = process_record(&store, record("Engineer", "Acme", "https://x/1"), "greenhouse").unwrap();
        assert!(matches!(outcome, Outcome::Inserted));
    }

    #[test]
    fn url_duplicate_is_skipped() {
        let store = Store::in_memory().unwrap();
        process_record(&store, record("Engineer", "Acme", "https://x/1"), "greenhouse").unwrap();
        let outcome = process_record(&store, record("Engineer II", "Acme", "https://x/1"), "greenhouse").unwrap();
        assert!(matches!(outcome, Outcome::UrlDuplicate));
    }

    #[test]
    fn higher_priority_source_replaces_lower_priority_duplicate() {
        let store = Store::in_memory().unwrap();
        process_record(&store, record("Engineer", "Acme", "https://linkedin/1"), "linkedin").unwrap();
        let outcome = process_record(&store, record("Engineer", "Acme", "https://greenhouse/1"), "greenhouse").unwrap();
        assert!(matches!(outcome, Outcome::FuzzyDuplicateUpdated));
    }

    #[test]
    fn lower_priority_source_is_skipped() {
        let store = Store::in_memory().unwrap();
        process_record(&store, record("Engineer", "Acme", "https://greenhouse/1"), "greenhouse").unwrap();
        let outcome = process_record(&store, record("Engineer", "Acme", "https://linkedin/1"), "linkedin").unwrap();
        assert!(matches!(outcome, Outcome::FuzzyDuplicateSkipped));
    }

    #[test]
    fn source_detection_from_filename() {
        assert_eq!(detect_source_from_filename("linkedin_scraped.json"), "linkedin");
        assert_eq!(detect_source_from_filename("acme_co.json"), "acme_co");
    }

    #[test]
    fn source_priority_table() {
        assert_eq!(source_priority("Greenhouse"), 1);
        assert_eq!(source_priority("LinkedIn"), 2);
        assert_eq!(source_priority("some_aggregator"), 3);
    }
}
