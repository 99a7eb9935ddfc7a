//! Title-similarity duplicate detection within the same company, consulted
//! by the Scorer before an LLM call is issued (§4.7).

use crate::error::Result;
use crate::store::{Job, Store};

const SENIORITY_WORDS: &[&str] = &["senior", "junior", "lead", "principal", "staff", "the", "a", "an"];

const REPLACEMENTS: &[(&str, &str)] = &[
    ("artificial intelligence", "ai"),
    ("machine learning", "ml"),
    ("software development engineer in test", "sdet"),
    ("quality assurance", "qa"),
    ("full stack", "fullstack"),
    ("full-stack", "fullstack"),
    ("backend", "back-end"),
    ("frontend", "front-end"),
];

/// Detects near-duplicate postings at the same company by comparing
/// normalized titles, so "AI Engineer" and "Artificial Intelligence
/// Engineer" at the same employer collapse into one scoring pass.
pub struct SemanticDedup;

impl SemanticDedup {
    /// Looks at up to 10 recent non-rejected jobs at `job.company` and
    /// returns the id of the first one whose title is similar to `job`'s.
    pub fn check(store: &Store, job: &Job) -> Result<Option<i64>> {
        let candidates = store.recent_non_rejected_by_company(&job.company, Some(job.id))?;
        let normalized_new = normalize_title(&job.title);

        for existing in &candidates {
            let normalized_existing = normalize_title(&existing.title);
            if titles_similar(&normalized_new, &normalized_existing) {
                return Ok(Some(existing.id));
            }
        }

        Ok(None)
    }
}

/// Expands common abbreviations and strips seniority/stopword tokens so
/// "Senior AI Engineer" and "AI Engineer" compare equal.
fn normalize_title(title: &str) -> String {
    let mut normalized = title.to_lowercase();
    for (old, new) in REPLACEMENTS {
        normalized = normalized.replace(old, new);
    }

    normalized
        .split_whitespace()
        .filter(|w| !SENIORITY_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact match, substring containment, or at least 80% word overlap against
/// the smaller title's word count.
fn titles_similar(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }

    let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }

    let overlap = words_a.intersection(&words_b).count();
    let min_words = words_a.len().min(words_b.len());
    overlap as f64 >= 0.8 * min_words as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::NewJob;

    fn insert(store: &Store, company: &str, title: &str) -> i64 {
        store
            .insert_job(&NewJob {
                platform: "greenhouse".into(),
                url: format!("https://example.com/{company}/{title}"),
                title: title.into(),
                company: company.into(),
                source: "greenhouse".into(),
                source_priority: 1,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn abbreviation_expansion_matches() {
        let store = Store::in_memory().unwrap();
        insert(&store, "OpenAI", "Artificial Intelligence Engineer");
        let new_id = insert(&store, "OpenAI", "AI Engineer");
        let job = store.get_job(new_id).unwrap().unwrap();
        assert!(SemanticDedup::check(&store, &job).unwrap().is_some());
    }

    #[test]
    fn seniority_prefix_is_ignored() {
        let store = Store::in_memory().unwrap();
        insert(&store, "Acme", "Backend Engineer");
        let new_id = insert(&store, "Acme", "Senior Backend Engineer");
        let job = store.get_job(new_id).unwrap().unwrap();
        assert!(SemanticDedup::check(&store, &job).unwrap().is_some());
    }

    #[test]
    fn different_company_does_not_match() {
        let store = Store::in_memory().unwrap();
        insert(&store, "OpenAI", "AI Engineer");
        let new_id = insert(&store, "Anthropic", "AI Engineer");
        let job = store.get_job(new_id).unwrap().unwrap();
        assert!(SemanticDedup::check(&store, &job).unwrap().is_none());
    }

    #[test]
    fn unrelated_titles_do_not_match() {
        let store = Store::in_memory().unwrap();
        insert(&store, "Acme", "Marketing Manager");
        let new_id = insert(&store, "Acme", "Backend Engineer");
        let job = store.get_job(new_id).unwrap().unwrap();
        assert!(SemanticDedup::check(&store, &job).unwrap().is_none());
    }
}
