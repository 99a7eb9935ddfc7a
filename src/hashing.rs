//! Digest helpers backing invariants 1 and 2 of the data model: a globally
//! unique `url_hash` and a `fuzzy_hash` over normalized `company+title`.

use sha2::{Digest, Sha256};

/// Hex digest of the raw URL, unique per job.
pub fn url_hash(url: &str) -> String {
    hex_sha256(url.as_bytes())
}

/// Hex digest of `lower(trim(company)) || '\0' || lower(trim(title))`. The
/// separator is not a character either field can contain after normalization
/// pipelines strip control bytes, so distinct `(company, title)` pairs never
/// collide across the boundary.
pub fn fuzzy_hash(company: &str, title: &str) -> String {
    let normalized = format!("{}\0{}", company.trim().to_lowercase(), title.trim().to_lowercase());
    hex_sha256(normalized.as_bytes())
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_hash_is_insensitive_to_case_and_whitespace() {
        let a = fuzzy_hash("OpenAI", "AI Engineer");
        let b = fuzzy_hash("  openai  ", "  ai engineer  ");
        assert_eq!(a, b);
    }

    #[test]
    fn fuzzy_hash_differs_for_different_titles() {
        let a = fuzzy_hash("OpenAI", "AI Engineer");
        let b = fuzzy_hash("OpenAI", "ML Engineer");
        assert_ne!(a, b);
    }

    #[test]
    fn url_hash_is_deterministic() {
        assert_eq!(url_hash("https://x/1"), url_hash("https://x/1"));
        assert_ne!(url_hash("https://x/1"), url_hash("https://x/2"));
    }
}
