//! Free-form salary string parsing (§4.4.3).

use once_cell_lite::OnceCell;
use regex::Regex;

/// Lazily-compiled regex, avoiding a `once_cell` dependency the rest of the
/// workspace does not otherwise need.
mod once_cell_lite {
    use std::sync::OnceLock;

    pub struct OnceCell<T>(OnceLock<T>);

    impl<T> OnceCell<T> {
        pub const fn new() -> Self {
            Self(OnceLock::new())
        }

        pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
            self.0.get_or_init(f)
        }
    }
}

static RANGE_RE: OnceCell<Regex> = OnceCell::new();
static UP_TO_RE: OnceCell<Regex> = OnceCell::new();
static PLUS_RE: OnceCell<Regex> = OnceCell::new();
static SINGLE_RE: OnceCell<Regex> = OnceCell::new();

fn range_re() -> &'static Regex {
    RANGE_RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)k?\s*-\s*(\d+(?:\.\d+)?)k?").unwrap())
}

fn up_to_re() -> &'static Regex {
    UP_TO_RE.get_or_init(|| Regex::new(r"up\s+to\s+(\d+(?:\.\d+)?)k?").unwrap())
}

fn plus_re() -> &'static Regex {
    PLUS_RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)k?\s*\+").unwrap())
}

fn single_re() -> &'static Regex {
    SINGLE_RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)k?").unwrap())
}

/// Parses a free-form salary string into `(min, max)` whole-currency-unit
/// integers. Rules are evaluated in order: range, "up to N", "N+", single N,
/// else `(None, None)`. The `k` multiplier is decided once for the whole
/// cleaned string rather than per captured number, so `"150k-200"` yields
/// `(150_000, 200_000)` not `(150_000, 200)`.
pub fn parse_salary(input: &str) -> (Option<i64>, Option<i64>) {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return (None, None);
    }
    let has_k = cleaned.contains('k');

    if let Some(caps) = range_re().captures(&cleaned) {
        let min = to_units(&caps[1], has_k);
        let max = to_units(&caps[2], has_k);
        return (Some(min), Some(max));
    }

    if let Some(caps) = up_to_re().captures(&cleaned) {
        let max = to_units(&caps[1], has_k);
        return (None, Some(max));
    }

    if let Some(caps) = plus_re().captures(&cleaned) {
        let min = to_units(&caps[1], has_k);
        return (Some(min), None);
    }

    if let Some(caps) = single_re().captures(&cleaned) {
        let value = to_units(&caps[1], has_k);
        return (Some(value), Some(value));
    }

    (None, None)
}

/// Strips currency sigils and commas, trims, lowercases. Whitespace is kept
/// so `up_to_re`'s `\s+` still matches "up to".
fn clean(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | ','))
        .collect::<String>()
        .to_lowercase()
}

fn to_units(digits: &str, has_k_suffix: bool) -> i64 {
    let value: f64 = digits.parse().unwrap_or(0.0);
    let value = if has_k_suffix { value * 1000.0 } else { value };
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_with_k_suffix_on_both_bounds() {
        assert_eq!(parse_salary("$150k-200k"), (Some(150_000), Some(200_000)));
    }

    #[test]
    fn range_with_full_dollar_figures_and_commas() {
        assert_eq!(parse_salary("$150,000-$200,000"), (Some(150_000), Some(200_000)));
    }

    #[test]
    fn min_only_with_plus_suffix() {
        assert_eq!(parse_salary("$150k+"), (Some(150_000), None));
    }

    #[test]
    fn max_only_with_up_to_phrase() {
        assert_eq!(parse_salary("Up to $200k"), (None, Some(200_000)));
    }

    #[test]
    fn unparseable_text_yields_none_none() {
        assert_eq!(parse_salary("Competitive"), (None, None));
    }

    #[test]
    fn non_dollar_currency_sigil_is_stripped() {
        assert_eq!(parse_salary("£100k-150k"), (Some(100_000), Some(150_000)));
    }

    #[test]
    fn single_value_sets_min_equal_to_max() {
        assert_eq!(parse_salary("$120k"), (Some(120_000), Some(120_000)));
    }

    #[test]
    fn parse_is_idempotent_as_a_canonicalizer() {
        for input in ["$150k-200k", "$150k+", "Up to $200k", "Competitive", "£100k-150k"] {
            let first = parse_salary(input);
            let canonical = format_range(first);
            let second = parse_salary(&canonical);
            assert_eq!(first, second, "input={input}");
        }
    }

    fn format_range(range: (Option<i64>, Option<i64>)) -> String {
        match range {
            (Some(min), Some(max)) if min == max => format!("{min}"),
            (Some(min), Some(max)) => format!("{min}-{max}"),
            (Some(min), None) => format!("{min}+"),
            (None, Some(max)) => format!("up to {max}"),
            (None, None) => "competitive".to_string(),
        }
    }
}
