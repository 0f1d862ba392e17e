/// Lowercase, collapse internal whitespace runs to a single space, trim.
pub fn normalize_question(question: &str) -> String {
    let lower = question.to_lowercase();
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_string()
}

/// MD5 hex digest of the normalized form. Uniqueness is best-effort; the
/// cache store handles collisions by upserting on this hash.
pub fn hash_question(normalized: &str) -> String {
    format!("{:x}", md5::compute(normalized.as_bytes()))
}

/// Short questions (either side under 15 chars) require exact equality —
/// word-overlap scoring produces absurd matches at that length (e.g. "no"
/// vs "go" would otherwise score 0 and "list" vs "fist" would score high
/// relative to their size). Longer questions use Jaccard word overlap:
/// `|words(a) ∩ words(b)| / max(|words(a)|, |words(b)|)`.
pub fn fuzzy_match_score(a: &str, b: &str) -> f64 {
    if a.len() < 15 || b.len() < 15 {
        return if a == b { 1.0 } else { 0.0 };
    }

    let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let denom = words_a.len().max(words_b.len());
    intersection as f64 / denom as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_question("  How   MANY  merchants?  "), "how many merchants?");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_question("  How   MANY  merchants?  ");
        let twice = normalize_question(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn hash_is_a_function_of_normalized_form() {
        let a = normalize_question("How many merchants do we have?");
        let b = normalize_question("how many merchants do we have?  ");
        assert_eq!(a, b);
        assert_eq!(hash_question(&a), hash_question(&b));
    }

    #[test]
    fn short_strings_require_exact_equality() {
        assert_eq!(fuzzy_match_score("hi there", "hi there"), 1.0);
        assert_eq!(fuzzy_match_score("hi there", "hi, there"), 0.0);
    }

    #[test]
    fn long_strings_use_jaccard_overlap() {
        let a = "how many merchants do we currently have registered";
        let b = "how many merchants do we have registered right now";
        let score = fuzzy_match_score(a, b);
        assert!(score > 0.5 && score < 1.0, "score was {score}");
    }
}
