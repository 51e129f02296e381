//! Shared token estimation, generalized from the teacher SDK's
//! `context::estimate_tokens` (character-based approximation, 1 token ≈ 4
//! characters) so the chunker (§4.5) and the session history window (§4.10)
//! use one calibration instead of two independently-tuned estimators.

/// Estimate tokens for a single piece of text using the char/4 approximation.
pub fn estimate_text_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Estimate tokens for a list of `(role, content)` history entries, with the
/// same per-message and per-conversation overhead the teacher's estimator
/// applies to its `Message` list.
pub fn estimate_history_tokens(entries: &[(String, String)]) -> usize {
    if entries.is_empty() {
        return 0;
    }

    let mut total_chars = 0;
    for (_, content) in entries {
        total_chars += 8; // role formatting overhead
        total_chars += content.len();
    }
    total_chars += 16; // conversation-level overhead

    (total_chars + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(estimate_history_tokens(&[]), 0);
    }

    #[test]
    fn text_estimate_rounds_up() {
        assert_eq!(estimate_text_tokens(""), 0);
        assert_eq!(estimate_text_tokens("abcd"), 1);
        assert_eq!(estimate_text_tokens("abcde"), 2);
    }

    #[test]
    fn history_includes_overhead() {
        let entries = vec![("user".to_string(), "hi".to_string())];
        let tokens = estimate_history_tokens(&entries);
        assert!(tokens >= 1 && tokens <= 10);
    }
}
