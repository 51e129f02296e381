//! PII Anonymizer (§4.4). Regex-based detectors for syntactically regular
//! entity types, a denylist/gazetteer lookup for person/location, and a
//! strategy-driven right-to-left rewrite so span offsets stay valid.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Email,
    Phone,
    CreditCard,
    Ssn,
    Iban,
    Ip,
    Url,
    DateTime,
    Person,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiStrategy {
    Redact,
    Replace,
    Mask,
    Hash,
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub entity_type: EntityType,
    pub score: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct AnonymizeResult {
    pub text: String,
    pub entities: Vec<DetectedEntity>,
}

struct Detector {
    entity_type: EntityType,
    pattern: &'static Regex,
    confidence: f64,
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d{1,3}[\s.\-]?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}").unwrap());
static CREDIT_CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ \-]?){13,19}\b").unwrap());
static SSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static IBAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b").unwrap());
static IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static DATETIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2})?)?\b").unwrap());

fn detectors() -> Vec<Detector> {
    vec![
        Detector { entity_type: EntityType::Email, pattern: &EMAIL_RE, confidence: 0.98 },
        Detector { entity_type: EntityType::Url, pattern: &URL_RE, confidence: 0.97 },
        Detector { entity_type: EntityType::Iban, pattern: &IBAN_RE, confidence: 0.9 },
        Detector { entity_type: EntityType::Ssn, pattern: &SSN_RE, confidence: 0.9 },
        Detector { entity_type: EntityType::DateTime, pattern: &DATETIME_RE, confidence: 0.8 },
        Detector { entity_type: EntityType::Ip, pattern: &IP_RE, confidence: 0.85 },
        Detector { entity_type: EntityType::Phone, pattern: &PHONE_RE, confidence: 0.75 },
        Detector { entity_type: EntityType::CreditCard, pattern: &CREDIT_CARD_RE, confidence: 0.7 },
    ]
}

/// Default gazetteer for person/location detection (§4.4: a weaker, lower
/// default-confidence signal than the regex detectors above, reflecting
/// the lack of a statistical model).
pub struct Gazetteer {
    pub persons: Vec<String>,
    pub locations: Vec<String>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Gazetteer { persons: Vec::new(), locations: Vec::new() }
    }
}

struct RawMatch {
    entity_type: EntityType,
    score: f64,
    start: usize,
    end: usize,
}

fn luhn_valid(digits: &str) -> bool {
    let cleaned: Vec<u32> = digits.chars().filter(|c| c.is_ascii_digit()).filter_map(|c| c.to_digit(10)).collect();
    if cleaned.len() < 13 {
        return false;
    }
    let mut sum = 0u32;
    for (i, digit) in cleaned.iter().rev().enumerate() {
        let mut d = *digit;
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

fn detect(text: &str, gazetteer: &Gazetteer) -> Vec<RawMatch> {
    let mut matches = Vec::new();

    for detector in detectors() {
        for m in detector.pattern.find_iter(text) {
            if detector.entity_type == EntityType::CreditCard && !luhn_valid(m.as_str()) {
                continue;
            }
            matches.push(RawMatch { entity_type: detector.entity_type, score: detector.confidence, start: m.start(), end: m.end() });
        }
    }

    for name in &gazetteer.persons {
        for (start, _) in text.match_indices(name.as_str()) {
            matches.push(RawMatch { entity_type: EntityType::Person, score: 0.6, start, end: start + name.len() });
        }
    }
    for place in &gazetteer.locations {
        for (start, _) in text.match_indices(place.as_str()) {
            matches.push(RawMatch { entity_type: EntityType::Location, score: 0.55, start, end: start + place.len() });
        }
    }

    matches.sort_by_key(|m| (m.start, std::cmp::Reverse(m.end)));
    let mut deduped: Vec<RawMatch> = Vec::new();
    for m in matches {
        if deduped.iter().any(|existing| m.start < existing.end && existing.start < m.end) {
            continue;
        }
        deduped.push(m);
    }
    deduped
}

fn mask_preserving_separators(span: &str) -> String {
    span.chars().map(|c| if c.is_alphanumeric() { '*' } else { c }).collect()
}

fn hash_span(span: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(span.as_bytes());
    let digest = hasher.finalize();
    format!("#{:x}", digest)[..9].to_string()
}

/// Detect and rewrite PII in `text` (§4.4). Only spans scoring
/// `>= min_score` are transformed; rewriting proceeds right-to-left so
/// earlier byte offsets stay valid as later spans are replaced.
pub fn anonymize(
    text: &str,
    strategy: PiiStrategy,
    placeholder: &str,
    min_score: f64,
    gazetteer: &Gazetteer,
) -> AnonymizeResult {
    let mut matches = detect(text, gazetteer);
    matches.retain(|m| m.score >= min_score);
    matches.sort_by_key(|m| m.start);

    let entities: Vec<DetectedEntity> = matches
        .iter()
        .map(|m| DetectedEntity { entity_type: m.entity_type, score: m.score, start: m.start, end: m.end })
        .collect();

    let mut rewritten = text.to_string();
    let mut by_start_desc = matches;
    by_start_desc.sort_by_key(|m| std::cmp::Reverse(m.start));

    for m in by_start_desc {
        if strategy == PiiStrategy::Keep {
            continue;
        }
        let span = &rewritten[m.start..m.end];
        let replacement = match strategy {
            PiiStrategy::Redact => String::new(),
            PiiStrategy::Replace => placeholder.to_string(),
            PiiStrategy::Mask => mask_preserving_separators(span),
            PiiStrategy::Hash => hash_span(span),
            PiiStrategy::Keep => unreachable!(),
        };
        rewritten.replace_range(m.start..m.end, &replacement);
    }

    AnonymizeResult { text: rewritten, entities }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email_entirely() {
        let result = anonymize("contact me at a.b@example.com please", PiiStrategy::Redact, "[REDACTED]", 0.5, &Gazetteer::default());
        assert!(!result.text.contains("a.b@example.com"));
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].entity_type, EntityType::Email);
    }

    #[test]
    fn replace_uses_placeholder() {
        let result = anonymize("email: a@b.com", PiiStrategy::Replace, "[PII]", 0.5, &Gazetteer::default());
        assert!(result.text.contains("[PII]"));
    }

    #[test]
    fn mask_preserves_length_and_separators() {
        let result = anonymize("ip 10.0.0.1 here", PiiStrategy::Mask, "x", 0.5, &Gazetteer::default());
        assert!(result.text.contains("**.*.*.*"));
    }

    #[test]
    fn hash_is_deterministic() {
        let r1 = anonymize("a@b.com", PiiStrategy::Hash, "x", 0.5, &Gazetteer::default());
        let r2 = anonymize("a@b.com", PiiStrategy::Hash, "x", 0.5, &Gazetteer::default());
        assert_eq!(r1.text, r2.text);
    }

    #[test]
    fn keep_leaves_text_unchanged_but_records_entities() {
        let result = anonymize("a@b.com", PiiStrategy::Keep, "x", 0.5, &Gazetteer::default());
        assert_eq!(result.text, "a@b.com");
        assert_eq!(result.entities.len(), 1);
    }

    #[test]
    fn below_min_score_is_not_transformed() {
        let result = anonymize("call 555-123-4567 now", PiiStrategy::Redact, "x", 0.99, &Gazetteer::default());
        assert!(result.entities.is_empty());
        assert!(result.text.contains("555-123-4567"));
    }

    #[test]
    fn multiple_entities_rewrite_correctly_right_to_left() {
        let result = anonymize(
            "reach a@b.com or c@d.com for help",
            PiiStrategy::Replace,
            "[X]",
            0.5,
            &Gazetteer::default(),
        );
        assert_eq!(result.text.matches("[X]").count(), 2);
        assert_eq!(result.entities.len(), 2);
    }

    #[test]
    fn credit_card_requires_luhn_validity() {
        let result = anonymize("card 4111111111111111 is valid", PiiStrategy::Keep, "x", 0.5, &Gazetteer::default());
        assert!(result.entities.iter().any(|e| e.entity_type == EntityType::CreditCard));

        let result2 = anonymize("card 1234567812345678 is not valid", PiiStrategy::Keep, "x", 0.5, &Gazetteer::default());
        assert!(!result2.entities.iter().any(|e| e.entity_type == EntityType::CreditCard));
    }
}
