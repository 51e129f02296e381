//! Confidence computation (§4.9.6): three methods selected by
//! `AgentConfig.confidence_calculation.method`, each producing a score in
//! `[0, 1]` plus a breakdown describing how it was reached.

use crate::domain::{ConfidenceCalculation, FormulaWeights, HybridWeights};
use crate::llm::{ChatMessage, ChatOptions, ContentBlock, LlmClient};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum ConfidenceBreakdown {
    Formula(FormulaBreakdown),
    Llm(LlmBreakdown),
    Hybrid(HybridBreakdown),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FormulaBreakdown {
    pub similarity_score: f64,
    pub source_boost: f64,
    pub length_boost: f64,
    pub high_quality_source_count: usize,
    pub response_length: usize,
    pub weights: FormulaWeights,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LlmBreakdown {
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_raw_response: String,
    pub prompt_version: Option<u32>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HybridBreakdown {
    pub formula_score: f64,
    pub llm_score: f64,
    pub formula_weight: f64,
    pub llm_weight: f64,
    pub formula_details: FormulaBreakdown,
    pub llm_details: Option<LlmBreakdown>,
    pub llm_unavailable: bool,
}

pub struct ConfidenceResult {
    pub score: f64,
    pub breakdown: ConfidenceBreakdown,
}

/// `sim_score` per §4.9.6: the top-3 retrieval scores weighted 0.6/0.3/0.1,
/// degrading gracefully as fewer chunks are present.
fn similarity_score(sorted_scores: &[f64]) -> f64 {
    match sorted_scores {
        [] => 0.0,
        [a] => *a,
        [a, b] => 0.7 * a + 0.3 * b,
        [a, b, c, ..] => 0.6 * a + 0.3 * b + 0.1 * c,
    }
}

fn source_boost(high_quality_count: usize) -> f64 {
    match high_quality_count {
        0 => 0.0,
        1 => 0.3,
        2 => 0.6,
        _ => 1.0,
    }
}

fn length_boost(response_len: usize) -> f64 {
    if response_len < 100 {
        0.0
    } else if response_len < 200 {
        0.5
    } else {
        1.0
    }
}

/// Compute the Formula method (§4.9.6). `chunk_scores` need not be
/// pre-sorted; this function sorts descending itself.
pub fn compute_formula(chunk_scores: &[f64], response: &str, weights: FormulaWeights) -> ConfidenceResult {
    if chunk_scores.is_empty() {
        return ConfidenceResult {
            score: 0.0,
            breakdown: ConfidenceBreakdown::Formula(FormulaBreakdown {
                similarity_score: 0.0,
                source_boost: 0.0,
                length_boost: 0.0,
                high_quality_source_count: 0,
                response_length: response.len(),
                weights,
            }),
        };
    }

    let mut sorted: Vec<f64> = chunk_scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let sim = similarity_score(&sorted);
    let high_quality_count = sorted.iter().filter(|s| **s > 0.75).count();
    let src_boost = source_boost(high_quality_count);
    let len_boost = length_boost(response.len());

    let final_score = (weights.similarity * sim + weights.source * src_boost + weights.length * len_boost).clamp(0.0, 1.0);

    ConfidenceResult {
        score: final_score,
        breakdown: ConfidenceBreakdown::Formula(FormulaBreakdown {
            similarity_score: sim,
            source_boost: src_boost,
            length_boost: len_boost,
            high_quality_source_count: high_quality_count,
            response_length: response.len(),
            weights,
        }),
    }
}

/// Parse a confidence float from an LLM reply: strict parse first, then the
/// first decimal-looking substring, clamped to `[0, 1]` (§4.9.6).
fn parse_confidence_reply(text: &str) -> Option<f64> {
    if let Ok(value) = text.trim().parse::<f64>() {
        return Some(value.clamp(0.0, 1.0));
    }
    let bytes = text.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start].is_ascii_digit() {
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
                end += 1;
            }
            if let Ok(value) = text[start..end].parse::<f64>() {
                return Some(value.clamp(0.0, 1.0));
            }
        }
    }
    None
}

/// Call the LLM to score confidence directly (§4.9.6 "LLM" method). Returns
/// `None` on any failure (timeout, parse, provider error); the caller falls
/// back to Formula and annotates the reason.
pub async fn compute_llm(
    client: &Arc<dyn LlmClient>,
    query: &str,
    context: &str,
    response: &str,
    provider: &str,
    model: &str,
    temperature: f64,
    max_tokens: u32,
    deadline: Duration,
) -> (Option<f64>, LlmBreakdown) {
    let truncated_context: String = context.chars().take(1000).collect();
    let truncated_response: String = response.chars().take(500).collect();

    let prompt = format!(
        "Rate your confidence in the following answer on a scale from 0 to 1.\n\
         Query: {query}\nContext: {truncated_context}\nResponse: {truncated_response}\n\
         Reply with only the number."
    );

    let options =
        ChatOptions { model: model.to_string(), temperature: temperature as f32, max_tokens: Some(max_tokens), tools: Vec::new(), deadline };
    let messages = vec![ChatMessage { role: "user", content: prompt }];

    let call = client.chat(&messages, &options);
    let outcome = tokio::time::timeout(deadline, call).await;

    let mut breakdown = LlmBreakdown {
        llm_provider: provider.to_string(),
        llm_model: model.to_string(),
        llm_raw_response: String::new(),
        prompt_version: None,
        fallback_reason: None,
    };

    match outcome {
        Err(_) => {
            breakdown.fallback_reason = Some("llm confidence call exceeded deadline".to_string());
            (None, breakdown)
        }
        Ok(Err(err)) => {
            breakdown.fallback_reason = Some(format!("llm confidence call failed: {err}"));
            (None, breakdown)
        }
        Ok(Ok(blocks)) => {
            let text: String = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            breakdown.llm_raw_response = text.clone();
            match parse_confidence_reply(&text) {
                Some(value) => (Some(value), breakdown),
                None => {
                    breakdown.fallback_reason = Some("could not parse a confidence value from the llm reply".to_string());
                    (None, breakdown)
                }
            }
        }
    }
}

/// Hybrid method (§4.9.6): always computes both, falls back to Formula alone
/// (with `llm_unavailable=true`) if the LLM leg failed.
pub fn combine_hybrid(formula: ConfidenceResult, llm_score: Option<f64>, llm_breakdown: LlmBreakdown, weights: HybridWeights) -> ConfidenceResult {
    let ConfidenceBreakdown::Formula(formula_details) = formula.breakdown else {
        unreachable!("compute_formula always returns ConfidenceBreakdown::Formula")
    };

    match llm_score {
        Some(llm) => {
            let score = (weights.formula * formula.score + weights.llm * llm).clamp(0.0, 1.0);
            ConfidenceResult {
                score,
                breakdown: ConfidenceBreakdown::Hybrid(HybridBreakdown {
                    formula_score: formula.score,
                    llm_score: llm,
                    formula_weight: weights.formula,
                    llm_weight: weights.llm,
                    formula_details,
                    llm_details: Some(llm_breakdown),
                    llm_unavailable: false,
                }),
            }
        }
        None => ConfidenceResult {
            score: formula.score,
            breakdown: ConfidenceBreakdown::Hybrid(HybridBreakdown {
                formula_score: formula.score,
                llm_score: 0.0,
                formula_weight: weights.formula,
                llm_weight: weights.llm,
                formula_details,
                llm_details: Some(llm_breakdown),
                llm_unavailable: true,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_matches_scenario_one_high_quality_retrieval() {
        let weights = FormulaWeights { similarity: 0.80, source: 0.10, length: 0.10 };
        let response = "x".repeat(260);
        let result = compute_formula(&[0.92, 0.85, 0.78], &response, weights);

        let ConfidenceBreakdown::Formula(breakdown) = &result.breakdown else { panic!("expected formula breakdown") };
        assert!((breakdown.similarity_score - 0.885).abs() < 1e-9);
        assert_eq!(breakdown.source_boost, 1.0);
        assert_eq!(breakdown.length_boost, 1.0);
        assert!((result.score - 0.908).abs() < 1e-9);
    }

    #[test]
    fn formula_matches_scenario_two_empty_retrieval() {
        let weights = FormulaWeights::default();
        let result = compute_formula(&[], "any response", weights);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn hybrid_falls_back_to_formula_when_llm_unavailable_matches_scenario_three() {
        let formula = ConfidenceResult {
            score: 0.7,
            breakdown: ConfidenceBreakdown::Formula(FormulaBreakdown {
                similarity_score: 0.7,
                source_boost: 0.0,
                length_boost: 0.0,
                high_quality_source_count: 0,
                response_length: 10,
                weights: FormulaWeights::default(),
            }),
        };
        let llm_breakdown = LlmBreakdown {
            llm_provider: "openai".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_raw_response: String::new(),
            prompt_version: None,
            fallback_reason: Some("llm confidence call exceeded deadline".to_string()),
        };
        let weights = HybridWeights { formula: 0.6, llm: 0.4 };
        let result = combine_hybrid(formula, None, llm_breakdown, weights);

        assert_eq!(result.score, 0.7);
        let ConfidenceBreakdown::Hybrid(breakdown) = &result.breakdown else { panic!("expected hybrid breakdown") };
        assert!(breakdown.llm_unavailable);
    }

    #[test]
    fn parses_plain_and_embedded_confidence_values() {
        assert_eq!(parse_confidence_reply("0.87"), Some(0.87));
        assert_eq!(parse_confidence_reply("confidence: 0.42 out of 1"), Some(0.42));
        assert_eq!(parse_confidence_reply("no numbers here"), None);
    }

    #[test]
    fn source_boost_thresholds() {
        assert_eq!(source_boost(0), 0.0);
        assert_eq!(source_boost(1), 0.3);
        assert_eq!(source_boost(2), 0.6);
        assert_eq!(source_boost(5), 1.0);
    }
}
