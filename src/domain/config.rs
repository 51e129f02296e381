//! AgentConfig (§3, §4.1) — the active, versioned singleton per
//! `(name, environment)` driving model selection, search parameters, and
//! confidence computation.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMethod {
    Formula,
    Llm,
    Hybrid,
}

impl std::str::FromStr for ConfidenceMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "formula" => Ok(ConfidenceMethod::Formula),
            "llm" => Ok(ConfidenceMethod::Llm),
            "hybrid" => Ok(ConfidenceMethod::Hybrid),
            other => Err(format!("unknown confidence method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormulaWeights {
    pub similarity: f64,
    pub source: f64,
    pub length: f64,
}

impl FormulaWeights {
    pub fn sum(&self) -> f64 {
        self.similarity + self.source + self.length
    }
}

impl Default for FormulaWeights {
    fn default() -> Self {
        FormulaWeights { similarity: 0.8, source: 0.1, length: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub formula: f64,
    pub llm: f64,
}

impl HybridWeights {
    pub fn sum(&self) -> f64 {
        self.formula + self.llm
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        HybridWeights { formula: 0.6, llm: 0.4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfidenceSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub deadline_ms: u64,
}

impl Default for LlmConfidenceSettings {
    fn default() -> Self {
        LlmConfidenceSettings {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 16,
            deadline_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceCalculation {
    pub method: ConfidenceMethod,
    pub formula_weights: FormulaWeights,
    pub hybrid_weights: HybridWeights,
    pub llm_settings: LlmConfidenceSettings,
}

impl Default for ConfidenceCalculation {
    fn default() -> Self {
        ConfidenceCalculation {
            method: ConfidenceMethod::Formula,
            formula_weights: FormulaWeights::default(),
            hybrid_weights: HybridWeights::default(),
            llm_settings: LlmConfidenceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub escalation: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        ConfidenceThresholds { escalation: 0.95 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    pub similarity_threshold: f64,
    pub max_results: usize,
    pub hybrid_enabled: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings { similarity_threshold: 0.7, max_results: 5, hybrid_enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimits {
    pub requests_per_user_per_minute: u32,
    pub provider_concurrency: usize,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits { requests_per_user_per_minute: 60, provider_concurrency: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: Uuid,
    pub name: String,
    pub environment: String,
    pub version: u32,
    pub active: bool,
    pub confidence_thresholds: ConfidenceThresholds,
    pub model_settings: ModelSettings,
    pub search_settings: SearchSettings,
    pub feature_flags: HashMap<String, bool>,
    pub rate_limits: RateLimits,
    pub confidence_calculation: ConfidenceCalculation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentConfig {
    /// A compiled-in default used whenever the store is unreachable (§4.1
    /// failure model) and as the seed row for a fresh environment.
    pub fn default_for_environment(name: impl Into<String>, environment: impl Into<String>) -> Self {
        let now = Utc::now();
        AgentConfig {
            id: Uuid::new_v4(),
            name: name.into(),
            environment: environment.into(),
            version: 1,
            active: true,
            confidence_thresholds: ConfidenceThresholds::default(),
            model_settings: ModelSettings::default(),
            search_settings: SearchSettings::default(),
            feature_flags: HashMap::new(),
            rate_limits: RateLimits::default(),
            confidence_calculation: ConfidenceCalculation::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update to an `AgentConfig`, validated before being merged
/// (§4.1: weights must sum to 1±0.01, numeric ranges, closed enum sets).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub confidence_thresholds: Option<ConfidenceThresholds>,
    pub model_settings: Option<ModelSettings>,
    pub search_settings: Option<SearchSettings>,
    pub confidence_calculation: Option<ConfidenceCalculation>,
}

const ACCEPTED_PROVIDERS: &[&str] = &["openai", "anthropic", "azure", "google"];

fn weights_sum_ok(sum: f64) -> bool {
    (sum - 1.0).abs() <= 0.01
}

/// Apply and validate a patch, producing the next version. Returns
/// `Error::validation` (mapped to `InvalidConfig`/400 at the HTTP boundary)
/// on any violated invariant; never partially mutates the input.
pub fn apply_patch(current: &AgentConfig, patch: ConfigPatch) -> Result<AgentConfig> {
    let mut next = current.clone();

    if let Some(thresholds) = patch.confidence_thresholds {
        if !(0.0..=1.0).contains(&thresholds.escalation) {
            return Err(Error::validation("confidence_thresholds.escalation must be in [0,1]"));
        }
        next.confidence_thresholds = thresholds;
    }

    if let Some(model) = patch.model_settings {
        if !(0.0..=2.0).contains(&model.temperature) {
            return Err(Error::validation("model_settings.temperature must be in [0,2]"));
        }
        if !(10..=4096).contains(&model.max_tokens) {
            return Err(Error::validation("model_settings.max_tokens must be in [10,4096]"));
        }
        if !ACCEPTED_PROVIDERS.contains(&model.provider.as_str()) {
            return Err(Error::validation(format!("unknown provider: {}", model.provider)));
        }
        next.model_settings = model;
    }

    if let Some(search) = patch.search_settings {
        if !(0.0..=1.0).contains(&search.similarity_threshold) {
            return Err(Error::validation("search_settings.similarity_threshold must be in [0,1]"));
        }
        next.search_settings = search;
    }

    if let Some(confidence) = patch.confidence_calculation {
        if !weights_sum_ok(confidence.formula_weights.sum()) {
            return Err(Error::validation("formula weights must sum to 1 (±0.01)"));
        }
        if !weights_sum_ok(confidence.hybrid_weights.sum()) {
            return Err(Error::validation("hybrid weights must sum to 1 (±0.01)"));
        }
        if !ACCEPTED_PROVIDERS.contains(&confidence.llm_settings.provider.as_str()) {
            return Err(Error::validation(format!("unknown provider: {}", confidence.llm_settings.provider)));
        }
        if !(100..=10_000).contains(&confidence.llm_settings.deadline_ms) {
            return Err(Error::validation("llm_settings deadline must be in [100,10000]ms"));
        }
        next.confidence_calculation = confidence;
    }

    next.version = current.version + 1;
    next.updated_at = Utc::now();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let current = AgentConfig::default_for_environment("main", "production");
        let mut confidence = ConfidenceCalculation::default();
        confidence.formula_weights = FormulaWeights { similarity: 0.5, source: 0.5, length: 0.5 };
        let patch = ConfigPatch { confidence_calculation: Some(confidence), ..Default::default() };
        assert!(apply_patch(&current, patch).is_err());
    }

    #[test]
    fn accepts_weights_within_tolerance() {
        let current = AgentConfig::default_for_environment("main", "production");
        let mut confidence = ConfidenceCalculation::default();
        confidence.formula_weights = FormulaWeights { similarity: 0.8, source: 0.1, length: 0.105 };
        let patch = ConfigPatch { confidence_calculation: Some(confidence), ..Default::default() };
        let next = apply_patch(&current, patch).unwrap();
        assert_eq!(next.version, current.version + 1);
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let current = AgentConfig::default_for_environment("main", "production");
        let model = ModelSettings { temperature: 3.0, ..ModelSettings::default() };
        let patch = ConfigPatch { model_settings: Some(model), ..Default::default() };
        assert!(apply_patch(&current, patch).is_err());
    }
}
