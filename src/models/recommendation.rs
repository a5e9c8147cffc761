//! Recommendation Output Models
//!
//! Scoring dimensions, ranked recommendations, exclusion records, and the
//! complete scoring result returned to callers.

use serde::{Deserialize, Serialize};

use super::catalog::CatalogQuality;
use super::intent::{ClarificationQuestion, DerivedIntent, SignalConfidence};

// ============================================================================
// Per-Dimension Records
// ============================================================================

/// One scored dimension for one architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringDimension {
    pub dimension: String,
    pub weight: f64,
    /// Raw score expressed as a percentage in [0, 100].
    pub raw_score: f64,
    pub weighted_score: f64,
    pub reasoning: String,
    #[serde(default)]
    pub is_hard_gate: bool,
    #[serde(default = "default_true")]
    pub passed_gate: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedDimension {
    pub dimension: String,
    pub value: String,
    pub reasoning: String,
}

impl MatchedDimension {
    pub fn new(dimension: &str, value: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self { dimension: dimension.to_string(), value: value.into(), reasoning: reasoning.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MismatchedDimension {
    pub dimension: String,
    pub expected: String,
    pub actual: String,
    pub impact: String,
}

impl MismatchedDimension {
    pub fn new(
        dimension: &str,
        expected: impl Into<String>,
        actual: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        Self {
            dimension: dimension.to_string(),
            expected: expected.into(),
            actual: actual.into(),
            impact: impact.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssumptionMade {
    pub dimension: String,
    pub assumption: String,
    pub confidence: SignalConfidence,
    pub impact: String,
}

// ============================================================================
// Exclusions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionReasonDetail {
    pub reason_type: String,
    pub description: String,
    pub blocking_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedArchitecture {
    pub architecture_id: String,
    pub name: String,
    pub reasons: Vec<ExclusionReasonDetail>,
}

// ============================================================================
// Recommendations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureRecommendation {
    pub architecture_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_name: Option<String>,
    pub description: String,
    /// Final likelihood score in [0, 100].
    pub likelihood_score: f64,
    pub catalog_quality: CatalogQuality,
    pub scoring_dimensions: Vec<ScoringDimension>,
    pub matched_dimensions: Vec<MatchedDimension>,
    pub mismatched_dimensions: Vec<MismatchedDimension>,
    pub assumptions: Vec<AssumptionMade>,
    pub fit_summary: Vec<String>,
    pub struggle_summary: Vec<String>,
    pub core_services: Vec<String>,
    pub supporting_services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_url: Option<String>,
    pub browse_tags: Vec<String>,
    /// Cumulative uncertainty deduction in [0, 0.25].
    pub confidence_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_recommendation_id: Option<String>,
    pub confidence_level: ConfidenceLevel,
    pub key_drivers: Vec<String>,
    pub key_risks: Vec<String>,
    pub assumptions_count: usize,
    pub clarifications_needed: usize,
}

/// Complete output of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub application_name: String,
    pub catalog_version: String,
    pub catalog_architecture_count: usize,
    pub derived_intent: DerivedIntent,
    pub clarification_questions: Vec<ClarificationQuestion>,
    pub questions_pending: bool,
    /// Sorted descending by likelihood score.
    pub recommendations: Vec<ArchitectureRecommendation>,
    pub excluded: Vec<ExcludedArchitecture>,
    pub summary: RecommendationSummary,
    pub eligible_count: usize,
    pub excluded_count: usize,
    pub processing_warnings: Vec<String>,
}
