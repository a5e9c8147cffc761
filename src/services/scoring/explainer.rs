//! Explainer - Phase 6 of the Scoring Engine
//!
//! Assembles human-readable explanations, the recommendation summary, and
//! confidence banding. Transparency over brevity: every recommendation is
//! explainable, assumptions stay visible, unknown beats wrong.

use crate::models::intent::{DerivedIntent, SignalConfidence};
use crate::models::recommendation::{
    ArchitectureRecommendation, ConfidenceLevel, ExcludedArchitecture, RecommendationSummary,
};

/// Thresholds driving confidence banding.
#[derive(Debug, Clone)]
pub struct ConfidenceThresholds {
    pub high_score_threshold: f64,
    pub medium_score_threshold: f64,
    pub high_penalty_limit: f64,
    pub medium_penalty_limit: f64,
    pub high_max_low_signals: usize,
    pub medium_max_low_signals: usize,
    pub high_max_assumptions: usize,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_score_threshold: 70.0,
            medium_score_threshold: 50.0,
            high_penalty_limit: 0.10,
            // The penalty itself is capped at 0.25, so the medium band
            // tolerates the cap.
            medium_penalty_limit: 0.25,
            high_max_low_signals: 1,
            medium_max_low_signals: 4,
            high_max_assumptions: 3,
        }
    }
}

/// Generates explanations and summaries for scoring results.
pub struct RecommendationExplainer {
    thresholds: ConfidenceThresholds,
}

impl Default for RecommendationExplainer {
    fn default() -> Self {
        Self { thresholds: ConfidenceThresholds::default() }
    }
}

impl RecommendationExplainer {
    pub fn with_thresholds(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Fill fit/struggle summaries and rank context. The fit summary is
    /// built as a fresh list; matched dimensions are never mutated.
    pub fn enrich_recommendation(&self, rec: &mut ArchitectureRecommendation, rank: usize) {
        let mut fit_summary: Vec<String> = Vec::new();

        if rank == 1 {
            let lead = if rec.likelihood_score >= self.thresholds.high_score_threshold {
                "Strong match for application requirements"
            } else if rec.likelihood_score >= self.thresholds.medium_score_threshold {
                "Good match with some considerations"
            } else {
                "Possible match - review assumptions carefully"
            };
            fit_summary.push(lead.to_string());
        }

        fit_summary.extend(
            rec.matched_dimensions
                .iter()
                .take(5)
                .map(|m| format!("{}: {}", m.dimension, m.reasoning)),
        );

        let mut struggle_summary: Vec<String> = rec
            .mismatched_dimensions
            .iter()
            .take(3)
            .map(|m| format!("{}: {}", m.dimension, m.impact))
            .collect();

        if rec.confidence_penalty >= 0.15 {
            struggle_summary.push(format!(
                "Confidence reduced by {:.0}% due to assumptions",
                rec.confidence_penalty * 100.0
            ));
        }

        rec.fit_summary = fit_summary;
        rec.struggle_summary = struggle_summary;
    }

    /// Generate the result summary from enriched recommendations.
    pub fn generate_summary(
        &self,
        recommendations: &[ArchitectureRecommendation],
        _excluded: &[ExcludedArchitecture],
        intent: &DerivedIntent,
    ) -> RecommendationSummary {
        let clarifications_needed = Self::count_low_confidence_signals(intent);

        let Some(primary) = recommendations.first() else {
            return RecommendationSummary {
                primary_recommendation: None,
                primary_recommendation_id: None,
                confidence_level: ConfidenceLevel::Low,
                key_drivers: vec!["No eligible architectures found".into()],
                key_risks: vec![
                    "All architectures were excluded based on application characteristics".into(),
                ],
                assumptions_count: 0,
                clarifications_needed,
            };
        };

        let confidence_level = self.determine_confidence_level(primary, intent);
        let key_drivers = Self::extract_key_drivers(primary, intent);
        let key_risks = Self::extract_key_risks(primary, recommendations);
        let assumptions_count = recommendations
            .iter()
            .take(3)
            .map(|r| r.assumptions.len())
            .sum();

        RecommendationSummary {
            primary_recommendation: Some(primary.name.clone()),
            primary_recommendation_id: Some(primary.architecture_id.clone()),
            confidence_level,
            key_drivers,
            key_risks,
            assumptions_count,
            clarifications_needed,
        }
    }

    fn determine_confidence_level(
        &self,
        primary: &ArchitectureRecommendation,
        intent: &DerivedIntent,
    ) -> ConfidenceLevel {
        let t = &self.thresholds;
        let score = primary.likelihood_score;
        let penalty = primary.confidence_penalty;
        let low_signals = Self::count_low_confidence_signals(intent);

        if score >= t.high_score_threshold
            && penalty <= t.high_penalty_limit
            && low_signals <= t.high_max_low_signals
            && primary.assumptions.len() <= t.high_max_assumptions
        {
            return ConfidenceLevel::High;
        }

        if score >= t.medium_score_threshold
            && penalty <= t.medium_penalty_limit
            && low_signals <= t.medium_max_low_signals
        {
            return ConfidenceLevel::Medium;
        }

        ConfidenceLevel::Low
    }

    fn count_low_confidence_signals(intent: &DerivedIntent) -> usize {
        [
            intent.treatment.confidence,
            intent.time_category.confidence,
            intent.availability_requirement.confidence,
            intent.security_requirement.confidence,
            intent.operational_maturity_estimate.confidence,
            intent.likely_runtime_model.confidence,
            intent.modernization_depth_feasible.confidence,
            intent.cloud_native_feasibility.confidence,
            intent.cost_posture.confidence,
        ]
        .iter()
        .filter(|c| c.is_uncertain())
        .count()
    }

    fn extract_key_drivers(
        primary: &ArchitectureRecommendation,
        intent: &DerivedIntent,
    ) -> Vec<String> {
        let mut drivers = Vec::new();

        let treatment_label = if intent.treatment.confidence == SignalConfidence::High {
            format!("Treatment: {} (confirmed)", intent.treatment.value.as_str())
        } else {
            format!("Treatment: {} (inferred)", intent.treatment.value.as_str())
        };
        drivers.push(treatment_label);

        for matched in primary.matched_dimensions.iter().take(3) {
            drivers.push(format!("{}: {}", matched.dimension, matched.value));
        }

        for fit in primary.fit_summary.iter().take(2) {
            if !drivers.contains(fit) {
                drivers.push(fit.clone());
            }
        }

        drivers.truncate(5);
        drivers
    }

    fn extract_key_risks(
        primary: &ArchitectureRecommendation,
        recommendations: &[ArchitectureRecommendation],
    ) -> Vec<String> {
        let mut risks = Vec::new();

        for mismatch in primary.mismatched_dimensions.iter().take(2) {
            risks.push(format!("{}: {}", mismatch.dimension, mismatch.impact));
        }

        for assumption in primary.assumptions.iter().take(2) {
            risks.push(format!("Assumption: {}", assumption.assumption));
        }

        if let Some(runner_up) = recommendations.get(1) {
            let gap = primary.likelihood_score - runner_up.likelihood_score;
            if gap < 10.0 {
                risks.push(format!(
                    "Close alternative: {} ({:.0}%)",
                    runner_up.name, runner_up.likelihood_score
                ));
            }
        }

        if matches!(
            primary.catalog_quality.as_str(),
            "ai_suggested" | "example_only"
        ) {
            risks.push(format!(
                "Catalog quality: {} (review recommended)",
                primary.catalog_quality.as_str()
            ));
        }

        risks.truncate(4);
        risks
    }

    /// Human-readable summary of exclusions, grouped by reason type.
    pub fn format_exclusion_summary(excluded: &[ExcludedArchitecture]) -> String {
        if excluded.is_empty() {
            return "No architectures were excluded.".to_string();
        }

        let mut counts: std::collections::HashMap<&str, usize> = Default::default();
        for ex in excluded {
            for reason in &ex.reasons {
                *counts.entry(reason.reason_type.as_str()).or_default() += 1;
            }
        }

        let mut entries: Vec<(&str, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut lines = vec![format!("Excluded {} architectures:", excluded.len())];
        for (reason_type, count) in entries {
            lines.push(format!("  - {}: {} architectures", reason_type, count));
        }
        lines.join("\n")
    }
}
