//! Scorer - Phase 5 of the Scoring Engine
//!
//! Scores eligible architectures across ten weighted dimensions and applies
//! catalog-quality weighting and a confidence penalty. Treatment alignment
//! is a hard gate; an entry reaching the scorer with a treatment mismatch
//! indicates a filtering bug and scores zero on that dimension.

use crate::models::catalog::{ArchitectureEntry, AvailabilityModel, CatalogQuality, RuntimeModel};
use crate::models::context::{ApplicationContext, BusinessCriticality, CompatibilityStatus};
use crate::models::intent::{DerivedIntent, SignalConfidence};
use crate::models::recommendation::{
    ArchitectureRecommendation, AssumptionMade, MatchedDimension, MismatchedDimension,
    ScoringDimension,
};

/// Weights for scoring dimensions.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub treatment_alignment: f64,
    pub runtime_model_compatibility: f64,
    pub platform_compatibility: f64,
    pub app_mod_recommended: f64,
    pub service_overlap: f64,
    pub browse_tag_overlap: f64,
    pub availability_alignment: f64,
    pub operating_model_fit: f64,
    pub complexity_tolerance: f64,
    pub cost_posture_alignment: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            treatment_alignment: 0.20,
            runtime_model_compatibility: 0.10,
            platform_compatibility: 0.15,
            app_mod_recommended: 0.10,
            service_overlap: 0.10,
            browse_tag_overlap: 0.05,
            availability_alignment: 0.10,
            operating_model_fit: 0.08,
            complexity_tolerance: 0.07,
            cost_posture_alignment: 0.05,
        }
    }
}

/// Per-dimension scratch passed through the scoring helpers.
struct DimensionLog {
    matched: Vec<MatchedDimension>,
    mismatched: Vec<MismatchedDimension>,
    assumptions: Vec<AssumptionMade>,
}

/// Scores eligible architectures against application context.
pub struct ArchitectureScorer {
    weights: ScoringWeights,
}

impl Default for ArchitectureScorer {
    fn default() -> Self {
        Self { weights: ScoringWeights::default() }
    }
}

impl ArchitectureScorer {
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Weight applied to the final score per catalog quality.
    pub fn quality_weight(quality: CatalogQuality) -> f64 {
        match quality {
            CatalogQuality::Curated => 1.0,
            CatalogQuality::AiEnriched => 0.95,
            CatalogQuality::AiSuggested => 0.90,
            CatalogQuality::ExampleOnly => 0.85,
        }
    }

    /// Penalty contribution per signal confidence.
    pub fn confidence_penalty(confidence: SignalConfidence) -> f64 {
        match confidence {
            SignalConfidence::High => 0.0,
            SignalConfidence::Medium => 0.05,
            SignalConfidence::Low => 0.15,
            SignalConfidence::Unknown => 0.25,
        }
    }

    /// Score eligible architectures; returns recommendations sorted
    /// descending by likelihood score.
    pub fn score(
        &self,
        architectures: &[&ArchitectureEntry],
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> Vec<ArchitectureRecommendation> {
        let mut recommendations: Vec<ArchitectureRecommendation> = architectures
            .iter()
            .map(|arch| self.score_architecture(arch, context, intent))
            .collect();

        recommendations.sort_by(|a, b| {
            b.likelihood_score
                .partial_cmp(&a.likelihood_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.architecture_id.cmp(&b.architecture_id))
        });

        recommendations
    }

    fn score_architecture(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> ArchitectureRecommendation {
        let mut log = DimensionLog {
            matched: Vec::new(),
            mismatched: Vec::new(),
            assumptions: Vec::new(),
        };

        let dimensions = vec![
            self.score_treatment_alignment(arch, intent, &mut log),
            self.score_runtime_model(arch, intent, &mut log),
            self.score_platform_compatibility(arch, context, &mut log),
            self.score_app_mod_recommended(arch, context, &mut log),
            self.score_service_overlap(arch, context, &mut log),
            self.score_browse_tag_overlap(arch, context, &mut log),
            self.score_availability_alignment(arch, intent, &mut log),
            self.score_operating_model_fit(arch, intent, &mut log),
            self.score_complexity_tolerance(arch, context, &mut log),
            self.score_cost_posture(arch, intent, &mut log),
        ];

        let total_weighted: f64 = dimensions.iter().map(|d| d.weighted_score).sum();
        let total_weight: f64 = dimensions.iter().map(|d| d.weight).sum();
        let base_score = if total_weight > 0.0 {
            total_weighted / total_weight * 100.0
        } else {
            0.0
        };

        let quality_adjusted = base_score * Self::quality_weight(arch.catalog_quality);
        let penalty = self.calculate_confidence_penalty(intent, &log.assumptions);
        let final_score = (quality_adjusted - penalty * 100.0).max(0.0);

        let diagram_url = arch.diagram_assets.first().cloned();

        ArchitectureRecommendation {
            architecture_id: arch.architecture_id.clone(),
            name: arch.name.clone(),
            pattern_name: arch.pattern_name.clone(),
            description: arch.description.clone(),
            likelihood_score: (final_score * 10.0).round() / 10.0,
            catalog_quality: arch.catalog_quality,
            scoring_dimensions: dimensions,
            matched_dimensions: log.matched,
            mismatched_dimensions: log.mismatched,
            assumptions: log.assumptions,
            fit_summary: Vec::new(),
            struggle_summary: Vec::new(),
            core_services: arch.core_services.clone(),
            supporting_services: arch.supporting_services.clone(),
            catalog_url: arch.catalog_url.clone(),
            diagram_url,
            browse_tags: arch.browse_tags.clone(),
            confidence_penalty: penalty,
        }
    }

    fn dimension(
        name: &str,
        weight: f64,
        score: f64,
        reasoning: String,
    ) -> ScoringDimension {
        ScoringDimension {
            dimension: name.to_string(),
            weight,
            raw_score: score * 100.0,
            weighted_score: score * weight,
            reasoning,
            is_hard_gate: false,
            passed_gate: true,
        }
    }

    // ------------------------------------------------------------------
    // Dimensions
    // ------------------------------------------------------------------

    fn score_treatment_alignment(
        &self,
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let required = intent.treatment.value;
        let supported = &arch.supported_treatments;
        let weight = self.weights.treatment_alignment;

        // Hard gate: the eligibility filter removes mismatches, so hitting
        // this branch means the entry bypassed filtering.
        if !supported.is_empty() && !supported.contains(&required) {
            tracing::warn!(
                "Architecture '{}' reached the scorer with unsupported treatment {}",
                arch.architecture_id,
                required.as_str()
            );
            return ScoringDimension {
                dimension: "treatment_alignment".into(),
                weight,
                raw_score: 0.0,
                weighted_score: 0.0,
                reasoning: format!(
                    "Treatment {} not in supported: {:?}",
                    required.as_str(),
                    supported.iter().map(|t| t.as_str()).collect::<Vec<_>>()
                ),
                is_hard_gate: true,
                passed_gate: false,
            };
        }

        let score = if supported.contains(&required) {
            log.matched.push(MatchedDimension::new(
                "Treatment",
                required.as_str(),
                format!("Supports {} treatment", required.as_str()),
            ));
            1.0
        } else {
            // No treatment restrictions: neutral score
            if intent.treatment.confidence.is_uncertain() {
                log.assumptions.push(AssumptionMade {
                    dimension: "treatment".into(),
                    assumption: format!("Assumed treatment: {}", required.as_str()),
                    confidence: intent.treatment.confidence,
                    impact: "Treatment affects architecture selection".into(),
                });
            }
            0.7
        };

        ScoringDimension {
            dimension: "treatment_alignment".into(),
            weight,
            raw_score: score * 100.0,
            weighted_score: score * weight,
            reasoning: format!("Treatment: {}", required.as_str()),
            is_hard_gate: true,
            passed_gate: true,
        }
    }

    fn score_runtime_model(
        &self,
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let app_runtime = intent.likely_runtime_model.value;
        let arch_runtimes = &arch.expected_runtime_models;

        let score = if arch_runtimes.contains(&app_runtime) {
            log.matched.push(MatchedDimension::new(
                "Runtime Model",
                app_runtime.as_str(),
                "Application runtime matches architecture expectation",
            ));
            1.0
        } else if arch_runtimes.contains(&RuntimeModel::Mixed)
            || arch_runtimes.contains(&RuntimeModel::Unknown)
        {
            // Flexible architecture
            0.7
        } else if app_runtime == RuntimeModel::Unknown {
            log.assumptions.push(AssumptionMade {
                dimension: "runtime_model".into(),
                assumption: "Runtime model unknown; assuming compatible".into(),
                confidence: SignalConfidence::Unknown,
                impact: "May need validation".into(),
            });
            0.5
        } else {
            log.mismatched.push(MismatchedDimension::new(
                "Runtime Model",
                arch_runtimes.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "),
                app_runtime.as_str(),
                "Architecture designed for a different runtime pattern",
            ));
            0.3
        };

        Self::dimension(
            "runtime_model_compatibility",
            self.weights.runtime_model_compatibility,
            score,
            format!(
                "App: {}, Arch: {:?}",
                app_runtime.as_str(),
                arch_runtimes.iter().map(|r| r.as_str()).collect::<Vec<_>>()
            ),
        )
    }

    fn score_platform_compatibility(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let weight = self.weights.platform_compatibility;

        let Some(app_mod) = &context.app_mod_results else {
            log.assumptions.push(AssumptionMade {
                dimension: "platform_compatibility".into(),
                assumption: "No modernization assessment; assuming general compatibility".into(),
                confidence: SignalConfidence::Unknown,
                impact: "Platform fit not validated".into(),
            });
            return Self::dimension(
                "platform_compatibility",
                weight,
                0.5,
                "No modernization assessment available".into(),
            );
        };

        let arch_services = arch
            .core_services
            .iter()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let platform_keywords = ["app service", "kubernetes", "container", "aks", "aca"];

        let mut scores = Vec::new();
        for pc in &app_mod.platform_compatibility {
            let platform_lower = pc.platform.to_lowercase();
            let relevant = platform_keywords
                .iter()
                .any(|kw| platform_lower.contains(kw) && arch_services.contains(kw));
            if !relevant {
                continue;
            }
            match pc.status {
                CompatibilityStatus::FullySupported => {
                    scores.push(1.0);
                    log.matched.push(MatchedDimension::new(
                        "Platform Compatibility",
                        pc.platform.clone(),
                        format!("Fully supported: {}", pc.platform),
                    ));
                },
                CompatibilityStatus::Supported => scores.push(0.9),
                CompatibilityStatus::SupportedWithChanges => scores.push(0.7),
                CompatibilityStatus::SupportedWithRefactor => {
                    scores.push(0.5);
                    log.mismatched.push(MismatchedDimension::new(
                        "Platform Compatibility",
                        "Supported",
                        format!("{}: Requires refactor", pc.platform),
                        "Additional effort required",
                    ));
                },
                CompatibilityStatus::NotSupported => {},
            }
        }

        let relevant_count = scores.len();
        let avg = if scores.is_empty() {
            // Neutral when no relevant platforms matched
            0.6
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        Self::dimension(
            "platform_compatibility",
            weight,
            avg,
            format!("Modernization assessment: {} relevant platform(s)", relevant_count),
        )
    }

    fn score_app_mod_recommended(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let weight = self.weights.app_mod_recommended;

        let recommended = context
            .app_mod_results
            .as_ref()
            .map(|m| m.recommended_targets.as_slice())
            .unwrap_or_default();
        if recommended.is_empty() {
            return Self::dimension(
                "app_mod_recommended",
                weight,
                0.5,
                "No specific recommendations from the modernization assessment".into(),
            );
        }

        let arch_services: Vec<String> =
            arch.core_services.iter().map(|s| s.to_lowercase()).collect();

        let mut match_count = 0usize;
        for rec in recommended {
            let rec_lower = rec.to_lowercase();
            if arch_services
                .iter()
                .any(|svc| svc.contains(&rec_lower) || rec_lower.contains(svc.as_str()))
            {
                match_count += 1;
                log.matched.push(MatchedDimension::new(
                    "Recommended Target",
                    rec_lower.clone(),
                    format!("Recommended target: {}", rec_lower),
                ));
            }
        }

        let score = if match_count > 0 {
            (0.7 + match_count as f64 * 0.15).min(1.0)
        } else {
            0.4
        };

        Self::dimension(
            "app_mod_recommended",
            weight,
            score,
            format!("Matches {} of {} recommended targets", match_count, recommended.len()),
        )
    }

    fn score_service_overlap(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let weight = self.weights.service_overlap;
        let approved = context.approved_services.all_approved_services();

        if approved.is_empty() {
            return Self::dimension(
                "service_overlap",
                weight,
                0.5,
                "No approved services specified".into(),
            );
        }

        let approved_lower: Vec<String> = approved.iter().map(|s| s.to_lowercase()).collect();
        let arch_services: Vec<String> =
            arch.all_services().map(|s| s.to_lowercase()).collect();

        // Bidirectional substring overlap
        let matches = approved_lower
            .iter()
            .filter(|a| {
                arch_services
                    .iter()
                    .any(|s| s.contains(a.as_str()) || a.contains(s.as_str()))
            })
            .count();
        let total = approved_lower.len();
        let ratio = (matches as f64 / total as f64).min(1.0);

        if ratio >= 0.5 {
            log.matched.push(MatchedDimension::new(
                "Service Overlap",
                format!("{}/{} services", matches, total),
                "Good alignment with approved services",
            ));
        }

        let score = 0.3 + ratio * 0.7;

        Self::dimension(
            "service_overlap",
            weight,
            score,
            format!("{} of {} approved services match", matches, total),
        )
    }

    fn score_browse_tag_overlap(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let weight = self.weights.browse_tag_overlap;
        let relevant_tags = Self::infer_relevant_tags(context);

        if relevant_tags.is_empty() {
            return Self::dimension(
                "browse_tag_overlap",
                weight,
                0.5,
                "No relevant tags inferred from context".into(),
            );
        }

        let arch_tags: Vec<String> = arch.browse_tags.iter().map(|t| t.to_lowercase()).collect();
        let matching: Vec<&String> =
            relevant_tags.iter().filter(|t| arch_tags.contains(t)).collect();
        let matches = matching.len();

        if matches > 0 {
            log.matched.push(MatchedDimension::new(
                "Browse Tags",
                format!("{} tags", matches),
                format!("Matching tags: {:?}", matching),
            ));
        }

        let score = 0.4 + (matches as f64 / relevant_tags.len() as f64).min(1.0) * 0.6;

        Self::dimension(
            "browse_tag_overlap",
            weight,
            score,
            format!("{} relevant browse tags match", matches),
        )
    }

    /// Infer relevant browse tags from the application context.
    fn infer_relevant_tags(context: &ApplicationContext) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let tech = &context.detected_technology;

        match tech.primary_runtime.as_deref() {
            Some("Java") => tags.push("java".into()),
            Some(".NET") => {
                tags.push("dotnet".into());
                tags.push(".net".into());
            },
            _ => {},
        }
        if tech.database_present {
            tags.push("databases".into());
        }
        if tech.messaging_present {
            tags.push("messaging".into());
        }
        if context
            .app_mod_results
            .as_ref()
            .is_some_and(|m| m.container_ready == Some(true))
        {
            tags.push("containers".into());
        }

        let app_type = context
            .app_overview
            .app_type
            .as_deref()
            .unwrap_or("")
            .to_lowercase();
        if app_type.contains("web") {
            tags.push("web".into());
        }
        if app_type.contains("api") {
            tags.push("api".into());
        }

        tags
    }

    fn score_availability_alignment(
        &self,
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let required = intent.availability_requirement.value;
        let supported = &arch.availability_models;

        let score = if supported.contains(&required) {
            log.matched.push(MatchedDimension::new(
                "Availability",
                required.as_str(),
                format!("Supports {}", required.as_str()),
            ));
            1.0
        } else if Self::availability_exceeds(supported, required) {
            0.9
        } else {
            log.mismatched.push(MismatchedDimension::new(
                "Availability",
                required.as_str(),
                supported.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", "),
                "May need architecture modifications for required availability",
            ));
            0.4
        };

        if intent.availability_requirement.confidence.is_uncertain() {
            log.assumptions.push(AssumptionMade {
                dimension: "availability".into(),
                assumption: format!("Assumed availability requirement: {}", required.as_str()),
                confidence: intent.availability_requirement.confidence,
                impact: "Availability affects architecture complexity".into(),
            });
        }

        Self::dimension(
            "availability_alignment",
            self.weights.availability_alignment,
            score,
            format!(
                "Required: {}, Supported: {:?}",
                required.as_str(),
                supported.iter().map(|a| a.as_str()).collect::<Vec<_>>()
            ),
        )
    }

    fn availability_exceeds(supported: &[AvailabilityModel], required: AvailabilityModel) -> bool {
        let max_supported = supported.iter().map(|a| a.rank()).max().unwrap_or(0);
        max_supported > required.rank()
    }

    fn score_operating_model_fit(
        &self,
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let app_maturity = intent.operational_maturity_estimate.value;
        let arch_required = arch.operating_model_required;

        let app_level = app_maturity.rank();
        let arch_level = arch_required.rank();

        let score = if app_level >= arch_level {
            log.matched.push(MatchedDimension::new(
                "Operating Model",
                app_maturity.as_str(),
                format!("Meets {} requirement", arch_required.as_str()),
            ));
            if app_level == arch_level { 1.0 } else { 0.9 }
        } else {
            let gap = (arch_level - app_level) as f64;
            log.mismatched.push(MismatchedDimension::new(
                "Operating Model",
                arch_required.as_str(),
                app_maturity.as_str(),
                format!("Team maturity gap of {} level(s)", gap as u8),
            ));
            (1.0 - gap * 0.3).max(0.2)
        };

        if intent.operational_maturity_estimate.confidence.is_uncertain() {
            log.assumptions.push(AssumptionMade {
                dimension: "operating_model".into(),
                assumption: format!("Assumed team maturity: {}", app_maturity.as_str()),
                confidence: intent.operational_maturity_estimate.confidence,
                impact: "May affect implementation success".into(),
            });
        }

        Self::dimension(
            "operating_model_fit",
            self.weights.operating_model_fit,
            score,
            format!("App: {}, Required: {}", app_maturity.as_str(), arch_required.as_str()),
        )
    }

    fn score_complexity_tolerance(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let impl_complexity = arch.complexity.implementation;
        let ops_complexity = arch.complexity.operations;
        let criticality = context.app_overview.business_criticality;

        // Business criticality sets the complexity tolerance
        let tolerance_level: u8 = match criticality {
            BusinessCriticality::Low => 0,
            BusinessCriticality::Medium => 1,
            BusinessCriticality::High | BusinessCriticality::MissionCritical => 2,
        };
        let max_arch_complexity = arch.complexity.max_level().rank();

        let score = if max_arch_complexity <= tolerance_level {
            log.matched.push(MatchedDimension::new(
                "Complexity",
                format!("{}/{}", impl_complexity.as_str(), ops_complexity.as_str()),
                "Complexity within tolerance",
            ));
            1.0
        } else {
            let gap = (max_arch_complexity - tolerance_level) as f64;
            log.mismatched.push(MismatchedDimension::new(
                "Complexity",
                format!("at most level {}", tolerance_level),
                format!("{}/{}", impl_complexity.as_str(), ops_complexity.as_str()),
                "Architecture may be over-engineered for the use case",
            ));
            (1.0 - gap * 0.35).max(0.3)
        };

        Self::dimension(
            "complexity_tolerance",
            self.weights.complexity_tolerance,
            score,
            format!(
                "Impl: {}, Ops: {}, Tolerance level: {}",
                impl_complexity.as_str(),
                ops_complexity.as_str(),
                tolerance_level
            ),
        )
    }

    fn score_cost_posture(
        &self,
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
        log: &mut DimensionLog,
    ) -> ScoringDimension {
        let required = intent.cost_posture.value;
        let arch_profile = arch.cost_profile;

        let diff = (arch_profile.rank() as i32 - required.rank() as i32).abs();
        let score = match diff {
            0 => {
                log.matched.push(MatchedDimension::new(
                    "Cost Profile",
                    required.as_str(),
                    "Cost profile aligned",
                ));
                1.0
            },
            1 => 0.8,
            _ => {
                log.mismatched.push(MismatchedDimension::new(
                    "Cost Profile",
                    required.as_str(),
                    arch_profile.as_str(),
                    "Cost characteristics may not align with expectations",
                ));
                0.5
            },
        };

        if intent.cost_posture.confidence.is_uncertain() {
            log.assumptions.push(AssumptionMade {
                dimension: "cost_posture".into(),
                assumption: format!("Assumed cost posture: {}", required.as_str()),
                confidence: intent.cost_posture.confidence,
                impact: "May affect budget planning".into(),
            });
        }

        Self::dimension(
            "cost_posture_alignment",
            self.weights.cost_posture_alignment,
            score,
            format!("Required: {}, Architecture: {}", required.as_str(), arch_profile.as_str()),
        )
    }

    /// Cumulative penalty from low-confidence signals plus 0.02 per
    /// assumption, capped at 0.25.
    fn calculate_confidence_penalty(
        &self,
        intent: &DerivedIntent,
        assumptions: &[AssumptionMade],
    ) -> f64 {
        let mut penalty = 0.0;

        let confidences = [
            intent.treatment.confidence,
            intent.time_category.confidence,
            intent.availability_requirement.confidence,
            intent.security_requirement.confidence,
            intent.operational_maturity_estimate.confidence,
            intent.likely_runtime_model.confidence,
        ];
        for confidence in confidences {
            penalty += Self::confidence_penalty(confidence);
        }

        penalty += assumptions.len() as f64 * 0.02;

        penalty.min(0.25)
    }
}
