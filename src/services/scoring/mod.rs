//! Architecture Scoring Engine
//!
//! Deterministic six-phase pipeline over a versioned catalog:
//! normalize -> derive intent -> generate questions -> filter eligibility ->
//! score -> explain.

pub mod eligibility_filter;
pub mod explainer;
pub mod intent_deriver;
pub mod normalizer;
pub mod question_generator;
pub mod scorer;

#[cfg(test)]
mod tests;

pub use eligibility_filter::EligibilityFilter;
pub use explainer::{ConfidenceThresholds, RecommendationExplainer};
pub use intent_deriver::IntentDeriver;
pub use normalizer::{ContextNormalizer, parse_context};
pub use question_generator::QuestionGenerator;
pub use scorer::{ArchitectureScorer, ScoringWeights};

use std::collections::HashMap;

use crate::models::catalog::ArchitectureCatalog;
use crate::models::context::ApplicationContext;
use crate::models::recommendation::ScoringResult;

/// Orchestrates the full scoring pipeline against a loaded catalog.
pub struct ScoringEngine {
    catalog: ArchitectureCatalog,
    questions: QuestionGenerator,
    filter: EligibilityFilter,
    scorer: ArchitectureScorer,
    explainer: RecommendationExplainer,
}

impl ScoringEngine {
    pub fn new(catalog: ArchitectureCatalog) -> Self {
        Self {
            catalog,
            questions: QuestionGenerator::default(),
            filter: EligibilityFilter::default(),
            scorer: ArchitectureScorer::default(),
            explainer: RecommendationExplainer::default(),
        }
    }

    pub fn catalog(&self) -> &ArchitectureCatalog {
        &self.catalog
    }

    /// Run the pipeline for a normalized application context. Answers found
    /// in `context.user_answers` are applied on top of the derived intent.
    pub fn score_context(&self, context: &ApplicationContext) -> ScoringResult {
        self.score_with_answers(context, &context.user_answers)
    }

    /// Run the pipeline, applying the given answers over the derived intent.
    pub fn score_with_answers(
        &self,
        context: &ApplicationContext,
        answers: &HashMap<String, String>,
    ) -> ScoringResult {
        let mut warnings = Vec::new();

        let intent = IntentDeriver::derive(context);
        let intent = if answers.is_empty() {
            intent
        } else {
            self.questions.apply_answers(context, &intent, answers)
        };

        let questions = self.questions.generate_questions(context, &intent);

        let (eligible, excluded) =
            self.filter.filter(&self.catalog.architectures, context, &intent);
        if eligible.is_empty() {
            warnings.push("All catalog entries were excluded by eligibility rules".to_string());
        }

        let mut recommendations = self.scorer.score(&eligible, context, &intent);
        for (i, rec) in recommendations.iter_mut().enumerate() {
            self.explainer.enrich_recommendation(rec, i + 1);
        }

        let summary = self.explainer.generate_summary(&recommendations, &excluded, &intent);

        tracing::debug!(
            "Scored '{}': {} eligible, {} excluded, {} questions pending",
            context.app_overview.application_name,
            recommendations.len(),
            excluded.len(),
            questions.len()
        );

        ScoringResult {
            application_name: context.app_overview.application_name.clone(),
            catalog_version: self.catalog.version.clone(),
            catalog_architecture_count: self.catalog.len(),
            derived_intent: intent,
            questions_pending: !questions.is_empty(),
            clarification_questions: questions,
            eligible_count: recommendations.len(),
            excluded_count: excluded.len(),
            recommendations,
            excluded,
            summary,
            processing_warnings: warnings,
        }
    }
}
