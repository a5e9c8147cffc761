//! Question Generator - Phase 3 of the Scoring Engine
//!
//! Emits clarification questions for missing or low-confidence signals and
//! applies user answers back onto the derived intent. Only asks when the
//! answer materially affects eligibility or scoring; answer sets are closed.

use std::collections::HashMap;

use crate::models::catalog::{
    AvailabilityModel, CostProfile, OperatingModel, SecurityLevel, TimeCategory, Treatment,
};
use crate::models::context::ApplicationContext;
use crate::models::intent::{
    ClarificationOption, ClarificationQuestion, DerivedIntent, NetworkExposure, SignalConfidence,
};

/// Generates clarification questions and applies answers.
pub struct QuestionGenerator {
    /// Signals at or below this confidence get a question.
    question_threshold: SignalConfidence,
}

impl Default for QuestionGenerator {
    fn default() -> Self {
        Self { question_threshold: SignalConfidence::Low }
    }
}

impl QuestionGenerator {
    pub fn with_threshold(question_threshold: SignalConfidence) -> Self {
        Self { question_threshold }
    }

    /// Generate questions for the given context and intent, sorted so that
    /// required questions come first, then eligibility-affecting ones, then
    /// by stable id.
    pub fn generate_questions(
        &self,
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> Vec<ClarificationQuestion> {
        let mut questions = Vec::new();

        // Network exposure is always asked unless already answered.
        if !context.user_answers.contains_key("network_exposure") {
            questions.push(self.network_exposure_question(intent));
        }

        if context.app_overview.declared_treatment.is_none()
            && self.should_ask(intent.treatment.confidence)
        {
            questions.push(self.treatment_question(intent));
        }

        if context.app_overview.declared_time_category.is_none()
            && intent.time_category.confidence == SignalConfidence::Unknown
        {
            questions.push(self.time_category_question(intent));
        }

        if context.app_overview.availability_requirement.is_none()
            && self.should_ask(intent.availability_requirement.confidence)
        {
            questions.push(self.availability_question(intent));
        }

        if context.app_overview.compliance_requirements.is_empty()
            && self.should_ask(intent.security_requirement.confidence)
        {
            questions.push(self.security_question(intent));
        }

        if self.should_ask(intent.operational_maturity_estimate.confidence) {
            questions.push(self.operating_model_question(intent));
        }

        if self.should_ask(intent.cost_posture.confidence) {
            questions.push(self.cost_posture_question(intent));
        }

        questions.sort_by(|a, b| {
            (!a.required, !a.affects_eligibility, a.question_id.clone()).cmp(&(
                !b.required,
                !b.affects_eligibility,
                b.question_id.clone(),
            ))
        });

        questions
    }

    fn should_ask(&self, confidence: SignalConfidence) -> bool {
        confidence.rank() <= self.question_threshold.rank()
    }

    fn network_exposure_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "network_exposure".into(),
            dimension: "network_exposure".into(),
            question_text: "Is this application external-facing, internal-only, or mixed?".into(),
            options: vec![
                ClarificationOption::new(
                    NetworkExposure::External.as_str(),
                    "External (Internet-facing)",
                    "Publicly accessible from the internet (customers, partners, public APIs)",
                ),
                ClarificationOption::new(
                    NetworkExposure::Internal.as_str(),
                    "Internal Only",
                    "Only accessible within the corporate network (employees, internal systems)",
                ),
                ClarificationOption::new(
                    NetworkExposure::Mixed.as_str(),
                    "Mixed (Both)",
                    "Has both public-facing and internal-only components",
                ),
            ],
            required: true,
            affects_eligibility: true,
            current_inference: Some(intent.network_exposure.value.as_str().to_string()),
            inference_confidence: intent.network_exposure.confidence,
        }
    }

    fn treatment_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "treatment".into(),
            dimension: "treatment".into(),
            question_text: "What is the target migration strategy for this application?".into(),
            options: vec![
                ClarificationOption::new(
                    Treatment::Tolerate.as_str(),
                    "Tolerate (Keep as-is)",
                    "Maintain current state, minimal cloud involvement",
                ),
                ClarificationOption::new(
                    Treatment::Rehost.as_str(),
                    "Rehost (Lift & Shift)",
                    "Move to cloud VMs with minimal changes",
                ),
                ClarificationOption::new(
                    Treatment::Replatform.as_str(),
                    "Replatform (Lift & Optimize)",
                    "Move to PaaS services with minimal code changes",
                ),
                ClarificationOption::new(
                    Treatment::Refactor.as_str(),
                    "Refactor (Modernize)",
                    "Significant changes to leverage cloud-native capabilities",
                ),
            ],
            required: false,
            affects_eligibility: true,
            current_inference: Some(intent.treatment.value.as_str().to_string()),
            inference_confidence: intent.treatment.confidence,
        }
    }

    fn time_category_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "time_category".into(),
            dimension: "time_category".into(),
            question_text: "What is the strategic investment posture for this application?".into(),
            options: vec![
                ClarificationOption::new(
                    TimeCategory::Tolerate.as_str(),
                    "Tolerate",
                    "Maintain but don't invest - eventual phase out",
                ),
                ClarificationOption::new(
                    TimeCategory::Migrate.as_str(),
                    "Migrate",
                    "Move to cloud with measured investment",
                ),
                ClarificationOption::new(
                    TimeCategory::Invest.as_str(),
                    "Invest",
                    "Strategic asset - significant modernization investment",
                ),
                ClarificationOption::new(
                    TimeCategory::Eliminate.as_str(),
                    "Eliminate",
                    "Phase out and replace with an alternative",
                ),
            ],
            required: false,
            affects_eligibility: true,
            current_inference: Some(intent.time_category.value.as_str().to_string()),
            inference_confidence: intent.time_category.confidence,
        }
    }

    fn availability_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "availability".into(),
            dimension: "availability_requirement".into(),
            question_text: "What are the availability requirements for this application?".into(),
            options: vec![
                ClarificationOption::new(
                    AvailabilityModel::SingleRegion.as_str(),
                    "Single Region",
                    "Standard availability within one region",
                ),
                ClarificationOption::new(
                    AvailabilityModel::ZoneRedundant.as_str(),
                    "Zone Redundant",
                    "High availability across availability zones",
                ),
                ClarificationOption::new(
                    AvailabilityModel::MultiRegionActivePassive.as_str(),
                    "Multi-Region (Active/Passive)",
                    "Disaster recovery with failover to a secondary region",
                ),
                ClarificationOption::new(
                    AvailabilityModel::MultiRegionActiveActive.as_str(),
                    "Multi-Region (Active/Active)",
                    "Always-on global availability across regions",
                ),
            ],
            required: false,
            affects_eligibility: true,
            current_inference: Some(intent.availability_requirement.value.as_str().to_string()),
            inference_confidence: intent.availability_requirement.confidence,
        }
    }

    fn security_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "security_level".into(),
            dimension: "security_requirement".into(),
            question_text: "What security/compliance level is required for this application?"
                .into(),
            options: vec![
                ClarificationOption::new(
                    SecurityLevel::Basic.as_str(),
                    "Basic",
                    "Standard security practices, no specific compliance",
                ),
                ClarificationOption::new(
                    SecurityLevel::Enterprise.as_str(),
                    "Enterprise",
                    "Enterprise security (Zero Trust, private endpoints)",
                ),
                ClarificationOption::new(
                    SecurityLevel::Regulated.as_str(),
                    "Regulated",
                    "Industry compliance (SOC 2, ISO 27001, GDPR)",
                ),
                ClarificationOption::new(
                    SecurityLevel::HighlyRegulated.as_str(),
                    "Highly Regulated",
                    "Strict compliance (HIPAA, PCI-DSS, FedRAMP)",
                ),
            ],
            required: false,
            affects_eligibility: true,
            current_inference: Some(intent.security_requirement.value.as_str().to_string()),
            inference_confidence: intent.security_requirement.confidence,
        }
    }

    fn operating_model_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "operating_model".into(),
            dimension: "operational_maturity_estimate".into(),
            question_text: "What is your team's operational maturity level?".into(),
            options: vec![
                ClarificationOption::new(
                    OperatingModel::TraditionalIt.as_str(),
                    "Traditional IT",
                    "Manual deployments, ITIL processes, separate ops team",
                ),
                ClarificationOption::new(
                    OperatingModel::Transitional.as_str(),
                    "Transitional",
                    "Some automation, moving toward DevOps practices",
                ),
                ClarificationOption::new(
                    OperatingModel::Devops.as_str(),
                    "DevOps",
                    "CI/CD, infrastructure as code, team owns deployment",
                ),
                ClarificationOption::new(
                    OperatingModel::Sre.as_str(),
                    "SRE",
                    "SLO-driven, comprehensive observability, error budgets",
                ),
            ],
            required: false,
            affects_eligibility: true,
            current_inference: Some(
                intent.operational_maturity_estimate.value.as_str().to_string(),
            ),
            inference_confidence: intent.operational_maturity_estimate.confidence,
        }
    }

    fn cost_posture_question(&self, intent: &DerivedIntent) -> ClarificationQuestion {
        ClarificationQuestion {
            question_id: "cost_posture".into(),
            dimension: "cost_posture".into(),
            question_text: "What is your cost optimization priority for this application?".into(),
            options: vec![
                ClarificationOption::new(
                    CostProfile::CostMinimized.as_str(),
                    "Cost Minimized",
                    "Minimize spend, use consumption/spot pricing where possible",
                ),
                ClarificationOption::new(
                    CostProfile::Balanced.as_str(),
                    "Balanced",
                    "Balance cost and performance for production workloads",
                ),
                ClarificationOption::new(
                    CostProfile::ScaleOptimized.as_str(),
                    "Scale Optimized",
                    "Prioritize scalability and performance over cost",
                ),
                ClarificationOption::new(
                    CostProfile::InnovationFirst.as_str(),
                    "Innovation First",
                    "Use the latest services regardless of cost",
                ),
            ],
            required: false,
            affects_eligibility: false,
            current_inference: Some(intent.cost_posture.value.as_str().to_string()),
            inference_confidence: intent.cost_posture.confidence,
        }
    }

    /// Apply user answers, overriding the corresponding signals with high
    /// confidence. Unrecognized values are ignored. Idempotent.
    pub fn apply_answers(
        &self,
        _context: &ApplicationContext,
        intent: &DerivedIntent,
        answers: &HashMap<String, String>,
    ) -> DerivedIntent {
        let mut updated = intent.clone();

        if let Some(answer) = answers.get("treatment")
            && let Some(value) = Treatment::parse(answer)
        {
            updated.treatment.override_with(value, "treatment");
        }

        if let Some(answer) = answers.get("time_category")
            && let Some(value) = TimeCategory::parse(answer)
        {
            updated.time_category.override_with(value, "time category");
        }

        if let Some(answer) = answers.get("availability")
            && let Some(value) = AvailabilityModel::parse(answer)
        {
            updated.availability_requirement.override_with(value, "availability");
        }

        if let Some(answer) = answers.get("security_level")
            && let Some(value) = SecurityLevel::parse(answer)
        {
            updated.security_requirement.override_with(value, "security level");
        }

        if let Some(answer) = answers.get("operating_model")
            && let Some(value) = OperatingModel::parse(answer)
        {
            updated.operational_maturity_estimate.override_with(value, "operating model");
        }

        if let Some(answer) = answers.get("cost_posture")
            && let Some(value) = CostProfile::parse(answer)
        {
            updated.cost_posture.override_with(value, "cost posture");
        }

        if let Some(answer) = answers.get("network_exposure")
            && let Some(value) = NetworkExposure::parse(answer)
        {
            updated.network_exposure.override_with(value, "network exposure");
        }

        updated
    }
}
