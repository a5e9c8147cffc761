//! Scoring Engine Test Suite
//!
//! End-to-end pipeline scenarios plus the invariants every run must hold.

use std::collections::HashMap;

use super::*;
use crate::models::catalog::*;
use crate::models::context::*;
use crate::models::intent::SignalConfidence;
use crate::models::recommendation::ConfidenceLevel;

// ============================================================================
// Fixtures
// ============================================================================

fn entry(id: &str) -> ArchitectureEntry {
    serde_json::from_value(serde_json::json!({
        "architecture_id": id,
        "name": format!("Architecture {}", id),
        "description": format!("Reference architecture {}", id),
    }))
    .unwrap()
}

fn windows_server(name: &str) -> RawServerDetail {
    RawServerDetail {
        server_name: Some(name.to_string()),
        operating_system: Some("Windows Server 2019".to_string()),
        cpu_usage: Some(45.0),
        memory_usage: Some(55.0),
        cores: Some(4),
        memory_gb: Some(16.0),
        ..Default::default()
    }
}

/// Context for a declared-rehost Windows app on four servers, no
/// modernization assessment.
fn rehost_context() -> ApplicationContext {
    let raw = RawContextFile {
        app_overview: OneOrMany::One(RawAppOverview {
            application: "Ledger".to_string(),
            app_type: Some("Web Application".to_string()),
            business_criticality: Some("Medium".to_string()),
            treatment: Some("rehost".to_string()),
            ..Default::default()
        }),
        server_details: vec![
            windows_server("vm-01"),
            windows_server("vm-02"),
            windows_server("vm-03"),
            windows_server("vm-04"),
        ],
        detected_technology_running: vec![".NET Framework 4.8".to_string(), "IIS 10".to_string()],
        ..Default::default()
    };
    ContextNormalizer::normalize(raw).unwrap()
}

fn rehost_catalog() -> ArchitectureCatalog {
    let mut a = entry("arch-a");
    a.supported_treatments = vec![Treatment::Rehost];
    a.catalog_quality = CatalogQuality::Curated;
    a.expected_runtime_models = vec![RuntimeModel::NTier];
    a.availability_models = vec![AvailabilityModel::SingleRegion, AvailabilityModel::ZoneRedundant];

    let mut b = entry("arch-b");
    b.supported_treatments = vec![Treatment::Refactor];
    b.catalog_quality = CatalogQuality::Curated;

    let mut c = entry("arch-c");
    c.supported_treatments = vec![Treatment::Rehost, Treatment::Refactor];
    c.catalog_quality = CatalogQuality::ExampleOnly;
    c.not_suitable_for = vec![NotSuitableFor::SingleVmWorkloads];
    c.availability_models = vec![AvailabilityModel::ZoneRedundant];

    ArchitectureCatalog {
        version: "1.2.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![a, b, c],
    }
}

// ============================================================================
// Scenario: rehost-only app, default config
// ============================================================================

#[test]
fn test_rehost_only_app_with_default_config() {
    let engine = ScoringEngine::new(rehost_catalog());
    // Answer the generated questions so no answerable low-confidence
    // signals remain.
    let mut context = rehost_context();
    context.user_answers.extend([
        ("network_exposure".to_string(), "external".to_string()),
        ("security_level".to_string(), "basic".to_string()),
        ("operating_model".to_string(), "devops".to_string()),
        ("cost_posture".to_string(), "balanced".to_string()),
    ]);
    let result = engine.score_context(&context);

    // (b) excluded for treatment mismatch
    assert_eq!(result.excluded.len(), 1);
    let excluded = &result.excluded[0];
    assert_eq!(excluded.architecture_id, "arch-b");
    assert_eq!(excluded.reasons[0].reason_type, "treatment_mismatch");

    // (c) eligible: single_vm_workloads does not apply with 4 servers
    let ids: Vec<&str> = result
        .recommendations
        .iter()
        .map(|r| r.architecture_id.as_str())
        .collect();
    assert!(ids.contains(&"arch-c"));

    // Sorted (a) before (c): same dimensions but curated outranks example_only
    assert_eq!(ids[0], "arch-a");
    assert_eq!(result.eligible_count, 2);
    assert_eq!(result.excluded_count, 1);

    // Declared treatment means no treatment question and decent confidence
    assert!(
        result
            .clarification_questions
            .iter()
            .all(|q| q.question_id != "treatment")
    );
    assert!(matches!(
        result.summary.confidence_level,
        ConfidenceLevel::Medium | ConfidenceLevel::High
    ));
}

// ============================================================================
// Scenario: network exposure always asked
// ============================================================================

#[test]
fn test_network_exposure_question_always_first_and_required() {
    let engine = ScoringEngine::new(rehost_catalog());
    let context = rehost_context();
    let result = engine.score_context(&context);

    let first = result
        .clarification_questions
        .first()
        .expect("expected at least the network exposure question");
    assert_eq!(first.question_id, "network_exposure");
    assert!(first.required);
    assert!(first.affects_eligibility);
}

#[test]
fn test_network_exposure_question_skipped_when_answered() {
    let engine = ScoringEngine::new(rehost_catalog());
    let mut context = rehost_context();
    context
        .user_answers
        .insert("network_exposure".to_string(), "external".to_string());

    let result = engine.score_context(&context);
    assert!(
        result
            .clarification_questions
            .iter()
            .all(|q| q.question_id != "network_exposure")
    );
    // The answer overrides the derived signal
    assert_eq!(result.derived_intent.network_exposure.source, "user_answer");
    assert_eq!(
        result.derived_intent.network_exposure.confidence,
        SignalConfidence::High
    );
}

// ============================================================================
// Scenario: catalog quality weighting
// ============================================================================

#[test]
fn test_catalog_quality_weighting_separates_identical_entries() {
    // Two entries that score identically on every dimension, differing only
    // in catalog quality.
    let mut curated = entry("curated");
    curated.catalog_quality = CatalogQuality::Curated;
    let mut suggested = entry("suggested");
    suggested.catalog_quality = CatalogQuality::AiSuggested;

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![curated, suggested],
    };
    let engine = ScoringEngine::new(catalog);
    let context = rehost_context();
    let result = engine.score_context(&context);

    assert_eq!(result.recommendations.len(), 2);
    let curated_rec = result
        .recommendations
        .iter()
        .find(|r| r.architecture_id == "curated")
        .unwrap();
    let suggested_rec = result
        .recommendations
        .iter()
        .find(|r| r.architecture_id == "suggested")
        .unwrap();

    // Same dimension scores, so the gap is exactly base * (1.0 - 0.90).
    let base: f64 = curated_rec
        .scoring_dimensions
        .iter()
        .map(|d| d.weighted_score)
        .sum::<f64>()
        / curated_rec.scoring_dimensions.iter().map(|d| d.weight).sum::<f64>()
        * 100.0;
    let expected_gap = base * (1.0 - 0.90);
    let actual_gap = curated_rec.likelihood_score - suggested_rec.likelihood_score;
    assert!(
        (actual_gap - expected_gap).abs() < 0.11,
        "expected gap {:.2}, got {:.2}",
        expected_gap,
        actual_gap
    );
}

#[test]
fn test_quality_weights_match_contract() {
    assert_eq!(ArchitectureScorer::quality_weight(CatalogQuality::Curated), 1.0);
    assert_eq!(ArchitectureScorer::quality_weight(CatalogQuality::AiEnriched), 0.95);
    assert_eq!(ArchitectureScorer::quality_weight(CatalogQuality::AiSuggested), 0.90);
    assert_eq!(ArchitectureScorer::quality_weight(CatalogQuality::ExampleOnly), 0.85);
}

// ============================================================================
// Universal invariants
// ============================================================================

#[test]
fn test_every_entry_is_recommended_or_excluded_never_both() {
    let engine = ScoringEngine::new(rehost_catalog());
    let result = engine.score_context(&rehost_context());

    let mut seen: Vec<&str> = result
        .recommendations
        .iter()
        .map(|r| r.architecture_id.as_str())
        .chain(result.excluded.iter().map(|e| e.architecture_id.as_str()))
        .collect();
    seen.sort();
    let total = seen.len();
    seen.dedup();
    assert_eq!(seen.len(), total, "an entry appeared in both lists");
    assert_eq!(total, engine.catalog().len());
}

#[test]
fn test_score_and_penalty_bounds() {
    let engine = ScoringEngine::new(rehost_catalog());
    let result = engine.score_context(&rehost_context());

    for rec in &result.recommendations {
        let total_weighted: f64 = rec.scoring_dimensions.iter().map(|d| d.weighted_score).sum();
        let total_weight: f64 = rec.scoring_dimensions.iter().map(|d| d.weight).sum();
        let normalized = total_weighted / total_weight;
        assert!((0.0..=1.0).contains(&normalized), "normalized score {} out of range", normalized);
        assert!(
            (0.0..=100.0).contains(&rec.likelihood_score),
            "likelihood score {} out of range",
            rec.likelihood_score
        );
        assert!(
            (0.0..=0.25).contains(&rec.confidence_penalty),
            "confidence penalty {} out of range",
            rec.confidence_penalty
        );
        // Exactly one record per dimension
        assert_eq!(rec.scoring_dimensions.len(), 10);
        for dim in &rec.scoring_dimensions {
            assert!((0.0..=100.0).contains(&dim.raw_score));
        }
    }
}

#[test]
fn test_apply_answers_is_idempotent() {
    let context = rehost_context();
    let intent = IntentDeriver::derive(&context);
    let generator = QuestionGenerator::default();

    let answers = HashMap::from([
        ("network_exposure".to_string(), "external".to_string()),
        ("operating_model".to_string(), "devops".to_string()),
    ]);

    let once = generator.apply_answers(&context, &intent, &answers);
    let twice = generator.apply_answers(&context, &once, &answers);

    assert_eq!(
        serde_json::to_value(&once).unwrap(),
        serde_json::to_value(&twice).unwrap()
    );
}

#[test]
fn test_unknown_answer_values_are_ignored() {
    let context = rehost_context();
    let intent = IntentDeriver::derive(&context);
    let generator = QuestionGenerator::default();

    let answers = HashMap::from([("treatment".to_string(), "teleport".to_string())]);
    let updated = generator.apply_answers(&context, &intent, &answers);
    assert_eq!(updated.treatment.value, intent.treatment.value);
    assert_ne!(updated.treatment.source, "user_answer");
}

// ============================================================================
// Question ordering
// ============================================================================

#[test]
fn test_questions_sorted_required_then_eligibility_then_id() {
    let engine = ScoringEngine::new(rehost_catalog());
    // A sparse context yields several low-confidence signals.
    let raw = RawContextFile {
        app_overview: OneOrMany::One(RawAppOverview {
            application: "Mystery".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let context = ContextNormalizer::normalize(raw).unwrap();
    let result = engine.score_context(&context);
    let questions = &result.clarification_questions;

    assert!(questions.len() >= 3);
    assert!(questions[0].required);
    for pair in questions.windows(2) {
        let key = |q: &crate::models::intent::ClarificationQuestion| {
            (!q.required, !q.affects_eligibility, q.question_id.clone())
        };
        assert!(key(&pair[0]) <= key(&pair[1]), "questions out of order");
    }
}

// ============================================================================
// Eligibility details
// ============================================================================

#[test]
fn test_all_failing_rules_are_collected() {
    // Architecture requiring SRE operations and regulated security against a
    // plain traditional-IT context: both failures must be present.
    let mut demanding = entry("demanding");
    demanding.operating_model_required = OperatingModel::Sre;
    demanding.security_level = SecurityLevel::Basic;
    demanding.supported_treatments = vec![Treatment::Refactor];

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![demanding],
    };
    let engine = ScoringEngine::new(catalog);
    let result = engine.score_context(&rehost_context());

    assert_eq!(result.excluded.len(), 1);
    let reasons: Vec<&str> = result.excluded[0]
        .reasons
        .iter()
        .map(|r| r.reason_type.as_str())
        .collect();
    assert!(reasons.contains(&"treatment_mismatch"));
    assert!(reasons.contains(&"operating_model_gap"));
}

#[test]
fn test_operating_model_one_level_gap_is_allowed() {
    let mut devops_arch = entry("devops-arch");
    devops_arch.operating_model_required = OperatingModel::Devops;

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![devops_arch],
    };
    let engine = ScoringEngine::new(catalog);

    // Transitional maturity (one below devops): eligible.
    let mut context = rehost_context();
    context
        .user_answers
        .insert("security_level".to_string(), "basic".to_string());
    context
        .user_answers
        .insert("operating_model".to_string(), "transitional".to_string());
    let result = engine.score_context(&context);
    assert_eq!(result.eligible_count, 1);

    // Traditional IT (two below): excluded.
    context
        .user_answers
        .insert("operating_model".to_string(), "traditional_it".to_string());
    let result = engine.score_context(&context);
    assert_eq!(result.excluded_count, 1);
    assert_eq!(result.excluded[0].reasons[0].reason_type, "operating_model_gap");
}

#[test]
fn test_app_mod_not_supported_platform_excludes_matching_architecture() {
    let mut aks_arch = entry("aks-arch");
    aks_arch.core_services = vec!["Azure Kubernetes Service".to_string()];

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![aks_arch],
    };
    let engine = ScoringEngine::new(catalog);

    let raw = RawContextFile {
        app_overview: OneOrMany::One(RawAppOverview {
            application: "Legacy".to_string(),
            treatment: Some("rehost".to_string()),
            ..Default::default()
        }),
        app_mod_results: OneOrMany::One(RawAppModResult {
            compatibility: HashMap::from([(
                "azure_kubernetes_service".to_string(),
                "NotSupported".to_string(),
            )]),
            ..Default::default()
        }),
        ..Default::default()
    };
    let context = ContextNormalizer::normalize(raw).unwrap();
    let result = engine.score_context(&context);

    assert_eq!(result.excluded_count, 1);
    assert_eq!(result.excluded[0].reasons[0].reason_type, "app_mod_blocker");
}

// ============================================================================
// Scorer details
// ============================================================================

#[test]
fn test_platform_status_score_mapping() {
    let mut app_service_arch = entry("app-service-arch");
    app_service_arch.core_services = vec!["Azure App Service".to_string()];
    app_service_arch.supported_treatments = vec![Treatment::Replatform];

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![app_service_arch],
    };
    let engine = ScoringEngine::new(catalog);

    let raw = RawContextFile {
        app_overview: OneOrMany::One(RawAppOverview {
            application: "Shop".to_string(),
            treatment: Some("replatform".to_string()),
            ..Default::default()
        }),
        app_mod_results: OneOrMany::One(RawAppModResult {
            compatibility: HashMap::from([(
                "app_service".to_string(),
                "SupportedWithChanges".to_string(),
            )]),
            ..Default::default()
        }),
        ..Default::default()
    };
    let context = ContextNormalizer::normalize(raw).unwrap();
    let result = engine.score_context(&context);

    let rec = &result.recommendations[0];
    let platform_dim = rec
        .scoring_dimensions
        .iter()
        .find(|d| d.dimension == "platform_compatibility")
        .unwrap();
    assert!((platform_dim.raw_score - 70.0).abs() < 1e-9);
}

#[test]
fn test_service_overlap_formula() {
    let mut arch = entry("svc-arch");
    arch.core_services = vec!["Azure SQL Database".to_string()];
    arch.supporting_services = vec!["Azure Monitor".to_string()];

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![arch],
    };
    let engine = ScoringEngine::new(catalog);

    let raw = RawContextFile {
        app_overview: OneOrMany::One(RawAppOverview {
            application: "Shop".to_string(),
            treatment: Some("rehost".to_string()),
            ..Default::default()
        }),
        app_approved_azure_services: vec![HashMap::from([
            ("sql server".to_string(), "Azure SQL Database".to_string()),
            ("queue".to_string(), "Azure Service Bus".to_string()),
        ])],
        ..Default::default()
    };
    let context = ContextNormalizer::normalize(raw).unwrap();
    let result = engine.score_context(&context);

    let rec = &result.recommendations[0];
    let overlap = rec
        .scoring_dimensions
        .iter()
        .find(|d| d.dimension == "service_overlap")
        .unwrap();
    // One of two approved services match: 0.3 + 0.7 * 0.5 = 0.65
    assert!((overlap.raw_score - 65.0).abs() < 1e-9);
}

#[test]
fn test_fit_summary_is_fresh_and_matched_dimensions_untouched() {
    let engine = ScoringEngine::new(rehost_catalog());
    let result = engine.score_context(&rehost_context());

    let primary = &result.recommendations[0];
    assert!(!primary.fit_summary.is_empty());
    // The rank-1 lead line exists only in the fit summary, never in the
    // matched dimension records.
    let lead = &primary.fit_summary[0];
    assert!(
        primary
            .matched_dimensions
            .iter()
            .all(|m| &format!("{}: {}", m.dimension, m.reasoning) != lead)
    );
}

#[test]
fn test_excluded_catalog_quality_short_circuits() {
    let mut example = entry("example");
    example.catalog_quality = CatalogQuality::ExampleOnly;
    // Would also fail the treatment gate, but quality exclusion wins alone.
    example.supported_treatments = vec![Treatment::Refactor];

    let catalog = ArchitectureCatalog {
        version: "1.0.0".to_string(),
        generated_at: None,
        source_repo: None,
        architectures: vec![example.clone()],
    };
    let filter = EligibilityFilter::excluding_qualities(vec![CatalogQuality::ExampleOnly]);
    let context = rehost_context();
    let intent = IntentDeriver::derive(&context);
    let (eligible, excluded) = filter.filter(&catalog.architectures, &context, &intent);

    assert!(eligible.is_empty());
    assert_eq!(excluded[0].reasons.len(), 1);
    assert_eq!(excluded[0].reasons[0].reason_type, "catalog_quality");
}
