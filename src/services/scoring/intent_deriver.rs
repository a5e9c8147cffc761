//! Intent Deriver - Phase 2 of the Scoring Engine
//!
//! Derives architectural intent signals from the normalized context.
//! Every signal records its value, confidence, evidence source, and a
//! one-sentence reasoning. App Mod results override weaker inference when
//! they conflict.

use std::collections::HashMap;

use crate::models::catalog::{
    AvailabilityModel, CostProfile, OperatingModel, RuntimeModel, SecurityLevel, TimeCategory,
    Treatment,
};
use crate::models::context::{
    ApplicationContext, BusinessCriticality, CompatibilityStatus, UtilizationProfile,
};
use crate::models::intent::{
    CloudNativeFeasibility, DerivedIntent, DerivedSignal, ModernizationDepth, NetworkExposure,
    SignalConfidence,
};

const HIGHLY_REGULATED_FRAMEWORKS: &[&str] = &["hipaa", "pci-dss", "pci dss", "fedramp", "itar"];
const REGULATED_FRAMEWORKS: &[&str] = &["soc2", "soc 2", "iso27001", "iso 27001", "gdpr"];

const EXTERNAL_INDICATORS: &[&str] = &[
    "web application",
    "web app",
    "website",
    "portal",
    "customer",
    "public",
    "e-commerce",
    "ecommerce",
    "mobile backend",
    "api",
    "b2c",
    "consumer",
];

const INTERNAL_INDICATORS: &[&str] = &[
    "internal",
    "intranet",
    "back-office",
    "backoffice",
    "admin",
    "management",
    "employee",
    "corporate",
    "batch",
    "etl",
    "data pipeline",
];

const WEB_SERVER_TECH: &[&str] = &["IIS", "Apache", "Nginx", "nginx", "ASP.NET", "React", "Angular", "Vue"];

const CLOUD_NATIVE_STACKS: &[&str] = &["Java", "Node.js", "Python", "Go"];

/// Derives architectural intent from application context.
pub struct IntentDeriver;

impl IntentDeriver {
    /// Derive all ten intent signals from context.
    pub fn derive(context: &ApplicationContext) -> DerivedIntent {
        DerivedIntent {
            treatment: Self::derive_treatment(context),
            time_category: Self::derive_time_category(context),
            likely_runtime_model: Self::derive_runtime_model(context),
            modernization_depth_feasible: Self::derive_modernization_depth(context),
            cloud_native_feasibility: Self::derive_cloud_native_feasibility(context),
            operational_maturity_estimate: Self::derive_operational_maturity(context),
            availability_requirement: Self::derive_availability_requirement(context),
            security_requirement: Self::derive_security_requirement(context),
            cost_posture: Self::derive_cost_posture(context),
            network_exposure: Self::derive_network_exposure(context),
        }
    }

    fn derive_treatment(context: &ApplicationContext) -> DerivedSignal<Treatment> {
        let app = &context.app_overview;

        // Declared treatment is authoritative
        if let Some(declared) = app.declared_treatment {
            return DerivedSignal::new(
                declared,
                SignalConfidence::High,
                "declared_treatment",
                format!("Explicitly declared treatment: {}", declared.as_str()),
            );
        }

        if let Some(app_mod) = &context.app_mod_results {
            if app_mod.modernization_feasible == Some(false) {
                return DerivedSignal::new(
                    Treatment::Tolerate,
                    SignalConfidence::High,
                    "app_mod_results",
                    "Modernization assessment indicates modernization is not feasible",
                );
            }

            if app_mod.container_ready == Some(true)
                && app_mod
                    .recommended_targets
                    .iter()
                    .any(|t| t.contains("Kubernetes"))
            {
                return DerivedSignal::new(
                    Treatment::Refactor,
                    SignalConfidence::Medium,
                    "app_mod_results",
                    "Container-ready with a Kubernetes service recommended",
                );
            }

            if app_mod.recommended_targets.iter().any(|t| t.contains("App Service")) {
                return DerivedSignal::new(
                    Treatment::Replatform,
                    SignalConfidence::Medium,
                    "app_mod_results",
                    format!(
                        "Modernization assessment recommends: {}",
                        app_mod.recommended_targets.join(", ")
                    ),
                );
            }
        }

        // Most common per-server migration strategy
        let strategies = &context.server_summary.migration_strategies;
        if !strategies.is_empty() {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for s in strategies {
                *counts.entry(s.to_lowercase()).or_default() += 1;
            }
            let most_common = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(s, _)| s);
            if let Some(strategy) = most_common
                && let Some(treatment) = Treatment::parse(&strategy)
            {
                return DerivedSignal::new(
                    treatment,
                    SignalConfidence::Medium,
                    "server_migration_strategy",
                    format!("Most common server migration strategy: {}", strategy),
                );
            }
        }

        DerivedSignal::new(
            Treatment::Rehost,
            SignalConfidence::Low,
            "default",
            "No explicit treatment signal; defaulting to rehost",
        )
    }

    fn derive_time_category(context: &ApplicationContext) -> DerivedSignal<TimeCategory> {
        let app = &context.app_overview;

        if let Some(declared) = app.declared_time_category {
            return DerivedSignal::new(
                declared,
                SignalConfidence::High,
                "declared_time_category",
                format!("Explicitly declared time category: {}", declared.as_str()),
            );
        }

        let treatment = Self::derive_treatment(context).value;
        let time_category = match treatment {
            Treatment::Retire | Treatment::Replace => TimeCategory::Eliminate,
            Treatment::Tolerate | Treatment::Retain => TimeCategory::Tolerate,
            Treatment::Rehost | Treatment::Replatform => TimeCategory::Migrate,
            Treatment::Refactor | Treatment::Rebuild => TimeCategory::Invest,
        };

        DerivedSignal::new(
            time_category,
            SignalConfidence::Medium,
            "treatment_inference",
            format!(
                "Inferred from treatment: {} maps to {}",
                treatment.as_str(),
                time_category.as_str()
            ),
        )
    }

    fn derive_runtime_model(context: &ApplicationContext) -> DerivedSignal<RuntimeModel> {
        let tech = &context.detected_technology;
        let app_type = context
            .app_overview
            .app_type
            .as_deref()
            .unwrap_or("")
            .to_lowercase();

        if tech.messaging_present {
            if app_type.contains("distributed") {
                return DerivedSignal::new(
                    RuntimeModel::Microservices,
                    SignalConfidence::Medium,
                    "technology_detection",
                    "Distributed application with messaging",
                );
            }
            return DerivedSignal::new(
                RuntimeModel::EventDriven,
                SignalConfidence::Medium,
                "technology_detection",
                "Message queue detected suggests event-driven",
            );
        }

        let server_count = context.server_summary.server_count;
        if server_count == 1 {
            if tech.database_present {
                return DerivedSignal::new(
                    RuntimeModel::NTier,
                    SignalConfidence::Medium,
                    "server_structure",
                    "Single server with database suggests n-tier",
                );
            }
            return DerivedSignal::new(
                RuntimeModel::Monolith,
                SignalConfidence::Low,
                "server_structure",
                "Single server suggests monolith",
            );
        }

        if server_count <= 3 {
            return DerivedSignal::new(
                RuntimeModel::NTier,
                SignalConfidence::Medium,
                "server_structure",
                format!("{} servers suggests n-tier architecture", server_count),
            );
        }

        if app_type.contains("api") {
            return DerivedSignal::new(
                RuntimeModel::Api,
                SignalConfidence::Medium,
                "app_type",
                "API application type detected",
            );
        }

        DerivedSignal::new(
            RuntimeModel::NTier,
            SignalConfidence::Low,
            "default",
            "Multiple servers with unknown structure",
        )
    }

    fn derive_modernization_depth(
        context: &ApplicationContext,
    ) -> DerivedSignal<ModernizationDepth> {
        // App Mod results are authoritative
        if let Some(app_mod) = &context.app_mod_results {
            if app_mod.modernization_feasible == Some(false) || !app_mod.explicit_blockers.is_empty()
            {
                let reasoning = if app_mod.explicit_blockers.is_empty() {
                    "Blocked: modernization not feasible".to_string()
                } else {
                    format!("Blocked: {}", app_mod.explicit_blockers.join(", "))
                };
                return DerivedSignal::new(
                    ModernizationDepth::Tolerate,
                    SignalConfidence::High,
                    "app_mod_results",
                    reasoning,
                );
            }

            if app_mod.container_ready == Some(true)
                && app_mod.platform_compatibility.iter().any(|pc| {
                    pc.platform.to_lowercase().contains("kubernetes")
                        && pc.status == CompatibilityStatus::FullySupported
                })
            {
                return DerivedSignal::new(
                    ModernizationDepth::Refactor,
                    SignalConfidence::High,
                    "app_mod_results",
                    "Fully supported on Kubernetes",
                );
            }

            let mut max_depth = ModernizationDepth::Rehost;
            for pc in &app_mod.platform_compatibility {
                if !pc.status.is_supported() {
                    continue;
                }
                let platform = pc.platform.to_lowercase();
                if platform.contains("container") || platform.contains("kubernetes") {
                    max_depth = ModernizationDepth::Refactor;
                } else if platform.contains("app service")
                    && max_depth == ModernizationDepth::Rehost
                {
                    max_depth = ModernizationDepth::Replatform;
                }
            }

            return DerivedSignal::new(
                max_depth,
                SignalConfidence::Medium,
                "app_mod_results",
                "Based on platform compatibility analysis",
            );
        }

        let tech = &context.detected_technology;

        // Legacy technology limits modernization
        if tech.database_types.iter().any(|db| db == "Access") {
            return DerivedSignal::new(
                ModernizationDepth::Tolerate,
                SignalConfidence::Medium,
                "technology_detection",
                "Microsoft Access detected - limited modernization options",
            );
        }

        match tech.primary_runtime.as_deref() {
            Some(runtime @ ("Java" | "Node.js" | "Python" | "Go")) => DerivedSignal::new(
                ModernizationDepth::Refactor,
                SignalConfidence::Low,
                "technology_detection",
                format!("{} typically supports containerization", runtime),
            ),
            Some(".NET") => {
                if tech.technologies.iter().any(|t| t.contains("Framework")) {
                    DerivedSignal::new(
                        ModernizationDepth::Replatform,
                        SignalConfidence::Low,
                        "technology_detection",
                        ".NET Framework may have containerization limitations",
                    )
                } else {
                    DerivedSignal::new(
                        ModernizationDepth::Refactor,
                        SignalConfidence::Low,
                        "technology_detection",
                        ".NET typically supports modernization",
                    )
                }
            },
            _ => DerivedSignal::new(
                ModernizationDepth::Rehost,
                SignalConfidence::Low,
                "default",
                "Unknown technology stack; conservative estimate",
            ),
        }
    }

    fn derive_cloud_native_feasibility(
        context: &ApplicationContext,
    ) -> DerivedSignal<CloudNativeFeasibility> {
        if let Some(app_mod) = &context.app_mod_results {
            match app_mod.container_ready {
                Some(true) => {
                    if !app_mod.explicit_blockers.is_empty() {
                        return DerivedSignal::new(
                            CloudNativeFeasibility::Medium,
                            SignalConfidence::High,
                            "app_mod_results",
                            format!(
                                "Container-ready but with {} blocker(s)",
                                app_mod.explicit_blockers.len()
                            ),
                        );
                    }
                    return DerivedSignal::new(
                        CloudNativeFeasibility::High,
                        SignalConfidence::High,
                        "app_mod_results",
                        "Modernization assessment confirms container-ready",
                    );
                },
                Some(false) => {
                    return DerivedSignal::new(
                        CloudNativeFeasibility::Low,
                        SignalConfidence::High,
                        "app_mod_results",
                        "Modernization assessment indicates not container-ready",
                    );
                },
                None => {},
            }
        }

        let tech = &context.detected_technology;
        if let Some(runtime) = tech.primary_runtime.as_deref() {
            if CLOUD_NATIVE_STACKS.contains(&runtime) {
                if tech.messaging_present {
                    return DerivedSignal::new(
                        CloudNativeFeasibility::High,
                        SignalConfidence::Medium,
                        "technology_detection",
                        format!("{} with messaging is cloud-native friendly", runtime),
                    );
                }
                return DerivedSignal::new(
                    CloudNativeFeasibility::Medium,
                    SignalConfidence::Medium,
                    "technology_detection",
                    format!("{} typically supports cloud-native", runtime),
                );
            }

            if runtime == ".NET" {
                if tech.technologies.iter().any(|t| t.contains("Framework")) {
                    return DerivedSignal::new(
                        CloudNativeFeasibility::Low,
                        SignalConfidence::Medium,
                        "technology_detection",
                        ".NET Framework has limited container support",
                    );
                }
                return DerivedSignal::new(
                    CloudNativeFeasibility::Medium,
                    SignalConfidence::Medium,
                    "technology_detection",
                    "Modern .NET supports containers",
                );
            }
        }

        DerivedSignal::new(
            CloudNativeFeasibility::Low,
            SignalConfidence::Low,
            "default",
            "Unknown stack; conservative cloud-native estimate",
        )
    }

    fn derive_operational_maturity(context: &ApplicationContext) -> DerivedSignal<OperatingModel> {
        let tech = &context.detected_technology;
        let app = &context.app_overview;
        let app_mod = context.app_mod_results.as_ref();

        if tech.has_ci_cd {
            return DerivedSignal::new(
                OperatingModel::Devops,
                SignalConfidence::High,
                "technology_detection",
                "CI/CD detected indicates DevOps maturity",
            );
        }

        if tech.containerized {
            return DerivedSignal::new(
                OperatingModel::Devops,
                SignalConfidence::Medium,
                "technology_detection",
                "Containerized workload suggests DevOps practices",
            );
        }

        if app_mod.is_some_and(|m| m.container_ready == Some(true)) {
            return DerivedSignal::new(
                OperatingModel::Devops,
                SignalConfidence::Medium,
                "app_mod_results",
                "Container-ready application indicates DevOps maturity",
            );
        }

        if let Some(app_mod) = app_mod
            && app_mod.platform_compatibility.iter().any(|pc| {
                let platform = pc.platform.to_lowercase();
                (platform.contains("kubernetes") || platform.contains("aks"))
                    && pc.status == CompatibilityStatus::FullySupported
            })
        {
            return DerivedSignal::new(
                OperatingModel::Devops,
                SignalConfidence::Medium,
                "app_mod_results",
                "Full Kubernetes support indicates DevOps readiness",
            );
        }

        if matches!(tech.primary_runtime.as_deref(), Some("Go" | "Node.js")) || tech.messaging_present
        {
            return DerivedSignal::new(
                OperatingModel::Transitional,
                SignalConfidence::Low,
                "technology_detection",
                "Modern stack suggests at least transitional maturity",
            );
        }

        if let Some(treatment) = app.declared_treatment
            && matches!(treatment, Treatment::Replatform | Treatment::Refactor | Treatment::Rebuild)
        {
            return DerivedSignal::new(
                OperatingModel::Transitional,
                SignalConfidence::Low,
                "treatment_inference",
                format!(
                    "{} treatment implies modernization and operational maturity growth",
                    treatment.as_str()
                ),
            );
        }

        if app.business_criticality == BusinessCriticality::MissionCritical {
            return DerivedSignal::new(
                OperatingModel::Transitional,
                SignalConfidence::Low,
                "business_criticality",
                "Mission-critical apps often have better operations",
            );
        }

        DerivedSignal::new(
            OperatingModel::TraditionalIt,
            SignalConfidence::Low,
            "default",
            "No DevOps indicators detected",
        )
    }

    fn derive_availability_requirement(
        context: &ApplicationContext,
    ) -> DerivedSignal<AvailabilityModel> {
        let app = &context.app_overview;

        if let Some(explicit) = app.availability_requirement {
            return DerivedSignal::new(
                explicit,
                SignalConfidence::High,
                "explicit_requirement",
                "Explicitly specified availability requirement",
            );
        }

        let availability = match app.business_criticality {
            BusinessCriticality::Low => AvailabilityModel::SingleRegion,
            BusinessCriticality::Medium | BusinessCriticality::High => {
                AvailabilityModel::ZoneRedundant
            },
            BusinessCriticality::MissionCritical => AvailabilityModel::MultiRegionActivePassive,
        };

        DerivedSignal::new(
            availability,
            SignalConfidence::Medium,
            "business_criticality",
            format!("Inferred from {} criticality", app.business_criticality.as_str()),
        )
    }

    fn derive_security_requirement(context: &ApplicationContext) -> DerivedSignal<SecurityLevel> {
        let app = &context.app_overview;

        if !app.compliance_requirements.is_empty() {
            let compliance_lower: Vec<String> = app
                .compliance_requirements
                .iter()
                .map(|c| c.to_lowercase())
                .collect();

            if compliance_lower
                .iter()
                .any(|c| HIGHLY_REGULATED_FRAMEWORKS.contains(&c.as_str()))
            {
                return DerivedSignal::new(
                    SecurityLevel::HighlyRegulated,
                    SignalConfidence::High,
                    "compliance_requirements",
                    format!("Compliance: {}", app.compliance_requirements.join(", ")),
                );
            }

            if compliance_lower
                .iter()
                .any(|c| REGULATED_FRAMEWORKS.contains(&c.as_str()))
            {
                return DerivedSignal::new(
                    SecurityLevel::Regulated,
                    SignalConfidence::High,
                    "compliance_requirements",
                    format!("Compliance: {}", app.compliance_requirements.join(", ")),
                );
            }
        }

        match app.business_criticality {
            BusinessCriticality::MissionCritical => DerivedSignal::new(
                SecurityLevel::Enterprise,
                SignalConfidence::Medium,
                "business_criticality",
                "Mission-critical apps typically need enterprise security",
            ),
            BusinessCriticality::High => DerivedSignal::new(
                SecurityLevel::Enterprise,
                SignalConfidence::Low,
                "business_criticality",
                "High criticality suggests enterprise security",
            ),
            _ => DerivedSignal::new(
                SecurityLevel::Basic,
                SignalConfidence::Low,
                "default",
                "No specific security requirements detected",
            ),
        }
    }

    fn derive_cost_posture(context: &ApplicationContext) -> DerivedSignal<CostProfile> {
        let app = &context.app_overview;

        if app.business_criticality == BusinessCriticality::MissionCritical {
            return DerivedSignal::new(
                CostProfile::ScaleOptimized,
                SignalConfidence::Medium,
                "business_criticality",
                "Mission-critical apps prioritize scale over cost",
            );
        }

        if app.business_criticality == BusinessCriticality::Low {
            return DerivedSignal::new(
                CostProfile::CostMinimized,
                SignalConfidence::Medium,
                "business_criticality",
                "Low criticality suggests cost sensitivity",
            );
        }

        if context.server_summary.utilization_profile == UtilizationProfile::Low {
            return DerivedSignal::new(
                CostProfile::CostMinimized,
                SignalConfidence::Low,
                "utilization_profile",
                "Low utilization suggests cost optimization opportunity",
            );
        }

        DerivedSignal::new(
            CostProfile::Balanced,
            SignalConfidence::Low,
            "default",
            "Default balanced cost profile",
        )
    }

    fn derive_network_exposure(context: &ApplicationContext) -> DerivedSignal<NetworkExposure> {
        let app = &context.app_overview;
        let tech = &context.detected_technology;
        let app_type = app.app_type.as_deref().unwrap_or("").to_lowercase();

        if EXTERNAL_INDICATORS.iter().any(|ind| app_type.contains(ind)) {
            return DerivedSignal::new(
                NetworkExposure::External,
                SignalConfidence::Low,
                "app_type",
                format!(
                    "App type '{}' suggests external-facing",
                    app.app_type.as_deref().unwrap_or("")
                ),
            );
        }

        if INTERNAL_INDICATORS.iter().any(|ind| app_type.contains(ind)) {
            return DerivedSignal::new(
                NetworkExposure::Internal,
                SignalConfidence::Low,
                "app_type",
                format!(
                    "App type '{}' suggests internal-only",
                    app.app_type.as_deref().unwrap_or("")
                ),
            );
        }

        if tech
            .technologies
            .iter()
            .any(|t| WEB_SERVER_TECH.iter().any(|w| t.contains(w)))
        {
            return DerivedSignal::new(
                NetworkExposure::External,
                SignalConfidence::Low,
                "technology_detection",
                "Web server technology detected, possibly external-facing",
            );
        }

        DerivedSignal::new(
            NetworkExposure::Internal,
            SignalConfidence::Unknown,
            "default",
            "No clear external indicators; defaulting to internal",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::context::*;

    fn base_context() -> ApplicationContext {
        ApplicationContext {
            app_overview: AppOverview {
                application_name: "test-app".into(),
                app_type: None,
                business_criticality: BusinessCriticality::Medium,
                declared_treatment: None,
                declared_time_category: None,
                availability_requirement: None,
                compliance_requirements: vec![],
                description: None,
                owner: None,
            },
            server_summary: ServerSummary::default(),
            detected_technology: DetectedTechnology::default(),
            app_mod_results: None,
            approved_services: ApprovedServices::default(),
            user_answers: Default::default(),
        }
    }

    #[test]
    fn test_declared_treatment_is_high_confidence() {
        let mut ctx = base_context();
        ctx.app_overview.declared_treatment = Some(Treatment::Replatform);
        let signal = IntentDeriver::derive_treatment(&ctx);
        assert_eq!(signal.value, Treatment::Replatform);
        assert_eq!(signal.confidence, SignalConfidence::High);
        assert_eq!(signal.source, "declared_treatment");
    }

    #[test]
    fn test_modernization_blocked_derives_tolerate() {
        let mut ctx = base_context();
        ctx.app_mod_results = Some(AppModResults {
            modernization_feasible: Some(false),
            ..Default::default()
        });
        let signal = IntentDeriver::derive_treatment(&ctx);
        assert_eq!(signal.value, Treatment::Tolerate);
        assert_eq!(signal.confidence, SignalConfidence::High);
    }

    #[test]
    fn test_container_ready_with_kubernetes_derives_refactor() {
        let mut ctx = base_context();
        ctx.app_mod_results = Some(AppModResults {
            container_ready: Some(true),
            recommended_targets: vec!["Azure Kubernetes Service".into()],
            ..Default::default()
        });
        let signal = IntentDeriver::derive_treatment(&ctx);
        assert_eq!(signal.value, Treatment::Refactor);
        assert_eq!(signal.confidence, SignalConfidence::Medium);
    }

    #[test]
    fn test_app_service_target_derives_replatform() {
        let mut ctx = base_context();
        ctx.app_mod_results = Some(AppModResults {
            recommended_targets: vec!["Azure App Service".into()],
            ..Default::default()
        });
        let signal = IntentDeriver::derive_treatment(&ctx);
        assert_eq!(signal.value, Treatment::Replatform);
    }

    #[test]
    fn test_treatment_falls_back_to_rehost_low() {
        let ctx = base_context();
        let signal = IntentDeriver::derive_treatment(&ctx);
        assert_eq!(signal.value, Treatment::Rehost);
        assert_eq!(signal.confidence, SignalConfidence::Low);
        assert_eq!(signal.source, "default");
    }

    #[test]
    fn test_time_category_maps_from_treatment() {
        let mut ctx = base_context();
        ctx.app_overview.declared_treatment = Some(Treatment::Refactor);
        let signal = IntentDeriver::derive_time_category(&ctx);
        assert_eq!(signal.value, TimeCategory::Invest);
        assert_eq!(signal.confidence, SignalConfidence::Medium);
    }

    #[test]
    fn test_runtime_model_messaging_and_distributed() {
        let mut ctx = base_context();
        ctx.detected_technology.messaging_present = true;
        ctx.app_overview.app_type = Some("Distributed order processing".into());
        let signal = IntentDeriver::derive_runtime_model(&ctx);
        assert_eq!(signal.value, RuntimeModel::Microservices);

        ctx.app_overview.app_type = None;
        let signal = IntentDeriver::derive_runtime_model(&ctx);
        assert_eq!(signal.value, RuntimeModel::EventDriven);
    }

    #[test]
    fn test_runtime_model_single_server_rules() {
        let mut ctx = base_context();
        ctx.server_summary.server_count = 1;
        ctx.detected_technology.database_present = true;
        assert_eq!(IntentDeriver::derive_runtime_model(&ctx).value, RuntimeModel::NTier);

        ctx.detected_technology.database_present = false;
        let signal = IntentDeriver::derive_runtime_model(&ctx);
        assert_eq!(signal.value, RuntimeModel::Monolith);
        assert_eq!(signal.confidence, SignalConfidence::Low);
    }

    #[test]
    fn test_operational_maturity_ci_cd_is_devops_high() {
        let mut ctx = base_context();
        ctx.detected_technology.has_ci_cd = true;
        let signal = IntentDeriver::derive_operational_maturity(&ctx);
        assert_eq!(signal.value, OperatingModel::Devops);
        assert_eq!(signal.confidence, SignalConfidence::High);
    }

    #[test]
    fn test_operational_maturity_mission_critical_transitional() {
        let mut ctx = base_context();
        ctx.app_overview.business_criticality = BusinessCriticality::MissionCritical;
        let signal = IntentDeriver::derive_operational_maturity(&ctx);
        assert_eq!(signal.value, OperatingModel::Transitional);
        assert_eq!(signal.confidence, SignalConfidence::Low);
    }

    #[test]
    fn test_availability_maps_from_criticality() {
        let mut ctx = base_context();
        ctx.app_overview.business_criticality = BusinessCriticality::Low;
        assert_eq!(
            IntentDeriver::derive_availability_requirement(&ctx).value,
            AvailabilityModel::SingleRegion
        );

        ctx.app_overview.business_criticality = BusinessCriticality::High;
        assert_eq!(
            IntentDeriver::derive_availability_requirement(&ctx).value,
            AvailabilityModel::ZoneRedundant
        );

        ctx.app_overview.business_criticality = BusinessCriticality::MissionCritical;
        let signal = IntentDeriver::derive_availability_requirement(&ctx);
        assert_eq!(signal.value, AvailabilityModel::MultiRegionActivePassive);
        assert_eq!(signal.confidence, SignalConfidence::Medium);
    }

    #[test]
    fn test_security_compliance_tiers() {
        let mut ctx = base_context();
        ctx.app_overview.compliance_requirements = vec!["HIPAA".into()];
        let signal = IntentDeriver::derive_security_requirement(&ctx);
        assert_eq!(signal.value, SecurityLevel::HighlyRegulated);
        assert_eq!(signal.confidence, SignalConfidence::High);

        ctx.app_overview.compliance_requirements = vec!["SOC2".into()];
        assert_eq!(
            IntentDeriver::derive_security_requirement(&ctx).value,
            SecurityLevel::Regulated
        );

        ctx.app_overview.compliance_requirements = vec![];
        ctx.app_overview.business_criticality = BusinessCriticality::High;
        let signal = IntentDeriver::derive_security_requirement(&ctx);
        assert_eq!(signal.value, SecurityLevel::Enterprise);
        assert_eq!(signal.confidence, SignalConfidence::Low);
    }

    #[test]
    fn test_cost_posture_rules() {
        let mut ctx = base_context();
        ctx.app_overview.business_criticality = BusinessCriticality::MissionCritical;
        assert_eq!(
            IntentDeriver::derive_cost_posture(&ctx).value,
            CostProfile::ScaleOptimized
        );

        ctx.app_overview.business_criticality = BusinessCriticality::Medium;
        ctx.server_summary.utilization_profile = UtilizationProfile::Low;
        let signal = IntentDeriver::derive_cost_posture(&ctx);
        assert_eq!(signal.value, CostProfile::CostMinimized);
        assert_eq!(signal.confidence, SignalConfidence::Low);
    }

    #[test]
    fn test_network_exposure_indicators() {
        let mut ctx = base_context();
        ctx.app_overview.app_type = Some("Customer Portal".into());
        assert_eq!(
            IntentDeriver::derive_network_exposure(&ctx).value,
            NetworkExposure::External
        );

        ctx.app_overview.app_type = Some("Back-office batch".into());
        assert_eq!(
            IntentDeriver::derive_network_exposure(&ctx).value,
            NetworkExposure::Internal
        );

        ctx.app_overview.app_type = None;
        ctx.detected_technology.technologies = vec!["IIS 10".into()];
        assert_eq!(
            IntentDeriver::derive_network_exposure(&ctx).value,
            NetworkExposure::External
        );

        ctx.detected_technology.technologies = vec![];
        let signal = IntentDeriver::derive_network_exposure(&ctx);
        assert_eq!(signal.value, NetworkExposure::Internal);
        assert_eq!(signal.confidence, SignalConfidence::Unknown);
    }

    #[test]
    fn test_every_signal_is_populated() {
        let intent = IntentDeriver::derive(&base_context());
        // Sources are always non-empty tokens and reasoning is a sentence.
        for (source, reasoning) in [
            (&intent.treatment.source, &intent.treatment.reasoning),
            (&intent.time_category.source, &intent.time_category.reasoning),
            (&intent.likely_runtime_model.source, &intent.likely_runtime_model.reasoning),
            (
                &intent.modernization_depth_feasible.source,
                &intent.modernization_depth_feasible.reasoning,
            ),
            (
                &intent.cloud_native_feasibility.source,
                &intent.cloud_native_feasibility.reasoning,
            ),
            (
                &intent.operational_maturity_estimate.source,
                &intent.operational_maturity_estimate.reasoning,
            ),
            (
                &intent.availability_requirement.source,
                &intent.availability_requirement.reasoning,
            ),
            (&intent.security_requirement.source, &intent.security_requirement.reasoning),
            (&intent.cost_posture.source, &intent.cost_posture.reasoning),
            (&intent.network_exposure.source, &intent.network_exposure.reasoning),
        ] {
            assert!(!source.is_empty());
            assert!(!reasoning.is_empty());
        }
    }
}
