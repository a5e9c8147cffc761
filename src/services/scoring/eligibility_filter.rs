//! Eligibility Filter - Phase 4 of the Scoring Engine
//!
//! Applies hard-gate rules in a fixed order and records every failing rule
//! per architecture, except that a catalog-quality failure short-circuits.
//! Modernization assessment results are authoritative for platform
//! compatibility.

use crate::models::catalog::{
    ArchitectureEntry, CatalogQuality, NotSuitableFor, OperatingModel, Treatment,
};
use crate::models::context::{ApplicationContext, CompatibilityStatus};
use crate::models::intent::DerivedIntent;
use crate::models::recommendation::{ExcludedArchitecture, ExclusionReasonDetail};

/// Platform keyword table mapping architecture service text to assessed
/// platforms.
const PLATFORM_KEYWORDS: &[(&str, &[&str])] = &[
    ("azure kubernetes service", &["aks", "kubernetes"]),
    ("azure container apps", &["container apps", "aca"]),
    ("azure app service", &["app service"]),
];

/// Filters architectures based on hard eligibility rules.
pub struct EligibilityFilter {
    /// Catalog qualities excluded outright. Default allows all.
    excluded_qualities: Vec<CatalogQuality>,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self { excluded_qualities: Vec::new() }
    }
}

impl EligibilityFilter {
    pub fn excluding_qualities(excluded_qualities: Vec<CatalogQuality>) -> Self {
        Self { excluded_qualities }
    }

    /// Partition catalog entries into eligible and excluded sets.
    pub fn filter<'a>(
        &self,
        architectures: &'a [ArchitectureEntry],
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> (Vec<&'a ArchitectureEntry>, Vec<ExcludedArchitecture>) {
        let mut eligible = Vec::new();
        let mut excluded = Vec::new();

        for arch in architectures {
            let reasons = self.check_eligibility(arch, context, intent);
            if reasons.is_empty() {
                eligible.push(arch);
            } else {
                excluded.push(ExcludedArchitecture {
                    architecture_id: arch.architecture_id.clone(),
                    name: arch.name.clone(),
                    reasons,
                });
            }
        }

        (eligible, excluded)
    }

    /// Evaluate all rules; collects every failing rule except that a
    /// catalog-quality failure returns immediately.
    fn check_eligibility(
        &self,
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> Vec<ExclusionReasonDetail> {
        let mut reasons = Vec::new();

        // Rule 1: catalog quality gate (short-circuits)
        if let Some(reason) = self.check_catalog_quality(arch) {
            reasons.push(reason);
            return reasons;
        }

        // Rule 2: treatment compatibility
        if let Some(reason) = Self::check_treatment(arch, intent) {
            reasons.push(reason);
        }

        // Rule 3: time category compatibility
        if let Some(reason) = Self::check_time_category(arch, intent) {
            reasons.push(reason);
        }

        // Rule 4: security level
        if let Some(reason) = Self::check_security_level(arch, intent) {
            reasons.push(reason);
        }

        // Rule 5: operating model gap
        if let Some(reason) = Self::check_operating_model(arch, intent) {
            reasons.push(reason);
        }

        // Rule 6: modernization assessment blockers (authoritative)
        reasons.extend(Self::check_app_mod_blockers(arch, context));

        // Rule 7: not_suitable_for exclusions
        reasons.extend(Self::check_not_suitable_for(arch, context, intent));

        reasons
    }

    fn check_catalog_quality(&self, arch: &ArchitectureEntry) -> Option<ExclusionReasonDetail> {
        if self.excluded_qualities.contains(&arch.catalog_quality) {
            return Some(ExclusionReasonDetail {
                reason_type: "catalog_quality".into(),
                description: format!(
                    "Catalog quality '{}' is excluded by configuration",
                    arch.catalog_quality.as_str()
                ),
                blocking_value: arch.catalog_quality.as_str().into(),
                required_value: None,
            });
        }
        None
    }

    fn check_treatment(
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
    ) -> Option<ExclusionReasonDetail> {
        let required = intent.treatment.value;

        // No restriction list means no gate
        if arch.supported_treatments.is_empty() {
            return None;
        }

        if !arch.supported_treatments.contains(&required) {
            return Some(ExclusionReasonDetail {
                reason_type: "treatment_mismatch".into(),
                description: format!(
                    "Architecture does not support {} treatment",
                    required.as_str()
                ),
                blocking_value: required.as_str().into(),
                required_value: Some(
                    arch.supported_treatments
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }
        None
    }

    fn check_time_category(
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
    ) -> Option<ExclusionReasonDetail> {
        let required = intent.time_category.value;

        if arch.supported_time_categories.is_empty() {
            return None;
        }

        if !arch.supported_time_categories.contains(&required) {
            return Some(ExclusionReasonDetail {
                reason_type: "time_category_mismatch".into(),
                description: format!(
                    "Architecture does not support the {} time category",
                    required.as_str()
                ),
                blocking_value: required.as_str().into(),
                required_value: Some(
                    arch.supported_time_categories
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }
        None
    }

    fn check_security_level(
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
    ) -> Option<ExclusionReasonDetail> {
        let required = intent.security_requirement.value;

        if arch.security_level.rank() < required.rank() {
            return Some(ExclusionReasonDetail {
                reason_type: "security_level_insufficient".into(),
                description: format!(
                    "Architecture security level ({}) below requirement ({})",
                    arch.security_level.as_str(),
                    required.as_str()
                ),
                blocking_value: arch.security_level.as_str().into(),
                required_value: Some(required.as_str().into()),
            });
        }
        None
    }

    /// A 1-level maturity gap is allowed (transitional teams can grow into
    /// devops architectures); a gap of 2+ excludes.
    fn check_operating_model(
        arch: &ArchitectureEntry,
        intent: &DerivedIntent,
    ) -> Option<ExclusionReasonDetail> {
        let app_maturity = intent.operational_maturity_estimate.value;
        let arch_required = arch.operating_model_required;

        let gap = arch_required.rank() as i32 - app_maturity.rank() as i32;
        if gap > 1 {
            return Some(ExclusionReasonDetail {
                reason_type: "operating_model_gap".into(),
                description: format!(
                    "App maturity ({}) significantly below architecture requirement ({})",
                    app_maturity.as_str(),
                    arch_required.as_str()
                ),
                blocking_value: app_maturity.as_str().into(),
                required_value: Some(arch_required.as_str().into()),
            });
        }
        None
    }

    fn check_app_mod_blockers(
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
    ) -> Vec<ExclusionReasonDetail> {
        let mut reasons = Vec::new();
        let Some(app_mod) = &context.app_mod_results else {
            return reasons;
        };

        let arch_services = arch
            .all_services()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        for pc in &app_mod.platform_compatibility {
            if pc.status != CompatibilityStatus::NotSupported {
                continue;
            }
            let platform_lower = pc.platform.to_lowercase();

            for (canonical, keywords) in PLATFORM_KEYWORDS {
                let platform_matches = keywords.iter().any(|kw| platform_lower.contains(kw));
                if !platform_matches {
                    continue;
                }
                let arch_uses_platform = keywords
                    .iter()
                    .any(|kw| arch_services.contains(kw))
                    || arch_services.contains(canonical);
                if arch_uses_platform {
                    reasons.push(ExclusionReasonDetail {
                        reason_type: "app_mod_blocker".into(),
                        description: format!("Modernization assessment: {} not supported", pc.platform),
                        blocking_value: "not_supported".into(),
                        required_value: Some(pc.platform.clone()),
                    });
                }
            }
        }

        for blocker in &app_mod.explicit_blockers {
            let blocker_lower = blocker.to_lowercase();
            if blocker_lower.contains("container")
                && ["kubernetes", "container", "aks", "aca"]
                    .iter()
                    .any(|kw| arch_services.contains(kw))
            {
                reasons.push(ExclusionReasonDetail {
                    reason_type: "app_mod_blocker".into(),
                    description: format!("Modernization blocker: {}", blocker),
                    blocking_value: blocker.clone(),
                    required_value: None,
                });
            }
        }

        reasons
    }

    fn check_not_suitable_for(
        arch: &ArchitectureEntry,
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> Vec<ExclusionReasonDetail> {
        arch.not_suitable_for
            .iter()
            .filter(|exclusion| Self::exclusion_applies(**exclusion, context, intent))
            .map(|exclusion| ExclusionReasonDetail {
                reason_type: "not_suitable_for".into(),
                description: format!("Architecture not suitable for: {}", exclusion.as_str()),
                blocking_value: exclusion.as_str().into(),
                required_value: None,
            })
            .collect()
    }

    /// Map each closed exclusion reason onto a context predicate.
    fn exclusion_applies(
        exclusion: NotSuitableFor,
        context: &ApplicationContext,
        intent: &DerivedIntent,
    ) -> bool {
        let tech = &context.detected_technology;
        match exclusion {
            NotSuitableFor::RehostOnly => intent.treatment.value != Treatment::Rehost,
            NotSuitableFor::TolerateOnly => intent.treatment.value != Treatment::Tolerate,
            NotSuitableFor::SingleVmWorkloads => context.server_summary.server_count > 1,
            // Existing applications are never greenfield
            NotSuitableFor::GreenfieldOnly => true,
            NotSuitableFor::SimpleWorkloads => context.server_summary.server_count > 2,
            NotSuitableFor::WindowsOnly => tech.is_linux && !tech.is_windows,
            NotSuitableFor::LinuxOnly => tech.is_windows && !tech.is_linux,
            NotSuitableFor::NoContainerExperience => {
                Self::has_no_container_experience(context, intent)
            },
            // Statefulness cannot be determined from context alone
            NotSuitableFor::StatefulApps => false,
        }
    }

    fn has_no_container_experience(context: &ApplicationContext, intent: &DerivedIntent) -> bool {
        if let Some(app_mod) = &context.app_mod_results
            && app_mod.container_ready == Some(false)
        {
            return true;
        }

        let tech = &context.detected_technology;
        !tech.containerized
            && intent.operational_maturity_estimate.value == OperatingModel::TraditionalIt
    }
}
