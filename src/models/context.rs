//! Application Context Models
//!
//! Raw context file shapes as produced by discovery tooling, plus the
//! normalized `ApplicationContext` consumed by the scoring pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalog::{AvailabilityModel, Treatment, TimeCategory};

// ============================================================================
// Context Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCriticality {
    Low,
    Medium,
    High,
    MissionCritical,
}

impl BusinessCriticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::MissionCritical => "mission_critical",
        }
    }

    /// Lenient parse of discovery-tool values ("Mission Critical", "HIGH", ...).
    /// Unrecognized values fall back to medium.
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "low" => Self::Low,
            "medium" | "moderate" => Self::Medium,
            "high" => Self::High,
            "mission_critical" | "critical" => Self::MissionCritical,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationProfile {
    Low,
    Medium,
    High,
}

impl UtilizationProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyComplexity {
    Simple,
    Moderate,
    Complex,
}

/// Platform compatibility status from application modernization assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityStatus {
    FullySupported,
    Supported,
    SupportedWithChanges,
    SupportedWithRefactor,
    NotSupported,
}

impl CompatibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullySupported => "fully_supported",
            Self::Supported => "supported",
            Self::SupportedWithChanges => "supported_with_changes",
            Self::SupportedWithRefactor => "supported_with_refactor",
            Self::NotSupported => "not_supported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::NotSupported)
    }

    /// Lenient parse of assessment-tool values ("FullySupported", "not supported").
    pub fn parse_lenient(s: &str) -> Self {
        let mut normalized = String::new();
        for (i, ch) in s.trim().chars().enumerate() {
            if ch.is_uppercase() && i > 0 {
                normalized.push('_');
            }
            if ch == ' ' || ch == '-' {
                normalized.push('_');
            } else {
                normalized.extend(ch.to_lowercase());
            }
        }
        let normalized = normalized.replace("__", "_");
        match normalized.as_str() {
            "fully_supported" => Self::FullySupported,
            "supported" => Self::Supported,
            "supported_with_changes" => Self::SupportedWithChanges,
            "supported_with_refactor" => Self::SupportedWithRefactor,
            _ => Self::NotSupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmReadiness {
    Ready,
    ReadyWithConditions,
    NotReady,
    Unknown,
}

impl VmReadiness {
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        if normalized.contains("condition") {
            Self::ReadyWithConditions
        } else if normalized.contains("not") {
            Self::NotReady
        } else if normalized.contains("ready") {
            Self::Ready
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::ReadyWithConditions => "ready_with_conditions",
            Self::NotReady => "not_ready",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// Raw Context File (as consumed from external producers)
// ============================================================================

/// Accepts either a single object or a list-of-one wrapping of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Raw application overview row. Field names (and the `business_crtiticality`
/// typo) match what the upstream export actually emits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAppOverview {
    pub application: String,
    pub app_type: Option<String>,
    #[serde(alias = "business_crtiticality")]
    pub business_criticality: Option<String>,
    pub treatment: Option<String>,
    pub time_category: Option<String>,
    pub availability_requirement: Option<String>,
    pub compliance_requirements: Vec<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
}

/// Raw per-server discovery row. Aliases cover the PascalCase keys the
/// discovery export uses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawServerDetail {
    #[serde(alias = "ServerName")]
    pub server_name: Option<String>,
    pub environment: Option<String>,
    #[serde(alias = "OperatingSystem")]
    pub operating_system: Option<String>,
    #[serde(alias = "AzureVMReadiness")]
    pub azure_vm_readiness: Option<String>,
    #[serde(alias = "CPUUsage")]
    pub cpu_usage: Option<f64>,
    #[serde(alias = "MemoryUsage")]
    pub memory_usage: Option<f64>,
    #[serde(alias = "Cores")]
    pub cores: Option<u32>,
    #[serde(alias = "MemoryGB")]
    pub memory_gb: Option<f64>,
    pub migration_strategy: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAppModSummary {
    pub container_ready: Option<bool>,
    pub modernization_feasible: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawAppModFinding {
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAppModResult {
    pub technology: Option<String>,
    pub summary: RawAppModSummary,
    /// Platform key -> compatibility status string.
    pub compatibility: HashMap<String, String>,
    pub recommended_targets: Vec<String>,
    pub findings: Vec<RawAppModFinding>,
    pub blockers: Vec<String>,
}

/// Raw application context file as produced by the context creator.
/// Unknown fields are ignored; every section tolerates list-of-one wrapping.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawContextFile {
    pub app_overview: OneOrMany<RawAppOverview>,
    pub server_details: Vec<RawServerDetail>,
    pub detected_technology_running: Vec<String>,
    pub app_mod_results: OneOrMany<RawAppModResult>,
    pub app_approved_azure_services: Vec<HashMap<String, String>>,
    pub user_answers: HashMap<String, String>,
}

// ============================================================================
// Normalized Application Context
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AppOverview {
    pub application_name: String,
    pub app_type: Option<String>,
    pub business_criticality: BusinessCriticality,
    pub declared_treatment: Option<Treatment>,
    pub declared_time_category: Option<TimeCategory>,
    pub availability_requirement: Option<AvailabilityModel>,
    pub compliance_requirements: Vec<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    pub server_count: usize,
    #[serde(skip)]
    pub migration_strategies: Vec<String>,
    pub environments_present: Vec<String>,
    /// OS family name -> server count.
    pub os_mix: HashMap<String, usize>,
    /// VM readiness value -> server count.
    pub vm_readiness_distribution: HashMap<String, usize>,
    pub utilization_profile: UtilizationProfile,
    pub avg_cpu_usage: Option<f64>,
    pub avg_memory_usage: Option<f64>,
    pub total_cores: u32,
    pub total_memory_gb: f64,
    pub dependency_complexity: DependencyComplexity,
}

impl Default for ServerSummary {
    fn default() -> Self {
        Self {
            server_count: 0,
            migration_strategies: Vec::new(),
            environments_present: Vec::new(),
            os_mix: HashMap::new(),
            vm_readiness_distribution: HashMap::new(),
            utilization_profile: UtilizationProfile::Medium,
            avg_cpu_usage: None,
            avg_memory_usage: None,
            total_cores: 0,
            total_memory_gb: 0.0,
            dependency_complexity: DependencyComplexity::Simple,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectedTechnology {
    pub technologies: Vec<String>,
    pub primary_runtime: Option<String>,
    pub runtime_version: Option<String>,
    pub frameworks: Vec<String>,
    pub database_present: bool,
    pub database_types: Vec<String>,
    pub middleware_present: bool,
    pub middleware_types: Vec<String>,
    pub messaging_present: bool,
    pub messaging_types: Vec<String>,
    pub containerized: bool,
    pub has_ci_cd: bool,
    pub is_windows: bool,
    pub is_linux: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformCompatibility {
    pub platform: String,
    pub status: CompatibilityStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppModResults {
    pub technology: Option<String>,
    pub container_ready: Option<bool>,
    pub modernization_feasible: Option<bool>,
    pub platform_compatibility: Vec<PlatformCompatibility>,
    pub recommended_targets: Vec<String>,
    pub explicit_blockers: Vec<String>,
    pub critical_findings: Vec<String>,
    pub high_severity_findings: Vec<String>,
}

/// Technology -> approved Azure service mappings, merged last-write-wins.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApprovedServices {
    pub mappings: HashMap<String, String>,
}

impl ApprovedServices {
    pub fn all_approved_services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.mappings.values().cloned().collect();
        services.sort();
        services.dedup();
        services
    }
}

/// Fully normalized application context, ready for intent derivation.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationContext {
    pub app_overview: AppOverview,
    pub server_summary: ServerSummary,
    pub detected_technology: DetectedTechnology,
    pub app_mod_results: Option<AppModResults>,
    pub approved_services: ApprovedServices,
    pub user_answers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criticality_parse_lenient() {
        assert_eq!(BusinessCriticality::parse_lenient("Mission Critical"), BusinessCriticality::MissionCritical);
        assert_eq!(BusinessCriticality::parse_lenient("HIGH"), BusinessCriticality::High);
        assert_eq!(BusinessCriticality::parse_lenient("whatever"), BusinessCriticality::Medium);
    }

    #[test]
    fn test_compatibility_parse_lenient() {
        assert_eq!(CompatibilityStatus::parse_lenient("FullySupported"), CompatibilityStatus::FullySupported);
        assert_eq!(CompatibilityStatus::parse_lenient("supported with changes"), CompatibilityStatus::SupportedWithChanges);
        assert_eq!(CompatibilityStatus::parse_lenient("NotSupported"), CompatibilityStatus::NotSupported);
    }

    #[test]
    fn test_raw_context_accepts_single_and_list() {
        let single = r#"{"app_overview": {"application": "billing"}}"#;
        let raw: RawContextFile = serde_json::from_str(single).unwrap();
        assert_eq!(raw.app_overview.into_vec().len(), 1);

        let list = r#"{"app_overview": [{"application": "billing"}]}"#;
        let raw: RawContextFile = serde_json::from_str(list).unwrap();
        assert_eq!(raw.app_overview.into_vec()[0].application, "billing");
    }

    #[test]
    fn test_raw_server_accepts_pascal_case_aliases() {
        let json = r#"{"ServerName": "vm-01", "OperatingSystem": "Windows Server 2019",
                       "CPUUsage": 41.5, "MemoryGB": 16.0, "Cores": 4}"#;
        let server: RawServerDetail = serde_json::from_str(json).unwrap();
        assert_eq!(server.server_name.as_deref(), Some("vm-01"));
        assert_eq!(server.cores, Some(4));
        assert_eq!(server.cpu_usage, Some(41.5));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"app_overview": [], "some_future_section": {"x": 1}}"#;
        let raw: Result<RawContextFile, _> = serde_json::from_str(json);
        assert!(raw.is_ok());
    }
}
