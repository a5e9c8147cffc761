//! Architecture Catalog Models
//!
//! Core data structures for the versioned architecture catalog, including
//! classification enums, per-entry metadata, and the catalog container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Classification Enums
// ============================================================================

/// Migration/modernization treatment for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Treatment {
    Rehost,
    Replatform,
    Refactor,
    Rebuild,
    Replace,
    Retain,
    Tolerate,
    Retire,
}

impl Treatment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rehost => "rehost",
            Self::Replatform => "replatform",
            Self::Refactor => "refactor",
            Self::Rebuild => "rebuild",
            Self::Replace => "replace",
            Self::Retain => "retain",
            Self::Tolerate => "tolerate",
            Self::Retire => "retire",
        }
    }

    /// Parse a free-form declared treatment. Unknown strings map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rehost" => Some(Self::Rehost),
            "replatform" => Some(Self::Replatform),
            "refactor" => Some(Self::Refactor),
            "rebuild" => Some(Self::Rebuild),
            "replace" => Some(Self::Replace),
            "retain" => Some(Self::Retain),
            "tolerate" => Some(Self::Tolerate),
            "retire" => Some(Self::Retire),
            _ => None,
        }
    }
}

/// Strategic time/investment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeCategory {
    Tolerate,
    Migrate,
    Invest,
    Eliminate,
}

impl TimeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tolerate => "tolerate",
            Self::Migrate => "migrate",
            Self::Invest => "invest",
            Self::Eliminate => "eliminate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tolerate" => Some(Self::Tolerate),
            "migrate" => Some(Self::Migrate),
            "invest" => Some(Self::Invest),
            "eliminate" => Some(Self::Eliminate),
            _ => None,
        }
    }
}

/// Expected runtime model for an architecture or an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeModel {
    Monolith,
    NTier,
    Api,
    Microservices,
    EventDriven,
    Batch,
    Mixed,
    Unknown,
}

impl RuntimeModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monolith => "monolith",
            Self::NTier => "n_tier",
            Self::Api => "api",
            Self::Microservices => "microservices",
            Self::EventDriven => "event_driven",
            Self::Batch => "batch",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }
}

/// Availability deployment model, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityModel {
    SingleRegion,
    ZoneRedundant,
    MultiRegionActivePassive,
    MultiRegionActiveActive,
}

impl AvailabilityModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleRegion => "single_region",
            Self::ZoneRedundant => "zone_redundant",
            Self::MultiRegionActivePassive => "multi_region_active_passive",
            Self::MultiRegionActiveActive => "multi_region_active_active",
        }
    }

    /// Position in the availability hierarchy.
    pub fn rank(&self) -> u8 {
        match self {
            Self::SingleRegion => 0,
            Self::ZoneRedundant => 1,
            Self::MultiRegionActivePassive => 2,
            Self::MultiRegionActiveActive => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "single_region" => Some(Self::SingleRegion),
            "zone_redundant" => Some(Self::ZoneRedundant),
            "multi_region_active_passive" => Some(Self::MultiRegionActivePassive),
            "multi_region_active_active" => Some(Self::MultiRegionActiveActive),
            _ => None,
        }
    }
}

/// Security level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Basic,
    Enterprise,
    Regulated,
    HighlyRegulated,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Enterprise => "enterprise",
            Self::Regulated => "regulated",
            Self::HighlyRegulated => "highly_regulated",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Basic => 0,
            Self::Enterprise => 1,
            Self::Regulated => 2,
            Self::HighlyRegulated => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "enterprise" => Some(Self::Enterprise),
            "regulated" => Some(Self::Regulated),
            "highly_regulated" => Some(Self::HighlyRegulated),
            _ => None,
        }
    }
}

/// Operating model maturity, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingModel {
    TraditionalIt,
    Transitional,
    Devops,
    Sre,
}

impl OperatingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TraditionalIt => "traditional_it",
            Self::Transitional => "transitional",
            Self::Devops => "devops",
            Self::Sre => "sre",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::TraditionalIt => 0,
            Self::Transitional => 1,
            Self::Devops => 2,
            Self::Sre => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "traditional_it" => Some(Self::TraditionalIt),
            "transitional" => Some(Self::Transitional),
            "devops" => Some(Self::Devops),
            "sre" => Some(Self::Sre),
            _ => None,
        }
    }
}

/// Cost optimization profile, ordered by willingness to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostProfile {
    CostMinimized,
    Balanced,
    ScaleOptimized,
    InnovationFirst,
}

impl CostProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostMinimized => "cost_minimized",
            Self::Balanced => "balanced",
            Self::ScaleOptimized => "scale_optimized",
            Self::InnovationFirst => "innovation_first",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::CostMinimized => 0,
            Self::Balanced => 1,
            Self::ScaleOptimized => 2,
            Self::InnovationFirst => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cost_minimized" => Some(Self::CostMinimized),
            "balanced" => Some(Self::Balanced),
            "scale_optimized" => Some(Self::ScaleOptimized),
            "innovation_first" => Some(Self::InnovationFirst),
            _ => None,
        }
    }
}

/// Implementation/operations complexity rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// Provenance of a catalog entry, which affects score weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogQuality {
    Curated,
    AiEnriched,
    AiSuggested,
    ExampleOnly,
}

impl CatalogQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curated => "curated",
            Self::AiEnriched => "ai_enriched",
            Self::AiSuggested => "ai_suggested",
            Self::ExampleOnly => "example_only",
        }
    }
}

/// Architecture family classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchitectureFamily {
    Foundation,
    Iaas,
    Paas,
    CloudNative,
    Data,
    Integration,
    Specialized,
}

/// Workload domain classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadDomain {
    Web,
    Data,
    Integration,
    Security,
    Ai,
    Infrastructure,
    General,
}

/// Closed set of scenarios an architecture is explicitly not suitable for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotSuitableFor {
    RehostOnly,
    TolerateOnly,
    SingleVmWorkloads,
    GreenfieldOnly,
    SimpleWorkloads,
    WindowsOnly,
    LinuxOnly,
    NoContainerExperience,
    StatefulApps,
}

impl NotSuitableFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RehostOnly => "rehost_only",
            Self::TolerateOnly => "tolerate_only",
            Self::SingleVmWorkloads => "single_vm_workloads",
            Self::GreenfieldOnly => "greenfield_only",
            Self::SimpleWorkloads => "simple_workloads",
            Self::WindowsOnly => "windows_only",
            Self::LinuxOnly => "linux_only",
            Self::NoContainerExperience => "no_container_experience",
            Self::StatefulApps => "stateful_apps",
        }
    }
}

/// Confidence attached to an extracted/classified catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionConfidence {
    Automatic,
    AiSuggested,
    ManualRequired,
}

// ============================================================================
// Catalog Entry
// ============================================================================

/// Metadata about how a classification value was determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMeta {
    pub confidence: ExtractionConfidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Default for ClassificationMeta {
    fn default() -> Self {
        Self { confidence: ExtractionConfidence::ManualRequired, source: None }
    }
}

/// Expected architectural characteristics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedCharacteristics {
    pub containers: Option<bool>,
    pub stateless: Option<bool>,
    pub devops_required: bool,
    pub ci_cd_required: bool,
    pub private_networking_required: bool,
}

/// Complexity ratings for implementation and operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Complexity {
    pub implementation: ComplexityLevel,
    pub operations: ComplexityLevel,
}

impl Default for Complexity {
    fn default() -> Self {
        Self { implementation: ComplexityLevel::Medium, operations: ComplexityLevel::Medium }
    }
}

impl Complexity {
    /// The binding complexity of the architecture (max of impl and ops).
    pub fn max_level(&self) -> ComplexityLevel {
        if self.operations.rank() > self.implementation.rank() {
            self.operations
        } else {
            self.implementation
        }
    }
}

/// Complete architecture catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureEntry {
    // Identity
    pub architecture_id: String,
    pub name: String,
    #[serde(default)]
    pub pattern_name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub diagram_assets: Vec<String>,

    // Classification
    #[serde(default = "default_family")]
    pub family: ArchitectureFamily,
    #[serde(default)]
    pub family_confidence: ClassificationMeta,
    #[serde(default = "default_domain")]
    pub workload_domain: WorkloadDomain,
    #[serde(default)]
    pub workload_domain_confidence: ClassificationMeta,
    #[serde(default = "default_runtime_models")]
    pub expected_runtime_models: Vec<RuntimeModel>,
    #[serde(default)]
    pub runtime_models_confidence: ClassificationMeta,
    #[serde(default)]
    pub expected_characteristics: ExpectedCharacteristics,

    // Supported change models
    #[serde(default)]
    pub supported_treatments: Vec<Treatment>,
    #[serde(default)]
    pub supported_time_categories: Vec<TimeCategory>,

    // Operational requirements
    #[serde(default = "default_availability")]
    pub availability_models: Vec<AvailabilityModel>,
    #[serde(default)]
    pub availability_confidence: ClassificationMeta,
    #[serde(default = "default_security")]
    pub security_level: SecurityLevel,
    #[serde(default = "default_operating_model")]
    pub operating_model_required: OperatingModel,

    // Cost & complexity
    #[serde(default = "default_cost_profile")]
    pub cost_profile: CostProfile,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub complexity_confidence: ClassificationMeta,

    // Exclusion rules
    #[serde(default)]
    pub not_suitable_for: Vec<NotSuitableFor>,

    // Services and discovery metadata
    #[serde(default)]
    pub core_services: Vec<String>,
    #[serde(default)]
    pub supporting_services: Vec<String>,
    #[serde(default)]
    pub browse_tags: Vec<String>,

    // Provenance
    #[serde(default = "default_quality")]
    pub catalog_quality: CatalogQuality,
}

fn default_family() -> ArchitectureFamily {
    ArchitectureFamily::Foundation
}
fn default_domain() -> WorkloadDomain {
    WorkloadDomain::General
}
fn default_runtime_models() -> Vec<RuntimeModel> {
    vec![RuntimeModel::Unknown]
}
fn default_availability() -> Vec<AvailabilityModel> {
    vec![AvailabilityModel::SingleRegion]
}
fn default_security() -> SecurityLevel {
    SecurityLevel::Basic
}
fn default_operating_model() -> OperatingModel {
    OperatingModel::TraditionalIt
}
fn default_cost_profile() -> CostProfile {
    CostProfile::Balanced
}
fn default_quality() -> CatalogQuality {
    CatalogQuality::AiSuggested
}

impl ArchitectureEntry {
    /// All referenced services, core first.
    pub fn all_services(&self) -> impl Iterator<Item = &String> {
        self.core_services.iter().chain(self.supporting_services.iter())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Complete architecture catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureCatalog {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_repo: Option<String>,
    pub architectures: Vec<ArchitectureEntry>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ArchitectureCatalog {
    pub fn len(&self) -> usize {
        self.architectures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.architectures.is_empty()
    }
}
