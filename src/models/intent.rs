//! Derived Intent Models
//!
//! Signals inferred from the application context, each carrying a value,
//! a confidence level, the evidence source, and a short reasoning sentence.

use serde::{Deserialize, Serialize};

use super::catalog::{
    AvailabilityModel, CostProfile, OperatingModel, RuntimeModel, SecurityLevel, TimeCategory,
    Treatment,
};

// ============================================================================
// Signal Value Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalConfidence {
    High,
    Medium,
    Low,
    Unknown,
}

impl SignalConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    /// Higher means more certain.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn is_uncertain(&self) -> bool {
        matches!(self, Self::Low | Self::Unknown)
    }
}

/// How far an application can feasibly be modernized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModernizationDepth {
    Tolerate,
    Rehost,
    Replatform,
    Refactor,
    Rebuild,
}

impl ModernizationDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tolerate => "tolerate",
            Self::Rehost => "rehost",
            Self::Replatform => "replatform",
            Self::Refactor => "refactor",
            Self::Rebuild => "rebuild",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudNativeFeasibility {
    Low,
    Medium,
    High,
}

impl CloudNativeFeasibility {
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
pub enum NetworkExposure {
    External,
    Internal,
    Mixed,
}

impl NetworkExposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "external" => Some(Self::External),
            "internal" => Some(Self::Internal),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

// ============================================================================
// Derived Signals
// ============================================================================

/// A single inferred signal: value plus the evidence trail behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedSignal<T> {
    pub value: T,
    pub confidence: SignalConfidence,
    /// Short token identifying the evidence used (e.g. "declared_treatment").
    pub source: String,
    /// One-sentence explanation of the inference.
    pub reasoning: String,
}

impl<T> DerivedSignal<T> {
    pub fn new(
        value: T,
        confidence: SignalConfidence,
        source: &str,
        reasoning: impl Into<String>,
    ) -> Self {
        Self { value, confidence, source: source.to_string(), reasoning: reasoning.into() }
    }

    /// Override the signal with a user-provided answer.
    pub fn override_with(&mut self, value: T, dimension_label: &str) {
        self.value = value;
        self.confidence = SignalConfidence::High;
        self.source = "user_answer".to_string();
        self.reasoning = format!("User specified {}", dimension_label);
    }
}

/// The complete set of derived intent signals. Every signal is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedIntent {
    pub treatment: DerivedSignal<Treatment>,
    pub time_category: DerivedSignal<TimeCategory>,
    pub likely_runtime_model: DerivedSignal<RuntimeModel>,
    pub modernization_depth_feasible: DerivedSignal<ModernizationDepth>,
    pub cloud_native_feasibility: DerivedSignal<CloudNativeFeasibility>,
    pub operational_maturity_estimate: DerivedSignal<OperatingModel>,
    pub availability_requirement: DerivedSignal<AvailabilityModel>,
    pub security_requirement: DerivedSignal<SecurityLevel>,
    pub cost_posture: DerivedSignal<CostProfile>,
    pub network_exposure: DerivedSignal<NetworkExposure>,
}

// ============================================================================
// Clarification Questions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ClarificationOption {
    pub fn new(value: &str, label: &str, description: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub question_id: String,
    pub dimension: String,
    pub question_text: String,
    pub options: Vec<ClarificationOption>,
    pub required: bool,
    pub affects_eligibility: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_inference: Option<String>,
    pub inference_confidence: SignalConfidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_rank_order() {
        assert!(SignalConfidence::High.rank() > SignalConfidence::Medium.rank());
        assert!(SignalConfidence::Medium.rank() > SignalConfidence::Low.rank());
        assert!(SignalConfidence::Low.rank() > SignalConfidence::Unknown.rank());
    }

    #[test]
    fn test_override_with_sets_user_answer() {
        let mut signal = DerivedSignal::new(
            Treatment::Rehost,
            SignalConfidence::Low,
            "default",
            "No explicit treatment signal",
        );
        signal.override_with(Treatment::Refactor, "treatment");
        assert_eq!(signal.value, Treatment::Refactor);
        assert_eq!(signal.confidence, SignalConfidence::High);
        assert_eq!(signal.source, "user_answer");
        assert_eq!(signal.reasoning, "User specified treatment");
    }

    #[test]
    fn test_signal_serializes_value_inline() {
        let signal = DerivedSignal::new(
            NetworkExposure::External,
            SignalConfidence::Low,
            "app_type",
            "App type suggests external-facing",
        );
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["value"], "external");
        assert_eq!(json["confidence"], "low");
    }
}
