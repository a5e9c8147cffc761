//! Context Normalizer - Phase 1 of the Scoring Engine
//!
//! Converts raw application context files into a typed `ApplicationContext`,
//! absorbing the messy reality of discovery exports.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::catalog::{AvailabilityModel, TimeCategory, Treatment};
use crate::models::context::*;

/// Keyword table entry: canonical name plus matching patterns.
struct PatternTable {
    entries: Vec<(&'static str, Vec<Regex>)>,
}

impl PatternTable {
    fn new(raw: &[(&'static str, &[&str])]) -> Self {
        let entries = raw
            .iter()
            .map(|(name, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){}", p)).expect("invalid pattern"))
                    .collect();
                (*name, compiled)
            })
            .collect();
        Self { entries }
    }

    fn matches(&self, haystack: &str) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| p.is_match(haystack)))
            .map(|(name, _)| *name)
            .collect()
    }
}

static RUNTIME_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::new(&[
        (".NET", &[r"\.net", r"asp\.net", r"c#", r"dotnet"]),
        ("Java", &[r"\bjava\b", r"spring", r"tomcat", r"jboss", r"wildfly"]),
        ("Node.js", &[r"node\.?js", r"express", r"\bnpm\b"]),
        ("Python", &[r"\bpython\b", r"django", r"flask", r"fastapi"]),
        ("PHP", &[r"\bphp\b", r"laravel", r"symfony"]),
        ("Ruby", &[r"\bruby\b", r"rails"]),
        ("Go", &[r"\bgolang\b", r"\bgo\b"]),
    ])
});

static DATABASE_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::new(&[
        ("SQL Server", &[r"sql server", r"mssql", r"microsoft sql"]),
        ("PostgreSQL", &[r"postgres"]),
        ("MySQL", &[r"mysql", r"mariadb"]),
        ("Oracle", &[r"oracle"]),
        ("MongoDB", &[r"mongo"]),
        ("Cosmos DB", &[r"cosmos"]),
        ("Redis", &[r"redis"]),
        ("Access", &[r"microsoft access", r"access database"]),
    ])
});

static MIDDLEWARE_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::new(&[
        ("IIS", &[r"\biis\b", r"internet information"]),
        ("Apache", &[r"apache http", r"httpd"]),
        ("nginx", &[r"nginx"]),
        ("Tomcat", &[r"tomcat"]),
    ])
});

static MESSAGING_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::new(&[
        ("RabbitMQ", &[r"rabbitmq"]),
        ("Kafka", &[r"kafka"]),
        ("ActiveMQ", &[r"activemq"]),
        ("MSMQ", &[r"msmq"]),
        ("Service Bus", &[r"service bus"]),
    ])
});

static CONTAINER_PATTERNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)docker|container|kubernetes|\bk8s\b|openshift").unwrap());

static CI_CD_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)jenkins|azure devops|github actions|gitlab ci|teamcity|bamboo|ci/cd").unwrap()
});

/// First dotted version number in a technology string.
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)*").unwrap());

/// Canonical platform names keyed by the normalized raw key.
static PLATFORM_NORMALIZATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("azure_app_service", "Azure App Service"),
        ("azure_container_apps", "Azure Container Apps"),
        ("azure_kubernetes_service", "Azure Kubernetes Service"),
        ("aks", "Azure Kubernetes Service"),
        ("app_service", "Azure App Service"),
        ("container_apps", "Azure Container Apps"),
        ("aca", "Azure Container Apps"),
    ])
});

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("app_overview is required but empty")]
    MissingAppOverview,
}

/// Normalizes raw context files into a structured `ApplicationContext`.
pub struct ContextNormalizer;

impl ContextNormalizer {
    pub fn normalize(raw: RawContextFile) -> Result<ApplicationContext, NormalizeError> {
        let overviews = raw.app_overview.into_vec();
        let overview = overviews.into_iter().next().ok_or(NormalizeError::MissingAppOverview)?;

        let detected_technology = Self::normalize_technology(&raw.detected_technology_running);
        let server_summary = Self::normalize_servers(&raw.server_details);
        let app_mod_results = raw
            .app_mod_results
            .into_vec()
            .into_iter()
            .next()
            .map(Self::normalize_app_mod);
        let approved_services = Self::normalize_approved_services(raw.app_approved_azure_services);

        Ok(ApplicationContext {
            app_overview: Self::normalize_app_overview(overview),
            server_summary,
            detected_technology,
            app_mod_results,
            approved_services,
            user_answers: raw.user_answers,
        })
    }

    fn normalize_app_overview(raw: RawAppOverview) -> AppOverview {
        let declared_treatment = raw.treatment.as_deref().and_then(Treatment::parse);
        let declared_time_category = raw.time_category.as_deref().and_then(TimeCategory::parse);
        let availability_requirement =
            raw.availability_requirement.as_deref().and_then(AvailabilityModel::parse);

        let business_criticality = raw
            .business_criticality
            .as_deref()
            .map(BusinessCriticality::parse_lenient)
            .unwrap_or(BusinessCriticality::Medium);

        AppOverview {
            application_name: raw.application,
            app_type: raw.app_type,
            business_criticality,
            declared_treatment,
            declared_time_category,
            availability_requirement,
            compliance_requirements: raw.compliance_requirements,
            description: raw.description,
            owner: raw.owner,
        }
    }

    fn normalize_servers(servers: &[RawServerDetail]) -> ServerSummary {
        if servers.is_empty() {
            return ServerSummary::default();
        }

        let mut environments = Vec::new();
        let mut os_counts: HashMap<String, usize> = HashMap::new();
        let mut readiness_counts: HashMap<String, usize> = HashMap::new();
        let mut migration_strategies = Vec::new();
        let mut total_cpu = 0.0;
        let mut total_memory = 0.0;
        let mut cpu_count = 0usize;
        let mut memory_count = 0usize;
        let mut total_cores = 0u32;
        let mut total_memory_gb = 0.0;

        for server in servers {
            if let Some(env) = &server.environment
                && !environments.contains(env)
            {
                environments.push(env.clone());
            }

            if let Some(os) = &server.operating_system {
                let family = Self::classify_os(os);
                *os_counts.entry(family.to_string()).or_default() += 1;
            }

            if let Some(readiness) = &server.azure_vm_readiness {
                let value = VmReadiness::parse_lenient(readiness).as_str().to_string();
                *readiness_counts.entry(value).or_default() += 1;
            }

            if let Some(strategy) = &server.migration_strategy {
                migration_strategies.push(strategy.clone());
            }

            if let Some(cpu) = server.cpu_usage {
                total_cpu += cpu;
                cpu_count += 1;
            }
            if let Some(mem) = server.memory_usage {
                total_memory += mem;
                memory_count += 1;
            }
            if let Some(cores) = server.cores {
                total_cores += cores;
            }
            if let Some(mem_gb) = server.memory_gb {
                total_memory_gb += mem_gb;
            }
        }

        environments.sort();
        let avg_cpu = (cpu_count > 0).then(|| total_cpu / cpu_count as f64);
        let avg_memory = (memory_count > 0).then(|| total_memory / memory_count as f64);
        let utilization_profile = Self::utilization_profile(avg_cpu, avg_memory);
        let dependency_complexity = Self::dependency_complexity(servers.len(), os_counts.len());

        ServerSummary {
            server_count: servers.len(),
            migration_strategies,
            environments_present: environments,
            os_mix: os_counts,
            vm_readiness_distribution: readiness_counts,
            utilization_profile,
            avg_cpu_usage: avg_cpu,
            avg_memory_usage: avg_memory,
            total_cores,
            total_memory_gb,
            dependency_complexity,
        }
    }

    /// Classify an OS string into Windows/Linux/Other families.
    fn classify_os(os: &str) -> &'static str {
        let lower = os.to_lowercase();
        if lower.contains("windows") {
            "Windows"
        } else if ["linux", "ubuntu", "centos", "rhel", "debian", "suse"]
            .iter()
            .any(|family| lower.contains(family))
        {
            "Linux"
        } else {
            "Other"
        }
    }

    /// Utilization profile from the maximum of mean CPU and mean memory:
    /// <30% low, <70% medium, else high.
    fn utilization_profile(avg_cpu: Option<f64>, avg_memory: Option<f64>) -> UtilizationProfile {
        if avg_cpu.is_none() && avg_memory.is_none() {
            return UtilizationProfile::Medium;
        }
        let max_util = avg_cpu.unwrap_or(0.0).max(avg_memory.unwrap_or(0.0));
        if max_util < 30.0 {
            UtilizationProfile::Low
        } else if max_util < 70.0 {
            UtilizationProfile::Medium
        } else {
            UtilizationProfile::High
        }
    }

    /// 1 server simple; <=3 single-OS simple; <=5 moderate; else complex.
    fn dependency_complexity(server_count: usize, os_families: usize) -> DependencyComplexity {
        if server_count == 1 {
            DependencyComplexity::Simple
        } else if server_count <= 3 && os_families <= 1 {
            DependencyComplexity::Simple
        } else if server_count <= 5 {
            DependencyComplexity::Moderate
        } else {
            DependencyComplexity::Complex
        }
    }

    fn normalize_technology(technologies: &[String]) -> DetectedTechnology {
        let all_tech_text = technologies.join(" ");

        // Primary runtime: first table entry that matches, plus version from
        // the matching technology string.
        let runtimes = RUNTIME_PATTERNS.matches(&all_tech_text);
        let primary_runtime = runtimes.first().map(|r| r.to_string());
        let mut runtime_version = None;
        let mut frameworks = Vec::new();

        if let Some(runtime) = &primary_runtime {
            let patterns: Vec<&Regex> = RUNTIME_PATTERNS
                .entries
                .iter()
                .find(|(name, _)| name == runtime)
                .map(|(_, p)| p.iter().collect())
                .unwrap_or_default();
            for tech in technologies {
                if patterns.iter().any(|p| p.is_match(tech)) {
                    if runtime_version.is_none()
                        && let Some(m) = VERSION_REGEX.find(tech)
                    {
                        runtime_version = Some(m.as_str().to_string());
                    }
                    // Items that mention the runtime but carry more than a
                    // bare name/version are treated as frameworks.
                    let stripped = VERSION_REGEX.replace_all(tech, "");
                    if stripped.trim().to_lowercase() != runtime.to_lowercase() {
                        frameworks.push(tech.clone());
                    }
                }
            }
        }

        let database_types: Vec<String> =
            DATABASE_PATTERNS.matches(&all_tech_text).iter().map(|s| s.to_string()).collect();
        let middleware_types: Vec<String> =
            MIDDLEWARE_PATTERNS.matches(&all_tech_text).iter().map(|s| s.to_string()).collect();
        let messaging_types: Vec<String> =
            MESSAGING_PATTERNS.matches(&all_tech_text).iter().map(|s| s.to_string()).collect();

        let containerized = CONTAINER_PATTERNS.is_match(&all_tech_text);
        let has_ci_cd = CI_CD_PATTERNS.is_match(&all_tech_text);

        let lower = all_tech_text.to_lowercase();
        let is_windows = lower.contains("iis")
            || lower.contains("asp.net")
            || lower.contains(".net framework")
            || lower.contains("windows");
        let is_linux = lower.contains("ubuntu")
            || lower.contains("centos")
            || lower.contains("linux")
            || (matches!(primary_runtime.as_deref(), Some("Java" | "Node.js" | "Python"))
                && !is_windows);

        DetectedTechnology {
            technologies: technologies.to_vec(),
            primary_runtime,
            runtime_version,
            frameworks,
            database_present: !database_types.is_empty(),
            database_types,
            middleware_present: !middleware_types.is_empty(),
            middleware_types,
            messaging_present: !messaging_types.is_empty(),
            messaging_types,
            containerized,
            has_ci_cd,
            is_windows,
            is_linux,
        }
    }

    fn normalize_app_mod(raw: RawAppModResult) -> AppModResults {
        let mut platform_compatibility: Vec<PlatformCompatibility> = raw
            .compatibility
            .iter()
            .map(|(platform, status)| PlatformCompatibility {
                platform: Self::normalize_platform_name(platform),
                status: CompatibilityStatus::parse_lenient(status),
            })
            .collect();
        platform_compatibility.sort_by(|a, b| a.platform.cmp(&b.platform));

        let mut critical_findings = Vec::new();
        let mut high_severity_findings = Vec::new();
        for finding in &raw.findings {
            match finding.severity.to_lowercase().as_str() {
                "critical" => critical_findings.push(finding.description.clone()),
                "high" => high_severity_findings.push(finding.description.clone()),
                _ => {},
            }
        }

        AppModResults {
            technology: raw.technology,
            container_ready: raw.summary.container_ready,
            modernization_feasible: raw.summary.modernization_feasible,
            platform_compatibility,
            recommended_targets: raw.recommended_targets,
            explicit_blockers: raw.blockers,
            critical_findings,
            high_severity_findings,
        }
    }

    /// Normalize platform names to their canonical form before scoring.
    pub fn normalize_platform_name(platform: &str) -> String {
        let key = platform.trim().to_lowercase().replace(['-', ' '], "_");
        PLATFORM_NORMALIZATIONS
            .get(key.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| platform.to_string())
    }

    /// Merge approved-service dictionaries; last write wins.
    fn normalize_approved_services(dicts: Vec<HashMap<String, String>>) -> ApprovedServices {
        let mut mappings = HashMap::new();
        for dict in dicts {
            mappings.extend(dict);
        }
        ApprovedServices { mappings }
    }
}

/// Parse and normalize a context file's JSON content. A one-element list
/// wrapping the object is accepted.
pub fn parse_context(content: &str) -> Result<ApplicationContext, String> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("not valid JSON: {}", e))?;

    let object = match value {
        serde_json::Value::Array(items) => {
            if items.len() != 1 {
                return Err(format!("expected exactly 1 context object, got {}", items.len()));
            }
            items.into_iter().next().unwrap()
        },
        other => other,
    };

    let raw: RawContextFile =
        serde_json::from_value(object).map_err(|e| format!("bad context shape: {}", e))?;
    ContextNormalizer::normalize(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(os: &str, cpu: f64, mem: f64) -> RawServerDetail {
        RawServerDetail {
            operating_system: Some(os.to_string()),
            cpu_usage: Some(cpu),
            memory_usage: Some(mem),
            ..Default::default()
        }
    }

    #[test]
    fn test_utilization_profile_thresholds() {
        assert_eq!(
            ContextNormalizer::utilization_profile(Some(10.0), Some(20.0)),
            UtilizationProfile::Low
        );
        assert_eq!(
            ContextNormalizer::utilization_profile(Some(29.0), Some(69.0)),
            UtilizationProfile::Medium
        );
        assert_eq!(
            ContextNormalizer::utilization_profile(Some(20.0), Some(80.0)),
            UtilizationProfile::High
        );
        assert_eq!(
            ContextNormalizer::utilization_profile(None, None),
            UtilizationProfile::Medium
        );
    }

    #[test]
    fn test_dependency_complexity_ladder() {
        assert_eq!(ContextNormalizer::dependency_complexity(1, 1), DependencyComplexity::Simple);
        assert_eq!(ContextNormalizer::dependency_complexity(3, 1), DependencyComplexity::Simple);
        assert_eq!(ContextNormalizer::dependency_complexity(3, 2), DependencyComplexity::Moderate);
        assert_eq!(ContextNormalizer::dependency_complexity(5, 1), DependencyComplexity::Moderate);
        assert_eq!(ContextNormalizer::dependency_complexity(6, 1), DependencyComplexity::Complex);
    }

    #[test]
    fn test_os_mix_case_insensitive() {
        let servers = vec![
            server("WINDOWS Server 2019", 40.0, 50.0),
            server("Ubuntu 22.04 LTS", 20.0, 30.0),
            server("windows server 2016", 60.0, 50.0),
        ];
        let summary = ContextNormalizer::normalize_servers(&servers);
        assert_eq!(summary.os_mix.get("Windows"), Some(&2));
        assert_eq!(summary.os_mix.get("Linux"), Some(&1));
    }

    #[test]
    fn test_technology_detection_with_version() {
        let techs = vec![
            "Java 11".to_string(),
            "Spring Boot 2.7.4".to_string(),
            "PostgreSQL 14".to_string(),
            "RabbitMQ".to_string(),
            "Jenkins".to_string(),
        ];
        let tech = ContextNormalizer::normalize_technology(&techs);
        assert_eq!(tech.primary_runtime.as_deref(), Some("Java"));
        assert_eq!(tech.runtime_version.as_deref(), Some("11"));
        assert!(tech.database_present);
        assert_eq!(tech.database_types, vec!["PostgreSQL"]);
        assert!(tech.messaging_present);
        assert!(tech.has_ci_cd);
        assert!(tech.is_linux);
        assert!(!tech.is_windows);
        assert!(tech.frameworks.iter().any(|f| f.contains("Spring")));
    }

    #[test]
    fn test_platform_name_normalization() {
        assert_eq!(
            ContextNormalizer::normalize_platform_name("aks"),
            "Azure Kubernetes Service"
        );
        assert_eq!(
            ContextNormalizer::normalize_platform_name("app-service"),
            "Azure App Service"
        );
        assert_eq!(
            ContextNormalizer::normalize_platform_name("Some Future Platform"),
            "Some Future Platform"
        );
    }

    #[test]
    fn test_approved_services_last_write_wins() {
        let dicts = vec![
            HashMap::from([("mysql".to_string(), "Azure SQL".to_string())]),
            HashMap::from([("mysql".to_string(), "Azure Database for MySQL".to_string())]),
        ];
        let approved = ContextNormalizer::normalize_approved_services(dicts);
        assert_eq!(
            approved.mappings.get("mysql").map(String::as_str),
            Some("Azure Database for MySQL")
        );
    }

    #[test]
    fn test_parse_context_list_of_one() {
        let json = r#"[{"app_overview": {"application": "crm", "treatment": "Rehost"}}]"#;
        let context = parse_context(json).unwrap();
        assert_eq!(context.app_overview.application_name, "crm");
        assert_eq!(context.app_overview.declared_treatment, Some(Treatment::Rehost));
    }

    #[test]
    fn test_parse_context_rejects_multi_element_list() {
        let json = r#"[{"app_overview": {"application": "a"}}, {"app_overview": {"application": "b"}}]"#;
        assert!(parse_context(json).is_err());
    }

    #[test]
    fn test_unknown_treatment_becomes_none() {
        let json = r#"{"app_overview": {"application": "crm", "treatment": "lift-everything"}}"#;
        let context = parse_context(json).unwrap();
        assert_eq!(context.app_overview.declared_treatment, None);
    }
}
