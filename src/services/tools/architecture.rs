//! Architecture Recommendation Tools
//!
//! Bridges the persona agents to the scoring engine: loads application
//! context files from the configured directory, runs the pipeline, and
//! renders a compact summary for the model.

use std::path::PathBuf;

use crate::models::recommendation::ScoringResult;
use crate::services::scoring::{ScoringEngine, parse_context};

/// Serves architecture recommendations against a loaded catalog.
pub struct Recommender {
    engine: ScoringEngine,
    contexts_dir: Option<PathBuf>,
}

impl Recommender {
    pub fn new(engine: ScoringEngine, contexts_dir: Option<PathBuf>) -> Self {
        Self { engine, contexts_dir }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Applications with a context file available for scoring.
    pub fn list_applications(&self) -> Vec<String> {
        let Some(dir) = &self.contexts_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|x| x.to_str()) == Some("json") {
                    path.file_stem().and_then(|s| s.to_str()).map(String::from)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }

    /// Score a named application from its context file.
    pub fn recommend(&self, application: &str) -> Result<ScoringResult, String> {
        let Some(dir) = &self.contexts_dir else {
            return Err("no application context directory is configured".to_string());
        };

        // Context files are named after the application; path segments in
        // the name are rejected.
        let safe_name: String = application
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = dir.join(format!("{}.json", safe_name));

        let content = std::fs::read_to_string(&path).map_err(|_| {
            format!(
                "no context file for application '{}'. Available applications: {:?}",
                application,
                self.list_applications()
            )
        })?;

        let context = parse_context(&content)?;
        Ok(self.engine.score_context(&context))
    }

    /// Compact textual summary of a scoring result for model consumption.
    pub fn summarize(result: &ScoringResult) -> String {
        let mut out = format!(
            "Scored '{}' against catalog v{} ({} entries): {} eligible, {} excluded.\n",
            result.application_name,
            result.catalog_version,
            result.catalog_architecture_count,
            result.eligible_count,
            result.excluded_count
        );

        out.push_str(&format!(
            "Derived treatment: {} ({} confidence, {}).\n",
            result.derived_intent.treatment.value.as_str(),
            result.derived_intent.treatment.confidence.as_str(),
            result.derived_intent.treatment.source
        ));

        for (i, rec) in result.recommendations.iter().take(5).enumerate() {
            out.push_str(&format!(
                "{}. {} (score {:.1}, quality {})\n",
                i + 1,
                rec.name,
                rec.likelihood_score,
                rec.catalog_quality.as_str()
            ));
            if let Some(fit) = rec.fit_summary.first() {
                out.push_str(&format!("   Fit: {}\n", fit));
            }
            if let Some(struggle) = rec.struggle_summary.first() {
                out.push_str(&format!("   Concern: {}\n", struggle));
            }
        }

        if !result.excluded.is_empty() {
            out.push_str("Excluded:\n");
            for ex in result.excluded.iter().take(5) {
                let reason = ex
                    .reasons
                    .first()
                    .map(|r| r.description.as_str())
                    .unwrap_or("unspecified");
                out.push_str(&format!("- {}: {}\n", ex.name, reason));
            }
        }

        if result.questions_pending {
            out.push_str(&format!(
                "{} clarification question(s) pending; answers would sharpen the scores.\n",
                result.clarification_questions.len()
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{ArchitectureCatalog, ArchitectureEntry};

    fn engine() -> ScoringEngine {
        let entry: ArchitectureEntry = serde_json::from_value(serde_json::json!({
            "architecture_id": "web-basic",
            "name": "Basic Web App",
            "description": "Zonal web application",
        }))
        .unwrap();
        ScoringEngine::new(ArchitectureCatalog {
            version: "1.0.0".into(),
            generated_at: None,
            source_repo: None,
            architectures: vec![entry],
        })
    }

    #[test]
    fn test_recommend_from_context_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("billing.json"),
            r#"{"app_overview": {"application": "billing", "treatment": "rehost"}}"#,
        )
        .unwrap();

        let recommender = Recommender::new(engine(), Some(tmp.path().to_path_buf()));
        assert_eq!(recommender.list_applications(), vec!["billing"]);

        let result = recommender.recommend("billing").unwrap();
        assert_eq!(result.application_name, "billing");
        assert_eq!(result.catalog_architecture_count, 1);

        let summary = Recommender::summarize(&result);
        assert!(summary.contains("billing"));
        assert!(summary.contains("Basic Web App"));
    }

    #[test]
    fn test_unknown_application_lists_available() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("billing.json"),
            r#"{"app_overview": {"application": "billing"}}"#,
        )
        .unwrap();

        let recommender = Recommender::new(engine(), Some(tmp.path().to_path_buf()));
        let err = recommender.recommend("payroll").unwrap_err();
        assert!(err.contains("billing"));
    }

    #[test]
    fn test_path_segments_in_names_are_sanitized() {
        let tmp = tempfile::tempdir().unwrap();
        let recommender = Recommender::new(engine(), Some(tmp.path().to_path_buf()));
        let err = recommender.recommend("../../etc/passwd").unwrap_err();
        assert!(err.contains("no context file"));
    }
}
