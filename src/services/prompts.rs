//! Prompt Resolution and Templates
//!
//! Persona instructions are assembled from markdown section files resolved
//! provider-first, and response templates are markdown files injected as
//! system messages for a single turn.
//!
//! Section lookup priority for persona `p` and provider `v`:
//!   1. `{p}/{v}/{SECTION}.md`
//!   2. `{p}/{SECTION}.md`
//!   3. `core/{v}/{SECTION}.md`
//!   4. `core/{SECTION}.md`
//! Missing sections are treated as empty.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Section names, concatenated in this order.
const SECTIONS: [&str; 6] =
    ["ROLE", "RESPONSIBILITIES", "TOOLS", "DATA", "STYLE", "FINAL_NOTE"];

const DEFAULT_FOLDER: &str = "core";

/// Named variables substituted into prompts and templates.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    pub migration_target: String,
    pub data_schema: String,
}

impl PromptVars {
    pub fn apply(&self, text: &str) -> String {
        text.replace("{{MIGRATION_TARGET}}", &self.migration_target)
            .replace("{{DATA_SCHEMA}}", &self.data_schema)
    }
}

// ============================================================================
// Persona Instructions
// ============================================================================

/// Loads persona instruction sections from a prompts directory tree.
pub struct PromptLibrary {
    root: PathBuf,
}

impl PromptLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if !root.exists() {
            tracing::warn!("Prompts directory '{}' does not exist", root.display());
        }
        Self { root }
    }

    /// Resolve one section following the lookup priority order.
    fn resolve_section(&self, persona: &str, provider: &str, section: &str) -> Option<String> {
        let candidates = [
            self.root.join(persona).join(provider),
            self.root.join(persona),
            self.root.join(DEFAULT_FOLDER).join(provider),
            self.root.join(DEFAULT_FOLDER),
        ];

        for dir in candidates {
            let path = dir.join(format!("{}.md", section));
            if path.exists()
                && let Ok(content) = std::fs::read_to_string(&path)
            {
                return Some(content.trim().to_string());
            }
        }
        None
    }

    /// Assemble the full instructions for a persona: the six sections in
    /// order, joined by blank lines, with variables substituted.
    pub fn instructions(&self, persona: &str, provider: &str, vars: &PromptVars) -> String {
        let sections: Vec<String> = SECTIONS
            .iter()
            .filter_map(|section| self.resolve_section(persona, provider, section))
            .collect();
        vars.apply(sections.join("\n\n").trim())
    }
}

// ============================================================================
// Response Templates
// ============================================================================

/// A named response template injectable as a per-turn system message.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub prompt: String,
}

impl Template {
    /// Render the template as system message content.
    pub fn to_system_content(&self, vars: &PromptVars) -> String {
        vars.apply(&self.prompt)
    }
}

/// Loads and serves response templates from a directory of markdown files.
///
/// Each file has a `# DESCRIPTION` section followed by a
/// `# RESPONSE TEMPLATE` section; the name is the file stem.
pub struct TemplateLibrary {
    templates: BTreeMap<String, Template>,
}

impl TemplateLibrary {
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut templates = BTreeMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!("Templates directory '{}' does not exist", dir.display());
                return Self { templates };
            },
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match Self::parse_file(&path) {
                Ok(template) => {
                    templates.insert(template.name.clone(), template);
                },
                Err(e) => {
                    tracing::warn!("Skipping template '{}': {}", path.display(), e);
                },
            }
        }

        tracing::info!("Loaded templates: {:?}", templates.keys().collect::<Vec<_>>());
        Self { templates }
    }

    pub fn empty() -> Self {
        Self { templates: BTreeMap::new() }
    }

    fn parse_file(path: &Path) -> Result<Template, String> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or("bad file name")?
            .to_string();
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;

        let Some((description, template)) = text.split_once("# RESPONSE TEMPLATE") else {
            return Err("missing '# RESPONSE TEMPLATE' section".to_string());
        };
        let description = description.replace("# DESCRIPTION", "").trim().to_string();
        let prompt = format!("# RESPONSE TEMPLATE\n{}", template.trim());

        Ok(Template { name, description, prompt })
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Catalog prompt listing all templates with their descriptions.
    pub fn catalog_prompt(&self) -> String {
        let mut lines = vec!["Available Templates:\n".to_string()];
        for template in self.templates.values() {
            lines.push(format!("### {}\n{}\n", template.name, template.description));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_section_priority_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "core/ROLE.md", "core role");
        write(root, "core/claude/ROLE.md", "core claude role");
        write(root, "financial_planner/ROLE.md", "planner role");
        write(root, "financial_planner/claude/ROLE.md", "planner claude role");

        let library = PromptLibrary::new(root);
        let vars = PromptVars::default();

        assert_eq!(
            library.instructions("financial_planner", "claude", &vars),
            "planner claude role"
        );
        assert_eq!(
            library.instructions("financial_planner", "openai", &vars),
            "planner role"
        );
        assert_eq!(library.instructions("core", "claude", &vars), "core claude role");
        assert_eq!(library.instructions("migration_engineer", "gemini", &vars), "core role");
    }

    #[test]
    fn test_sections_concatenate_in_order_with_missing_treated_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "core/ROLE.md", "You work on {{MIGRATION_TARGET}}.");
        write(root, "core/STYLE.md", "Be concise.");

        let library = PromptLibrary::new(root);
        let vars = PromptVars { migration_target: "Azure".into(), data_schema: String::new() };
        let instructions = library.instructions("core", "openai", &vars);

        assert_eq!(instructions, "You work on Azure.\n\nBe concise.");
    }

    #[test]
    fn test_template_parsing_and_substitution() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "wave_plan.md",
            "# DESCRIPTION\nPlan migration waves.\n\n# RESPONSE TEMPLATE\nTarget: {{MIGRATION_TARGET}}",
        );

        let library = TemplateLibrary::load(tmp.path());
        let template = library.get("wave_plan").unwrap();
        assert_eq!(template.description, "Plan migration waves.");

        let vars = PromptVars { migration_target: "Azure".into(), data_schema: String::new() };
        let content = template.to_system_content(&vars);
        assert!(content.starts_with("# RESPONSE TEMPLATE"));
        assert!(content.contains("Target: Azure"));
    }

    #[test]
    fn test_template_without_marker_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "broken.md", "# DESCRIPTION\nonly a description");

        let library = TemplateLibrary::load(tmp.path());
        assert!(library.get("broken").is_none());
    }

    #[test]
    fn test_missing_directories_yield_empty_results() {
        let library = PromptLibrary::new("/nonexistent/prompts");
        assert_eq!(
            library.instructions("core", "openai", &PromptVars::default()),
            ""
        );
        let templates = TemplateLibrary::load("/nonexistent/templates");
        assert!(templates.is_empty());
    }
}
