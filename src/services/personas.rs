//! Agent Personas
//!
//! Closed catalog of persona configurations. Each persona binds an
//! instructions builder (via the prompt library), a tool set, and a
//! capability tag. Personas are added by extending this catalog.

use serde::{Deserialize, Serialize};

/// Tool sets a persona can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toolset {
    /// Data querying and visualization tools only.
    Data,
    /// Data tools plus the architecture recommendation tools.
    DataAndArchitecture,
}

/// A named agent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Core,
    ProjectManager,
    SystemArchitect,
    FinancialPlanner,
    NetworkSpecialist,
    MigrationEngineer,
}

impl Persona {
    pub const ALL: [Persona; 6] = [
        Persona::Core,
        Persona::ProjectManager,
        Persona::SystemArchitect,
        Persona::FinancialPlanner,
        Persona::NetworkSpecialist,
        Persona::MigrationEngineer,
    ];

    /// Stable identifier used in state, prompts directories, and delegation.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::ProjectManager => "project_manager",
            Self::SystemArchitect => "system_architect",
            Self::FinancialPlanner => "financial_planner",
            Self::NetworkSpecialist => "network_specialist",
            Self::MigrationEngineer => "migration_engineer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Core => "Core",
            Self::ProjectManager => "Project Manager",
            Self::SystemArchitect => "System Architect",
            Self::FinancialPlanner => "Financial Planner",
            Self::NetworkSpecialist => "Network Specialist",
            Self::MigrationEngineer => "Migration Engineer",
        }
    }

    /// One-line description used in the delegation catalog.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Core => "Default generalist agent for cross-cutting migration queries",
            Self::ProjectManager => {
                "Plan migration waves, track progress, and coordinate stakeholders"
            },
            Self::SystemArchitect => {
                "Design cloud architecture and recommend target architectures for applications"
            },
            Self::FinancialPlanner => {
                "Analyze migration costs, savings opportunities, and budget planning"
            },
            Self::NetworkSpecialist => {
                "Assess network infrastructure, connectivity, and traffic dependencies"
            },
            Self::MigrationEngineer => {
                "Execute migrations and resolve technical blockers server by server"
            },
        }
    }

    /// Capability tag recorded on telemetry spans.
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Core => "general",
            Self::ProjectManager => "planning",
            Self::SystemArchitect => "architecture",
            Self::FinancialPlanner => "finance",
            Self::NetworkSpecialist => "network",
            Self::MigrationEngineer => "execution",
        }
    }

    pub fn toolset(&self) -> Toolset {
        match self {
            Self::SystemArchitect => Toolset::DataAndArchitecture,
            _ => Toolset::Data,
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        let normalized = id.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|p| p.id() == normalized)
    }

    /// A brief of the available personas, used to build the delegation
    /// instructions at runtime.
    pub fn brief() -> String {
        let mut lines = vec!["The available agents are:".to_string()];
        for persona in Self::ALL {
            lines.push(format!("- **{}**: {}", persona.id(), persona.description()));
        }
        lines.push(
            "Choose the agent that is best suited to answer the user's question based on their \
             description. If you are unsure, choose the core agent."
                .to_string(),
        );
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_spaces_and_case() {
        assert_eq!(Persona::parse("System Architect"), Some(Persona::SystemArchitect));
        assert_eq!(Persona::parse("core"), Some(Persona::Core));
        assert_eq!(Persona::parse("project-manager"), Some(Persona::ProjectManager));
        assert_eq!(Persona::parse("wizard"), None);
    }

    #[test]
    fn test_only_architect_gets_architecture_tools() {
        for persona in Persona::ALL {
            let expected = persona == Persona::SystemArchitect;
            assert_eq!(persona.toolset() == Toolset::DataAndArchitecture, expected);
        }
    }

    #[test]
    fn test_brief_lists_every_persona() {
        let brief = Persona::brief();
        for persona in Persona::ALL {
            assert!(brief.contains(persona.id()));
        }
    }
}
