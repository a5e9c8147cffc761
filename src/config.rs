use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub agents: AgentsConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub quota: QuotaConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Agent runtime configuration: provider selection, model tiers, prompt
/// locations, and the architecture catalog used by the recommendation tools.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Deployment mode: "dev" or "prod".
    pub mode: String,
    /// Target cloud for identity/endpoint discovery: "azure", "aws", "gcp".
    pub cloud: String,
    /// LLM provider family used for prompt resolution: "openai", "claude", "gemini".
    pub llm_provider: String,
    /// Default tier used for persona agents.
    pub default_tier: String,
    /// Advisory flag requesting the provider's priority service tier.
    /// Providers may ignore it.
    pub turbo: bool,
    /// Target cloud name substituted into prompts as {{MIGRATION_TARGET}}.
    pub migration_target: String,

    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model used for persona agents (main tier).
    pub model_main: String,
    /// Model used for pre/post-processing helpers (light tier).
    pub model_light: String,
    /// Per-call timeout for light tier calls, seconds.
    pub light_timeout_secs: u64,
    /// Per-call timeout for main persona calls, seconds.
    pub main_timeout_secs: u64,

    /// Root directory for persona prompt sections.
    pub prompts_dir: String,
    /// Directory for response templates.
    pub templates_dir: String,

    /// Path to the architecture catalog JSON. Unset disables the
    /// recommendation toolset.
    pub catalog_path: Option<String>,
    /// Directory of application context files for scoring.
    pub contexts_dir: Option<String>,

    /// If set, bypasses auto-delegation for every request.
    pub force_persona: Option<String>,
    /// Whether the template agent runs during pre-processing.
    pub apply_templates: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Line-delimited JSON usage log, replayed into the quota tracker at startup.
    pub usage_log_file: String,
    /// Optional remote append sink for usage records.
    pub remote_usage_sink: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Rolling-window token limit per user. None disables the limit.
    pub daily_token_limit: Option<u64>,
    /// Rolling window length in hours.
    pub window_hours: u64,
    /// Whether quota breaches reject requests.
    pub enforce: bool,
}

/// Connection parameters for the external analytical store. The in-process
/// reference store ignores these.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    /// Environment variable holding the password.
    pub password_env: String,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "waypoint")]
#[command(version, about = "Waypoint - Migration Assistant Backend")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Logging level (overrides config file, e.g., "info,waypoint=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force a specific persona, bypassing auto-delegation
    #[arg(long, value_name = "PERSONA")]
    pub persona: Option<String>,

    /// Request the provider's priority service tier (advisory)
    #[arg(long)]
    pub turbo: bool,

    /// Usage log file path (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub usage_log_file: Option<String>,

    /// Architecture catalog path (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub catalog_path: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with_args(cli_args)
    }

    /// Load with pre-parsed arguments (used in tests).
    pub fn load_with_args(cli_args: CommandLineArgs) -> Result<Self, anyhow::Error> {
        // 1. Load from config file (use CLI --config if provided, otherwise find default)
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        // 2. Override with environment variables
        config.apply_env_overrides();

        // 3. Override with command line arguments (highest priority)
        config.apply_cli_overrides(&cli_args);

        // 4. Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST: Server host (default: 0.0.0.0)
    /// - APP_SERVER_PORT: Server port (default: 8002)
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,waypoint=debug")
    /// - APP_LLM_API_BASE: OpenAI-compatible API base URL
    /// - APP_DAILY_TOKEN_LIMIT: Rolling-window token limit per user
    /// - APP_ENFORCE_QUOTA: Enable quota enforcement (true/false)
    /// - APP_USAGE_LOG_FILE: Usage log path
    /// - APP_CATALOG_PATH: Architecture catalog path
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(api_base) = std::env::var("APP_LLM_API_BASE") {
            self.agents.api_base = api_base;
            tracing::info!("Override agents.api_base from env");
        }

        if let Ok(limit) = std::env::var("APP_DAILY_TOKEN_LIMIT") {
            match limit.parse() {
                Ok(val) => {
                    self.quota.daily_token_limit = Some(val);
                    tracing::info!("Override quota.daily_token_limit from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_DAILY_TOKEN_LIMIT '{}': {} (keep {:?})",
                    limit,
                    e,
                    self.quota.daily_token_limit
                ),
            }
        }

        if let Ok(enforce) = std::env::var("APP_ENFORCE_QUOTA")
            && let Ok(val) = enforce.parse()
        {
            self.quota.enforce = val;
            tracing::info!("Override quota.enforce from env: {}", self.quota.enforce);
        }

        if let Ok(path) = std::env::var("APP_USAGE_LOG_FILE") {
            self.telemetry.usage_log_file = path;
            tracing::info!("Override telemetry.usage_log_file from env");
        }

        if let Ok(path) = std::env::var("APP_CATALOG_PATH") {
            self.agents.catalog_path = Some(path);
            tracing::info!("Override agents.catalog_path from env");
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(persona) = &args.persona {
            self.agents.force_persona = Some(persona.clone());
            tracing::info!("Override agents.force_persona from CLI: {}", persona);
        }

        if args.turbo {
            self.agents.turbo = true;
            tracing::info!("Override agents.turbo from CLI: true");
        }

        if let Some(path) = &args.usage_log_file {
            self.telemetry.usage_log_file = path.clone();
            tracing::info!("Override telemetry.usage_log_file from CLI");
        }

        if let Some(path) = &args.catalog_path {
            self.agents.catalog_path = Some(path.clone());
            tracing::info!("Override agents.catalog_path from CLI");
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.quota.window_hours == 0 {
            anyhow::bail!("quota.window_hours must be > 0");
        }

        if self.quota.enforce && self.quota.daily_token_limit.is_none() {
            anyhow::bail!("quota.enforce requires quota.daily_token_limit to be set");
        }

        if self.agents.light_timeout_secs == 0 || self.agents.main_timeout_secs == 0 {
            anyhow::bail!("agents LLM timeouts must be > 0");
        }

        match self.agents.llm_provider.as_str() {
            "openai" | "claude" | "gemini" => {},
            other => anyhow::bail!("Unsupported agents.llm_provider: {}", other),
        }

        if self.agents.turbo {
            tracing::info!(
                "Turbo mode requested for provider '{}' (advisory; provider may ignore it)",
                self.agents.llm_provider
            );
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8002 }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            mode: "dev".to_string(),
            cloud: "azure".to_string(),
            llm_provider: "openai".to_string(),
            default_tier: "main".to_string(),
            turbo: false,
            migration_target: "Azure".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "WAYPOINT_LLM_API_KEY".to_string(),
            model_main: "gpt-4o".to_string(),
            model_light: "gpt-4o-mini".to_string(),
            light_timeout_secs: 20,
            main_timeout_secs: 120,
            prompts_dir: "prompts".to_string(),
            templates_dir: "prompts/templates".to_string(),
            catalog_path: None,
            contexts_dir: None,
            force_persona: None,
            apply_templates: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,waypoint=debug".to_string(),
            file: Some("logs/waypoint.log".to_string()),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { usage_log_file: "logs/usage.jsonl".to_string(), remote_usage_sink: None }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { daily_token_limit: None, window_hours: 24, enforce: false }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "waypoint".to_string(),
            database: "migration".to_string(),
            password_env: "WAYPOINT_DB_PASSWORD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enforce_without_limit_is_invalid() {
        let mut config = Config::default();
        config.quota.enforce = true;
        config.quota.daily_token_limit = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_is_invalid() {
        let mut config = Config::default();
        config.agents.llm_provider = "mistral".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_section_parsing() {
        let toml_str = r#"
            [server]
            port = 9000

            [quota]
            daily_token_limit = 1000
            window_hours = 24
            enforce = true

            [agents]
            llm_provider = "claude"
            turbo = true
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.quota.daily_token_limit, Some(1000));
        assert!(config.quota.enforce);
        assert_eq!(config.agents.llm_provider, "claude");
        assert!(config.agents.turbo);
        assert!(config.validate().is_ok());
    }
}
