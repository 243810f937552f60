//! Configuration management for snow-agent
//!
//! Configuration is layered: an optional YAML file, then environment
//! variables, then CLI flags. Credentials are normally supplied through the
//! environment only and are never written back out when a config is
//! serialized.

use crate::error::{Result, SnowAgentError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for snow-agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote instance connection settings
    #[serde(default)]
    pub servicenow: ServiceNowConfig,
    /// Planner backend settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Agent loop behavior
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Connection settings for the ServiceNow instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNowConfig {
    /// Instance name or URL (`dev12345`, `dev12345.service-now.com` or a full URL)
    #[serde(default)]
    pub instance: String,

    /// Basic-auth user name
    #[serde(default)]
    pub username: String,

    /// Basic-auth password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Explicit base URL, overriding the one derived from `instance`
    ///
    /// Lets tests point the gateway at a mock server.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_servicenow_timeout")]
    pub timeout_seconds: u64,
}

fn default_servicenow_timeout() -> u64 {
    30
}

impl Default for ServiceNowConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            username: String::new(),
            password: String::new(),
            api_base: None,
            timeout_seconds: default_servicenow_timeout(),
        }
    }
}

impl ServiceNowConfig {
    /// Base URL of the instance, without a trailing slash
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::config::ServiceNowConfig;
    ///
    /// let config = ServiceNowConfig {
    ///     instance: "https://dev12345.service-now.com/".to_string(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(config.base_url(), "https://dev12345.service-now.com");
    /// ```
    pub fn base_url(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.service-now.com",
                normalize_instance(&self.instance)
            ),
        }
    }

    /// Bare instance name, for display
    pub fn instance_name(&self) -> String {
        normalize_instance(&self.instance)
    }
}

/// Reduce an instance setting to its bare name
///
/// Strips any scheme, the `.service-now.com` suffix and trailing slashes.
///
/// # Examples
///
/// ```
/// use snow_agent::config::normalize_instance;
///
/// assert_eq!(normalize_instance("dev12345"), "dev12345");
/// assert_eq!(normalize_instance("http://dev12345.service-now.com"), "dev12345");
/// ```
pub fn normalize_instance(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_slash = without_scheme.trim_end_matches('/');
    without_slash
        .strip_suffix(".service-now.com")
        .unwrap_or(without_slash)
        .to_string()
}

/// Planner backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend to use: `anthropic` or `ollama`
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Anthropic Messages API settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Ollama settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Cap on the characters of one operation result shown to the planner
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_provider_type() -> String {
    "anthropic".to_string()
}

fn default_max_result_chars() -> usize {
    20_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            anthropic: AnthropicConfig::default(),
            ollama: OllamaConfig::default(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// Anthropic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key, normally from `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Output token cap per planner call
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,

    /// Optional API base URL (useful for tests and local mocks)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Request timeout
    #[serde(default = "default_anthropic_timeout")]
    pub timeout_seconds: u64,
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    8192
}

fn default_anthropic_timeout() -> u64 {
    120
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
            api_base: None,
            timeout_seconds: default_anthropic_timeout(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum planner invocations per user turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Print each operation and its result while a turn runs
    #[serde(default = "default_show_operations")]
    pub show_operations: bool,
}

fn default_max_rounds() -> usize {
    50
}

fn default_show_operations() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            show_operations: default_show_operations(),
        }
    }
}

const VALID_PROVIDERS: [&str; 2] = ["anthropic", "ollama"];

impl Config {
    /// Load configuration from file, environment and CLI
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line, applied last
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SnowAgentError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SnowAgentError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Credentials
        if let Ok(instance) = std::env::var("SNOW_INSTANCE") {
            self.servicenow.instance = instance;
        }

        if let Ok(username) = std::env::var("SNOW_USERNAME") {
            self.servicenow.username = username;
        }

        if let Ok(password) = std::env::var("SNOW_PASSWORD") {
            self.servicenow.password = password;
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            self.provider.anthropic.api_key = api_key;
        }

        // Provider overrides
        if let Ok(provider_type) = std::env::var("SNOW_AGENT_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("SNOW_AGENT_MODEL") {
            match self.provider.provider_type.as_str() {
                "ollama" => self.provider.ollama.model = model,
                _ => self.provider.anthropic.model = model,
            }
        }

        if let Ok(host) = std::env::var("SNOW_AGENT_OLLAMA_HOST") {
            self.provider.ollama.host = host;
        }

        // Agent overrides
        if let Ok(max_rounds) = std::env::var("SNOW_AGENT_MAX_ROUNDS") {
            if let Ok(value) = max_rounds.parse() {
                self.agent.max_rounds = value;
            } else {
                tracing::warn!("Invalid SNOW_AGENT_MAX_ROUNDS: {}", max_rounds);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(max_rounds) = cli.max_rounds {
            tracing::debug!(max_rounds, "CLI override: max_rounds");
            self.agent.max_rounds = max_rounds;
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// Credentials are not checked here; see [`Config::require_credentials`].
    ///
    /// # Errors
    ///
    /// Returns a [`SnowAgentError::Config`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if !VALID_PROVIDERS.contains(&self.provider.provider_type.as_str()) {
            return Err(SnowAgentError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                VALID_PROVIDERS.join(", ")
            ))
            .into());
        }

        if self.agent.max_rounds == 0 {
            return Err(
                SnowAgentError::Config("max_rounds must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_rounds > 1000 {
            return Err(SnowAgentError::Config(
                "max_rounds must be less than or equal to 1000".to_string(),
            )
            .into());
        }

        if self.servicenow.timeout_seconds == 0 {
            return Err(SnowAgentError::Config(
                "servicenow.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.provider.max_result_chars == 0 {
            return Err(SnowAgentError::Config(
                "provider.max_result_chars must be greater than 0".to_string(),
            )
            .into());
        }

        if self.provider.provider_type == "anthropic" && self.provider.anthropic.max_tokens == 0 {
            return Err(SnowAgentError::Config(
                "anthropic.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if let Some(base) = &self.servicenow.api_base {
            url::Url::parse(base).map_err(|e| {
                SnowAgentError::Config(format!("Invalid servicenow.api_base '{}': {}", base, e))
            })?;
        }

        Ok(())
    }

    /// Check that every credential needed to start a session is present
    ///
    /// # Errors
    ///
    /// Returns [`SnowAgentError::MissingCredentials`] naming every missing
    /// environment variable
    pub fn require_credentials(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.servicenow.instance.trim().is_empty() && self.servicenow.api_base.is_none() {
            missing.push("SNOW_INSTANCE");
        }
        if self.servicenow.username.is_empty() {
            missing.push("SNOW_USERNAME");
        }
        if self.servicenow.password.is_empty() {
            missing.push("SNOW_PASSWORD");
        }
        if self.provider.provider_type == "anthropic" && self.provider.anthropic.api_key.is_empty()
        {
            missing.push("ANTHROPIC_API_KEY");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SnowAgentError::MissingCredentials(missing.join(", ")).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use serial_test::serial;

    const ENV_VARS: [&str; 8] = [
        "SNOW_INSTANCE",
        "SNOW_USERNAME",
        "SNOW_PASSWORD",
        "ANTHROPIC_API_KEY",
        "SNOW_AGENT_PROVIDER",
        "SNOW_AGENT_MODEL",
        "SNOW_AGENT_MAX_ROUNDS",
        "SNOW_AGENT_OLLAMA_HOST",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn credentialed() -> Config {
        let mut config = Config::default();
        config.servicenow.instance = "dev12345".to_string();
        config.servicenow.username = "admin".to_string();
        config.servicenow.password = "secret".to_string();
        config.provider.anthropic.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.provider_type, "anthropic");
        assert_eq!(config.agent.max_rounds, 50);
        assert_eq!(config.servicenow.timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalize_instance_variants() {
        assert_eq!(normalize_instance("dev1"), "dev1");
        assert_eq!(normalize_instance("dev1.service-now.com"), "dev1");
        assert_eq!(normalize_instance("https://dev1.service-now.com/"), "dev1");
        assert_eq!(normalize_instance("  http://dev1  "), "dev1");
    }

    #[test]
    fn test_base_url_prefers_api_base() {
        let config = ServiceNowConfig {
            instance: "dev1".to_string(),
            api_base: Some("http://127.0.0.1:8080/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = Config::default();
        config.provider.provider_type = "copilot".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid provider type"));
    }

    #[test]
    fn test_config_validation_zero_max_rounds() {
        let mut config = Config::default();
        config.agent.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_max_rounds_too_large() {
        let mut config = Config::default();
        config.agent.max_rounds = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_api_base() {
        let mut config = Config::default();
        config.servicenow.api_base = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_credentials_lists_all_missing() {
        let config = Config::default();
        let err = config.require_credentials().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SNOW_INSTANCE"));
        assert!(msg.contains("SNOW_USERNAME"));
        assert!(msg.contains("SNOW_PASSWORD"));
        assert!(msg.contains("ANTHROPIC_API_KEY"));
        assert!(matches!(
            err.downcast_ref::<SnowAgentError>(),
            Some(SnowAgentError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_require_credentials_ollama_needs_no_api_key() {
        let mut config = credentialed();
        config.provider.provider_type = "ollama".to_string();
        config.provider.anthropic.api_key.clear();
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn test_require_credentials_complete() {
        assert!(credentialed().require_credentials().is_ok());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let yaml = serde_yaml::to_string(&credentialed()).unwrap();
        assert!(!yaml.contains("secret"));
        assert!(!yaml.contains("sk-test"));
        assert!(yaml.contains("dev12345"));
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
servicenow:
  instance: dev999
  timeout_seconds: 10
provider:
  type: ollama
  ollama:
    host: http://ollama:11434
    model: qwen2.5
agent:
  max_rounds: 12
  show_operations: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.servicenow.instance, "dev999");
        assert_eq!(config.servicenow.timeout_seconds, 10);
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.provider.ollama.model, "qwen2.5");
        assert_eq!(config.provider.max_result_chars, 20_000);
        assert_eq!(config.agent.max_rounds, 12);
        assert!(!config.agent.show_operations);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults_and_env() {
        clear_env();
        std::env::set_var("SNOW_INSTANCE", "https://dev777.service-now.com");
        std::env::set_var("SNOW_USERNAME", "admin");
        std::env::set_var("SNOW_PASSWORD", "pw");
        std::env::set_var("ANTHROPIC_API_KEY", "key");

        let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();
        assert_eq!(config.servicenow.instance_name(), "dev777");
        assert_eq!(config.servicenow.password, "pw");
        assert!(config.require_credentials().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_and_cli_overrides_env() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "agent:\n  max_rounds: 5\nprovider:\n  type: anthropic\n").unwrap();

        std::env::set_var("SNOW_AGENT_MAX_ROUNDS", "7");
        std::env::set_var("SNOW_AGENT_PROVIDER", "ollama");
        std::env::set_var("SNOW_AGENT_MODEL", "mistral");

        let path = path.to_string_lossy().to_string();
        let config = Config::load(&path, &Cli::default()).unwrap();
        assert_eq!(config.agent.max_rounds, 7);
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.provider.ollama.model, "mistral");

        let cli = Cli {
            max_rounds: Some(3),
            ..Cli::default()
        };
        let config = Config::load(&path, &cli).unwrap();
        assert_eq!(config.agent.max_rounds, 3);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_max_rounds_is_ignored() {
        clear_env();
        std::env::set_var("SNOW_AGENT_MAX_ROUNDS", "lots");
        let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();
        assert_eq!(config.agent.max_rounds, 50);
        clear_env();
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "agent: [unclosed").unwrap();
        let err = Config::from_file(&path.to_string_lossy()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
