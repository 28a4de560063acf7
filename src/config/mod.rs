pub mod validation;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Upstream API endpoints and identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_details_url")]
    pub model_details_url: String,
    #[serde(default = "default_model_details_provider")]
    pub model_details_provider: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.synthetic.new/openai/v1".to_string()
}
fn default_model_details_url() -> String {
    "https://models.dev/api.json".to_string()
}
fn default_model_details_provider() -> String {
    "synthetic".to_string()
}
fn default_user_agent() -> String {
    "partstream/0.1".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_api_key_env() -> String {
    "PARTSTREAM_API_KEY".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model_details_url: default_model_details_url(),
            model_details_provider: default_model_details_provider(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Fallback generation limits applied when a model has no hydrated details
/// and the host supplies no overriding options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_context_length")]
    pub context_length: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_context_length() -> u64 {
    128_000
}
fn default_max_output_tokens() -> u64 {
    16_000
}
fn default_max_tokens() -> u64 {
    4_096
}
fn default_temperature() -> f64 {
    0.7
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            max_output_tokens: default_max_output_tokens(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Feature switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether the host can render a distinct thinking part type. When
    /// false, reasoning content degrades to plain text.
    #[serde(default = "default_thinking_parts")]
    pub thinking_parts: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_thinking_parts() -> bool {
    true
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            thinking_parts: default_thinking_parts(),
        }
    }
}

/// Full provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    /// Per-model temperature overrides (0..=2), keyed by model id.
    #[serde(default)]
    pub model_temperatures: FxHashMap<String, f64>,
}

impl ProviderConfig {
    /// The configured temperature override for `model_id`, if any.
    #[must_use]
    pub fn model_temperature(&self, model_id: &str) -> Option<f64> {
        self.model_temperatures.get(model_id).copied()
    }
}

/// Load and validate configuration from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, is not valid YAML,
/// or fails validation.
pub fn load_config(path: &str) -> Result<ProviderConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config: ProviderConfig = serde_yaml::from_str(&raw)?;
    validate_config(&config)?;
    Ok(config)
}
