use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_USER_AGENT: &str = "repairdesk-cli";
const DEFAULT_LOG_LEVEL: &str = "info";
const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported configuration format. Use 'yaml', 'json' or 'toml'.")]
    UnsupportedFormat,
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
    #[error("Invalid {name} value: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// On-disk formats understood by [`Config::load_config`] and [`Config::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }

    /// Default file name used when generating a configuration file.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "repairdesk.yaml",
            Self::Json => "repairdesk.json",
            Self::Toml => "repairdesk.toml",
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat),
        }
    }
}

/// How concurrent authorization failures share token refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Every request that hits a 401 issues its own refresh call.
    #[default]
    Independent,
    /// Refreshes are serialized and a completed refresh is reused by waiters.
    Coalesced,
}

impl RefreshPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Coalesced => "coalesced",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "independent" => Ok(Self::Independent),
            "coalesced" => Ok(Self::Coalesced),
            _ => Err("unknown refresh policy"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err("unknown log format"),
        }
    }
}

/// Backend API settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: Url,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Session persistence and refresh settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// File holding the persisted session document.
    pub storage_path: PathBuf,

    /// Refresh sharing policy for concurrent 401 responses.
    pub refresh_policy: RefreshPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_path: default_session_path(),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

/// Logging settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
        }
    }
}

/// The main configuration structure for the RepairDesk client
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to the configuration file.
    /// * `base_url_override` - Optional API base URL taking precedence over everything else.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// override is malformed, or the resolved configuration is invalid.
    pub fn load_config(
        config_path: Option<PathBuf>,
        base_url_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => Self::with_defaults(),
        };
        let defaults = Self::with_defaults();

        // Use environment variables only if values are not already set
        if config.api.base_url == defaults.api.base_url
            && let Ok(value) = env::var("REPAIRDESK_API_BASE_URL")
        {
            config.api.base_url =
                Url::parse(&value).map_err(|err| ConfigError::InvalidEnv {
                    name: "REPAIRDESK_API_BASE_URL",
                    reason: err.to_string(),
                })?;
        }
        if config.logging.level == defaults.logging.level
            && let Ok(level) = env::var("REPAIRDESK_LOG_LEVEL")
        {
            config.logging.level = level;
        }
        if config.logging.format == defaults.logging.format
            && let Ok(format) = env::var("REPAIRDESK_LOG_FORMAT")
        {
            config.logging.format =
                format.parse().map_err(|reason: &str| ConfigError::InvalidEnv {
                    name: "REPAIRDESK_LOG_FORMAT",
                    reason: reason.to_string(),
                })?;
        }
        if config.session.storage_path == defaults.session.storage_path
            && let Ok(path) = env::var("REPAIRDESK_SESSION_PATH")
        {
            config.session.storage_path = PathBuf::from(path);
        }
        if config.session.refresh_policy == defaults.session.refresh_policy
            && let Ok(policy) = env::var("REPAIRDESK_REFRESH_POLICY")
        {
            config.session.refresh_policy =
                policy.parse().map_err(|reason: &str| ConfigError::InvalidEnv {
                    name: "REPAIRDESK_REFRESH_POLICY",
                    reason: reason.to_string(),
                })?;
        }

        // Override with command-line arguments if provided
        if let Some(base_url) = base_url_override {
            config.api.base_url = base_url;
        }

        config.api.base_url = normalize_base_url(config.api.base_url);
        config.validate().map_err(|errors| ConfigError::Invalid(errors.join("; ")))?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or(ConfigError::UnsupportedFormat)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match format {
            ConfigFormat::Yaml => {
                serde_yml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Toml => {
                toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Serialize the configuration in the requested format.
    ///
    /// # Errors
    /// Returns an error if the serializer rejects the configuration.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                serde_yml::to_string(self).map_err(|err| ConfigError::Serialize(err.to_string()))
            }
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|err| ConfigError::Serialize(err.to_string())),
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))
            }
        }
    }

    /// Validate the resolved configuration.
    ///
    /// # Errors
    /// Returns every problem found, one message per entry.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.api.base_url.scheme(), "http" | "https") {
            errors.push(format!(
                "API base URL must use http or https: {}",
                self.api.base_url
            ));
        }

        if self.api.timeout_seconds == 0 {
            errors.push("Invalid request timeout. Must be greater than 0.".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!("Unknown log level: {}", self.logging.level));
        }

        if self.session.storage_path.as_os_str().is_empty() {
            errors.push("Session storage path must not be empty.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Default location of the persisted session document.
#[must_use]
pub fn default_session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("repairdesk").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("./session.json"))
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

/// Ensure the base URL path ends with `/` so relative joins keep its last segment.
#[must_use]
pub fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
