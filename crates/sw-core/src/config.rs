//! Worker configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default freshness window for cached API responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("version must be at least 1")]
    InvalidVersion,

    #[error("ttl_ms must be greater than zero")]
    InvalidTtl,

    #[error("intercept pattern #{0} is empty and would match every URL")]
    EmptyInterceptPattern(usize),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("version {version} is not newer than deployed version {current}")]
    StaleVersion { version: u32, current: u32 },
}

/// Immutable configuration handed to a worker at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Deployment version; bumped on every release.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Freshness window in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// URL substrings that select requests for caching.
    ///
    /// `/ap/v1/blogs` is kept exactly as deployed even though it reads like
    /// a typo for `/api/v1/blogs`; override it here to change behaviour.
    #[serde(default = "default_intercept")]
    pub intercept: Vec<String>,

    /// Origins allowed to send control messages.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Active environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Environment-specific overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentOverride>,
}

fn default_version() -> u32 {
    1
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

/// Default interception substrings.
pub fn default_intercept() -> Vec<String> {
    vec!["/ap/v1/blogs".to_string(), "/api/model.json".to_string()]
}

/// Default control-message origins.
pub fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "https://www.yourdomain.com".to_string(),
    ]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            ttl_ms: default_ttl_ms(),
            intercept: default_intercept(),
            allowed_origins: default_allowed_origins(),
            environment: EnvironmentConfig::default(),
            environments: BTreeMap::new(),
        }
    }
}

impl WorkerConfig {
    /// Create a default configuration for the given version.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Set the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Replace the interception substrings.
    pub fn with_intercept<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intercept = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the allowed control-message origins.
    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the active environment.
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = environment;
        self
    }

    /// Freshness window as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Resolve the configuration for a named environment.
    ///
    /// The base configuration is used as-is and any fields set in
    /// `environments.<name>` replace it.
    pub fn for_environment(&self, name: &str) -> Result<WorkerConfig, ConfigError> {
        let mut config = self.clone();
        config.environment.name = name.to_string();

        if name == self.environment.name {
            return Ok(config);
        }

        let overrides = self
            .environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?;

        if let Some(ref url) = overrides.base_api_url {
            config.environment.base_api_url = url.clone();
        }
        if let Some(ttl_ms) = overrides.ttl_ms {
            config.ttl_ms = ttl_ms;
        }
        if let Some(ref intercept) = overrides.intercept {
            config.intercept = intercept.clone();
        }
        if let Some(ref origins) = overrides.allowed_origins {
            config.allowed_origins = origins.clone();
        }

        Ok(config)
    }

    /// Check the configuration for values the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion);
        }
        if self.ttl_ms == 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if let Some(index) = self.intercept.iter().position(|p| p.is_empty()) {
            return Err(ConfigError::EmptyInterceptPattern(index));
        }
        Ok(())
    }
}

/// Environment supplied by the application shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (e.g. "local", "production").
    #[serde(default = "default_environment_name")]
    pub name: String,

    /// Base URL of the API the application talks to.
    #[serde(default = "default_base_api_url")]
    pub base_api_url: String,
}

fn default_environment_name() -> String {
    "local".to_string()
}

fn default_base_api_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
            base_api_url: default_base_api_url(),
        }
    }
}

impl EnvironmentConfig {
    /// Create an environment.
    pub fn new(name: impl Into<String>, base_api_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_api_url: base_api_url.into(),
        }
    }

    /// Join a path onto the base API URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();

        assert_eq!(config.version, 1);
        assert_eq!(config.ttl(), Duration::from_secs(7200));
        assert_eq!(config.intercept, vec!["/ap/v1/blogs", "/api/model.json"]);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://www.yourdomain.com"]
        );
        assert_eq!(config.environment.name, "local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert_eq!(WorkerConfig::new(0).validate(), Err(ConfigError::InvalidVersion));
        assert_eq!(
            WorkerConfig::new(1).with_ttl(Duration::ZERO).validate(),
            Err(ConfigError::InvalidTtl)
        );
        assert_eq!(
            WorkerConfig::new(1).with_intercept(["/api", ""]).validate(),
            Err(ConfigError::EmptyInterceptPattern(1))
        );
    }

    #[test]
    fn test_for_environment_merges_overrides() {
        let mut config = WorkerConfig::new(3);
        config.environments.insert(
            "production".to_string(),
            EnvironmentOverride {
                base_api_url: Some("https://api.yourdomain.com".to_string()),
                ttl_ms: Some(60_000),
                ..Default::default()
            },
        );

        let prod = config.for_environment("production").unwrap();
        assert_eq!(prod.environment.name, "production");
        assert_eq!(prod.environment.base_api_url, "https://api.yourdomain.com");
        assert_eq!(prod.ttl_ms, 60_000);
        assert_eq!(prod.intercept, config.intercept);
        assert_eq!(prod.version, 3);
    }

    #[test]
    fn test_for_environment_unknown() {
        let config = WorkerConfig::default();

        assert!(config.for_environment("local").is_ok());
        assert_eq!(
            config.for_environment("staging"),
            Err(ConfigError::UnknownEnvironment("staging".to_string()))
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WorkerConfig = serde_json::from_str(r#"{"version": 7}"#).unwrap();

        assert_eq!(config.version, 7);
        assert_eq!(config.intercept, default_intercept());
    }

    #[test]
    fn test_environment_url() {
        let env = EnvironmentConfig::new("local", "http://localhost:3000/");
        assert_eq!(env.url("/api/model.json"), "http://localhost:3000/api/model.json");
    }
}
