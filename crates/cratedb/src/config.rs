//! Provider settings and their resolution.
//!
//! Each setting comes from explicit configuration when present, otherwise
//! from the environment. An explicit value always wins, even an empty one.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigProblem, Error, Result};
use crate::retry::RetryConfig;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "CRATEDB_API_KEY";
/// Environment variable holding the API secret.
pub const ENV_API_SECRET: &str = "CRATEDB_API_SECRET";
/// Environment variable holding the API base URL.
pub const ENV_URL: &str = "CRATEDB_URL";

/// Settings as written in the `[provider]` table.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// API key.
    pub api_key: Option<String>,
    /// API secret.
    pub api_secret: Option<String>,
    /// Base URL, e.g. `https://console.cratedb.cloud`.
    pub url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Fully resolved client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key.
    pub api_key: String,
    /// API secret. Never logged.
    pub api_secret: String,
    /// Base URL without trailing slash.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for transport failures and retryable statuses.
    pub retry: RetryConfig,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

impl ClientConfig {
    /// Resolve settings against the process environment.
    pub fn from_env(settings: &ProviderSettings) -> Result<Self> {
        Self::resolve(settings, |name| std::env::var(name).ok())
    }

    /// Resolve settings, looking up absent values with `env`.
    ///
    /// Every missing value is reported in one [`Error::Config`].
    pub fn resolve(settings: &ProviderSettings, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pick = |explicit: &Option<String>, var: &str| {
            explicit.clone().or_else(|| env(var)).unwrap_or_default()
        };

        let api_key = pick(&settings.api_key, ENV_API_KEY);
        let api_secret = pick(&settings.api_secret, ENV_API_SECRET);
        let url = pick(&settings.url, ENV_URL);

        let mut problems = Vec::new();
        if api_key.is_empty() {
            problems.push(missing("api_key", "API Key", ENV_API_KEY));
        }
        if api_secret.is_empty() {
            problems.push(missing("api_secret", "API Secret", ENV_API_SECRET));
        }
        if url.is_empty() {
            problems.push(missing("url", "Cloud URL", ENV_URL));
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            problems.push(ConfigProblem {
                field: "url",
                summary: "Invalid CrateDB Cloud URL".to_string(),
                detail: format!("'{}' must start with http:// or https://", url),
            });
        }

        if !problems.is_empty() {
            return Err(Error::Config { problems });
        }

        Ok(Self {
            api_key,
            api_secret,
            url: url.trim_end_matches('/').to_string(),
            timeout: settings
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            retry: RetryConfig::default(),
        })
    }
}

fn missing(field: &'static str, what: &str, var: &str) -> ConfigProblem {
    ConfigProblem {
        field,
        summary: format!("Missing CrateDB {}", what),
        detail: format!(
            "There is a missing or empty value for the CrateDB {what}. \
             Set the {field} value in the configuration or use the {var} environment variable. \
             If either is already set, ensure the value is not empty."
        ),
    }
}
