//! Provider configuration: API key and base URL.
//!
//! The key comes from an explicit value (CLI flag) or the `GLM_API_KEY`
//! environment variable and is held in a [`SecretString`] so it never shows
//! up in debug output. The base URL defaults to the production endpoint and
//! can be overridden with `GLM_BASE_URL`.

use secrecy::SecretString;
use serde::Serialize;

/// Production chat-completions endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GLM_API_KEY";
/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "GLM_BASE_URL";

/// Read-only configuration shared by all queries.
#[derive(Clone)]
pub struct ProviderConfig {
    api_key: Option<SecretString>,
    base_url: String,
}

impl ProviderConfig {
    /// Creates a config with an explicit key (or none), reading the base-URL
    /// override from the environment.
    #[must_use]
    pub fn new(api_key: Option<SecretString>) -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self { api_key, base_url }
    }

    /// Creates a config entirely from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|key| SecretString::new(key.into()));
        Self::new(api_key)
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the API key, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    /// Returns true when a key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Checks the configuration without any network access.
    #[must_use]
    pub fn validate(&self) -> ConfigReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !self.has_api_key() {
            errors.push(format!(
                "no API key configured; set {API_KEY_ENV} or pass --api-key"
            ));
        }
        if !self.base_url.starts_with("https://") {
            warnings.push(format!(
                "base URL '{}' is not HTTPS; the API key will be sent in cleartext",
                self.base_url
            ));
        }
        if self.base_url() != DEFAULT_BASE_URL {
            warnings.push(format!(
                "using non-default base URL '{}'",
                self.base_url()
            ));
        }

        ConfigReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Reports installation status. Offline: `authenticated` means a key is
    /// present, no probe request is made.
    #[must_use]
    pub fn detect_installation(&self) -> InstallationStatus {
        let has_api_key = self.has_api_key();
        InstallationStatus {
            installed: true,
            has_api_key,
            authenticated: has_api_key,
            error: if has_api_key {
                None
            } else {
                Some(format!("{API_KEY_ENV} is not set"))
            },
        }
    }
}

/// Result of [`ProviderConfig::validate`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigReport {
    /// True when there are no errors.
    pub valid: bool,
    /// Problems that prevent queries from running.
    pub errors: Vec<String>,
    /// Problems worth surfacing but not fatal.
    pub warnings: Vec<String>,
}

/// Result of [`ProviderConfig::detect_installation`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstallationStatus {
    /// Always true; the adapter is embedded, nothing external to install.
    pub installed: bool,
    /// True when a key is configured.
    pub has_api_key: bool,
    /// True when a key is configured; no network probe is made.
    pub authenticated: bool,
    /// Present when something is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
