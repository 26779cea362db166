//! Updater configuration.
//!
//! [`UpdaterConfig`] describes where the Version Service lives and how the
//! HTTP transport behaves. It can be built in code, or loaded from a TOML
//! file shipped next to the hosting application:
//!
//! ```toml
//! service_url = "https://updates.example.com/v1"
//! app_id = "demo"
//! channel = "beta"
//! read_timeout_secs = 300
//! ```
//!
//! The `SELFPATCH_SERVICE_URL` environment variable overrides `service_url`.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Channel used when none is configured.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Product identifier sent in the `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("selfpatch/", env!("CARGO_PKG_VERSION"));

/// Environment variable that overrides [`UpdaterConfig::service_url`].
pub const SERVICE_URL_ENV: &str = "SELFPATCH_SERVICE_URL";

/// Configuration for an [`Updater`](crate::Updater).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Base URL of the Version Service. `/check` and `/download` are
    /// appended to it.
    pub service_url: String,
    /// Application identifier registered with the Version Service.
    pub app_id: String,
    /// Release channel. Opaque to the updater.
    pub channel: String,
    /// Value for the `User-Agent` header.
    pub user_agent: String,
    /// Connect timeout in seconds. `None` leaves the transport default.
    pub connect_timeout_secs: Option<u64>,
    /// Read timeout in seconds. `None` means no timeout.
    pub read_timeout_secs: Option<u64>,
    /// Keep the previous binary after a successful swap.
    pub keep_backup: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            service_url: String::new(),
            app_id: String::new(),
            channel: DEFAULT_CHANNEL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout_secs: None,
            read_timeout_secs: None,
            keep_backup: false,
        }
    }
}

impl UpdaterConfig {
    /// Creates a config for `app_id` against the service at `service_url`.
    pub fn new(service_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Parses a TOML document and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the document does not parse.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(raw).map_err(|e| UpdateError::Config(format!("invalid TOML: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Replaces fields with values from the environment, when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Replaces fields with values returned by `lookup` for the override
    /// variable names. Blank values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SERVICE_URL_ENV)
            && !url.trim().is_empty()
        {
            tracing::debug!(url = %url, "service URL overridden from environment");
            self.service_url = url;
        }
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `service_url` must be an absolute http(s) URL
    /// - `app_id` must not be empty
    /// - timeouts, when set, must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(UpdateError::Config("app_id must not be empty".into()));
        }
        let url = url::Url::parse(&self.service_url).map_err(|e| {
            UpdateError::Config(format!("service_url {:?} is invalid: {e}", self.service_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UpdateError::Config(format!(
                "service_url scheme must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.connect_timeout_secs == Some(0) {
            return Err(UpdateError::Config(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.read_timeout_secs == Some(0) {
            return Err(UpdateError::Config(
                "read_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
