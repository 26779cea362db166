//! Request and answer types exchanged with the Version Service.

use crate::config::{DEFAULT_CHANNEL, UpdaterConfig};
use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};

/// Identifies the running application to the Version Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Application identifier. Must not be empty.
    pub app_id: String,
    /// Currently running version. Must not be empty.
    pub version: String,
    /// Release channel. Empty means [`DEFAULT_CHANNEL`].
    pub channel: String,
    /// Base URL of the Version Service.
    pub service_url: String,
    /// Operating system name.
    pub os: String,
    /// CPU architecture name.
    pub architecture: String,
}

impl UpdateRequest {
    /// Creates a request for the host platform on the default channel.
    pub fn new(
        app_id: impl Into<String>,
        version: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            version: version.into(),
            channel: String::new(),
            service_url: service_url.into(),
            os: std::env::consts::OS.to_owned(),
            architecture: std::env::consts::ARCH.to_owned(),
        }
    }

    /// Builds a request from a config and the running version.
    pub fn from_config(config: &UpdaterConfig, version: impl Into<String>) -> Self {
        Self::new(&config.app_id, version, &config.service_url).with_channel(&config.channel)
    }

    /// Sets the release channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Overrides the reported platform.
    #[must_use]
    pub fn with_platform(mut self, os: impl Into<String>, architecture: impl Into<String>) -> Self {
        self.os = os.into();
        self.architecture = architecture.into();
        self
    }

    /// Channel that goes on the wire.
    pub fn effective_channel(&self) -> &str {
        if self.channel.is_empty() {
            DEFAULT_CHANNEL
        } else {
            &self.channel
        }
    }

    /// Checks the request invariants. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Validation`] if the app id or version is empty,
    /// or the service URL is not an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.is_empty() {
            return Err(UpdateError::Validation("app id cannot be empty".into()));
        }
        if self.version.is_empty() {
            return Err(UpdateError::Validation("version cannot be empty".into()));
        }
        url::Url::parse(&self.service_url).map_err(|e| {
            UpdateError::Validation(format!("service url {:?} is invalid: {e}", self.service_url))
        })?;
        Ok(())
    }

    /// Full URL of a service endpoint such as `check` or `download`.
    pub(crate) fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.service_url.trim_end_matches('/'))
    }

    pub(crate) fn check_payload(&self) -> CheckPayload<'_> {
        CheckPayload {
            app_id: &self.app_id,
            version: &self.version,
            channel: self.effective_channel(),
            os: &self.os,
            architecture: &self.architecture,
        }
    }
}

/// Asks the Version Service for the delta from `update.version` to
/// `new_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// The originating check request.
    pub update: UpdateRequest,
    /// Version announced by the check answer.
    pub new_version: String,
}

impl DownloadRequest {
    /// Pairs a check request with the version it announced.
    pub fn new(update: UpdateRequest, new_version: impl Into<String>) -> Self {
        Self {
            update,
            new_version: new_version.into(),
        }
    }

    /// Checks the underlying request plus `new_version`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Validation`] on any violated invariant.
    pub fn validate(&self) -> Result<()> {
        self.update.validate()?;
        if self.new_version.is_empty() {
            return Err(UpdateError::Validation("new version cannot be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn payload(&self) -> DownloadPayload<'_> {
        let check = self.update.check_payload();
        DownloadPayload {
            app_id: check.app_id,
            version: check.version,
            new_version: &self.new_version,
            channel: check.channel,
            os: check.os,
            architecture: check.architecture,
        }
    }
}

/// Result of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAnswer {
    /// Whether a newer version exists.
    pub available: bool,
    /// The newer version.
    pub new_version: String,
}

/// JSON body of `POST <base>/check`.
#[derive(Debug, Serialize)]
pub(crate) struct CheckPayload<'a> {
    pub app_id: &'a str,
    pub version: &'a str,
    pub channel: &'a str,
    pub os: &'a str,
    pub architecture: &'a str,
}

/// JSON body of `POST <base>/download`.
#[derive(Debug, Serialize)]
pub(crate) struct DownloadPayload<'a> {
    pub app_id: &'a str,
    pub version: &'a str,
    pub new_version: &'a str,
    pub channel: &'a str,
    pub os: &'a str,
    pub architecture: &'a str,
}

/// JSON body of a 200 answer to `check`.
#[derive(Debug, Deserialize)]
pub(crate) struct CheckResponseWire {
    pub success: bool,
    pub version: String,
}
