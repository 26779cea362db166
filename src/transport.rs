//! Shared HTTP transport for talking to the Version Service.
//!
//! Requests go through a blocking `ureq` agent. Headers common to every
//! request are applied by [`DefaultHeader`] middleware, which sets a header
//! only when the request does not already carry it. Idle connections are
//! never pooled, so every exchange closes its connection.

use crate::config::{DEFAULT_USER_AGENT, UpdaterConfig};
use crate::error::{Result, UpdateError};
use serde::Serialize;
use std::time::Duration;
use ureq::{Middleware, MiddlewareNext, Request, Response};

/// Middleware that sets `name: value` unless the request already has `name`.
#[derive(Debug, Clone)]
pub struct DefaultHeader {
    name: String,
    value: String,
}

impl DefaultHeader {
    /// Creates the middleware.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `User-Agent` middleware carrying a product identifier.
    pub fn user_agent(value: impl Into<String>) -> Self {
        Self::new("User-Agent", value)
    }
}

impl Middleware for DefaultHeader {
    fn handle(
        &self,
        request: Request,
        next: MiddlewareNext,
    ) -> std::result::Result<Response, ureq::Error> {
        let request = if request.header(&self.name).is_some() {
            request
        } else {
            request.set(&self.name, &self.value)
        };
        next.handle(request)
    }
}

/// Transport settings. Timeouts belong to the caller; `None` means the
/// transport waits indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Value for the `User-Agent` header.
    pub user_agent: String,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Read timeout.
    pub read_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

impl From<&UpdaterConfig> for TransportConfig {
    fn from(config: &UpdaterConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout_secs.map(Duration::from_secs),
            read_timeout: config.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Builds the agent used for every Version Service request.
pub fn build_agent(config: &TransportConfig) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new()
        .max_idle_connections(0)
        .max_idle_connections_per_host(0)
        .middleware(DefaultHeader::user_agent(&config.user_agent))
        .middleware(DefaultHeader::new("Content-Type", "application/json"))
        .middleware(DefaultHeader::new("Connection", "close"));

    if let Some(timeout) = config.connect_timeout {
        builder = builder.timeout_connect(timeout);
    }
    if let Some(timeout) = config.read_timeout {
        builder = builder.timeout_read(timeout);
    }
    builder.build()
}

/// POSTs `payload` as JSON. Non-2xx statuses come back as
/// [`UpdateError::Server`] with the body attached.
pub(crate) fn post_json<T: Serialize>(
    agent: &ureq::Agent,
    url: &str,
    payload: &T,
) -> Result<Response> {
    let body = serde_json::to_string(payload)
        .map_err(|e| UpdateError::Validation(format!("cannot serialize request: {e}")))?;
    tracing::debug!(url, "posting to version service");
    Ok(agent.post(url).send_string(&body)?)
}

/// Reads a response body as text.
pub(crate) fn read_text(response: Response) -> Result<String> {
    response
        .into_string()
        .map_err(|e| UpdateError::Transport(format!("cannot read response body: {e}")))
}
