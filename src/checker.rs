//! Version Service update checks.
//!
//! `POST <base>/check` with the request serialized as JSON. A `204` means
//! nothing newer exists and surfaces as [`UpdateError::NoUpdateAvailable`];
//! a `200` carries `{"success": bool, "version": string}`.

use crate::error::{Result, UpdateError};
use crate::request::{CheckResponseWire, UpdateAnswer, UpdateRequest};
use crate::transport::{self, TransportConfig};

/// Asks the Version Service whether a newer build exists.
#[derive(Debug, Clone)]
pub struct VersionChecker {
    agent: ureq::Agent,
}

impl VersionChecker {
    /// Creates a checker on top of an existing agent.
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    /// Creates a checker with its own agent.
    pub fn with_transport(config: &TransportConfig) -> Self {
        Self::new(transport::build_agent(config))
    }

    /// Checks for an update.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Validation`] if the request is malformed (no request is sent)
    /// - [`UpdateError::NoUpdateAvailable`] on `204`
    /// - [`UpdateError::Server`] on any other non-`200` status, or a `200`
    ///   whose body is not a valid answer
    /// - [`UpdateError::Transport`] if the exchange fails
    pub fn check(&self, request: &UpdateRequest) -> Result<UpdateAnswer> {
        request.validate()?;

        let url = request.endpoint("check");
        tracing::info!(
            app_id = %request.app_id,
            version = %request.version,
            channel = request.effective_channel(),
            "checking for update"
        );

        let response = transport::post_json(&self.agent, &url, &request.check_payload())?;
        let status = response.status();
        match status {
            204 => {
                tracing::info!("no update available");
                Err(UpdateError::NoUpdateAvailable)
            }
            200 => parse_answer(&transport::read_text(response)?),
            _ => Err(UpdateError::Server {
                status,
                body: transport::read_text(response)?,
            }),
        }
    }
}

fn parse_answer(body: &str) -> Result<UpdateAnswer> {
    let wire: CheckResponseWire = serde_json::from_str(body).map_err(|_| UpdateError::Server {
        status: 200,
        body: body.to_owned(),
    })?;

    if !wire.success {
        tracing::info!("version service reported no update");
        return Err(UpdateError::NoUpdateAvailable);
    }
    if wire.version.is_empty() {
        return Err(UpdateError::Server {
            status: 200,
            body: body.to_owned(),
        });
    }

    tracing::info!(new_version = %wire.version, "update available");
    Ok(UpdateAnswer {
        available: true,
        new_version: wire.version,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn parse_answer_success() {
        let answer = parse_answer(r#"{"success":true,"version":"1.1.0"}"#).unwrap();
        assert_eq!(
            answer,
            UpdateAnswer {
                available: true,
                new_version: "1.1.0".into()
            }
        );
    }

    #[test]
    fn parse_answer_unsuccessful_is_no_update() {
        let err = parse_answer(r#"{"success":false,"version":""}"#).unwrap_err();
        assert!(err.is_no_update());
    }

    #[test]
    fn parse_answer_empty_version_is_server_error() {
        let err = parse_answer(r#"{"success":true,"version":""}"#).unwrap_err();
        assert!(matches!(err, UpdateError::Server { status: 200, .. }));
    }

    #[test]
    fn parse_answer_garbage_keeps_body() {
        let err = parse_answer("<html>oops</html>").unwrap_err();
        match err {
            UpdateError::Server { status, body } => {
                assert_eq!(status, 200);
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_request_fails_without_network() {
        // Port 9 (discard) is never contacted: validation runs first.
        let checker = VersionChecker::with_transport(&TransportConfig::default());
        let req = UpdateRequest::new("", "1.0.0", "http://127.0.0.1:9");
        let err = checker.check(&req).unwrap_err();
        assert!(matches!(err, UpdateError::Validation(_)));
    }
}
