//! Error types for the self-update pipeline.
//!
//! Every phase (check, download, apply, reload) reports its outcome to the
//! immediate caller through [`UpdateError`]. Nothing is retried internally.

use crate::applier::SwapState;
use std::path::PathBuf;

/// Errors produced by the update pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The request was malformed. Raised before any I/O happens.
    #[error("validation error: {0}")]
    Validation(String),

    /// The Version Service has nothing newer. Not a failure.
    #[error("no update available")]
    NoUpdateAvailable,

    /// The HTTP exchange itself failed (DNS, connect, TLS, read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The Version Service answered with an unexpected status.
    #[error("server error ({status}): {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The patcher rejected the delta.
    #[error("patch error: {0}")]
    Patch(String),

    /// A staging, rename, or remove step failed. The executable at the
    /// current path is intact.
    #[error("filesystem error while {stage}: {}: {source}", path.display())]
    Filesystem {
        /// State the applier was in when the operation failed.
        stage: SwapState,
        /// Path the failing operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The new binary could not be moved into place and the previous one
    /// could not be restored. Manual recovery: move `backup` to `current`.
    #[error(
        "unrecoverable swap: no executable at {}; previous binary left at {}: {source}",
        current.display(),
        backup.display()
    )]
    UnrecoverableSwap {
        /// Where the executable should be.
        current: PathBuf,
        /// Where the previous executable now lives.
        backup: PathBuf,
        /// Error from the failed restore.
        #[source]
        source: std::io::Error,
    },

    /// The host could not report the running executable's path.
    #[error("cannot determine current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    /// Replacing the process image failed. The old process keeps running.
    #[error("restart error: {0}")]
    Restart(String),

    /// Invalid updater configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl UpdateError {
    /// Returns `true` for the "nothing to do" sentinel, which callers should
    /// not log as a failure.
    pub fn is_no_update(&self) -> bool {
        matches!(self, Self::NoUpdateAvailable)
    }

    /// Returns `true` when the host is left without an executable at its
    /// own path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnrecoverableSwap { .. })
    }
}

impl From<ureq::Error> for UpdateError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => match response.into_string() {
                Ok(body) => Self::Server { status, body },
                Err(e) => Self::Transport(format!(
                    "cannot read body of {status} response: {e}"
                )),
            },
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
