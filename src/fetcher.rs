//! Delta payload download.
//!
//! `POST <base>/download` returns the raw delta as the response body. The
//! body is streamed to completion in fixed-size chunks and each chunk's size
//! is handed to the caller's progress callback.

use crate::error::{Result, UpdateError};
use crate::progress::ProgressReader;
use crate::request::DownloadRequest;
use crate::transport::{self, TransportConfig};
use std::io::{ErrorKind, Read};

const CHUNK_SIZE: usize = 32 * 1024;
/// Upper bound on buffer preallocation from an announced `Content-Length`.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Raw delta bytes between the running version and the announced one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPayload {
    bytes: Vec<u8>,
}

impl DeltaPayload {
    /// Wraps already-downloaded delta bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The delta bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the delta is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Takes ownership of the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Streams delta payloads from the Version Service.
#[derive(Debug, Clone)]
pub struct DeltaFetcher {
    agent: ureq::Agent,
}

impl DeltaFetcher {
    /// Creates a fetcher on top of an existing agent.
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    /// Creates a fetcher with its own agent.
    pub fn with_transport(config: &TransportConfig) -> Self {
        Self::new(transport::build_agent(config))
    }

    /// Downloads the delta described by `request`.
    ///
    /// `on_start` receives the expected total from `Content-Length`, when
    /// present, before streaming starts. `on_progress` then receives the
    /// byte count of every chunk read; the increments sum to the payload
    /// size.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`VersionChecker::check`](crate::VersionChecker::check):
    /// validation, no update (`204`), server, and transport errors.
    pub fn download<S, P>(
        &self,
        request: &DownloadRequest,
        on_start: S,
        on_progress: P,
    ) -> Result<DeltaPayload>
    where
        S: FnOnce(Option<u64>),
        P: FnMut(u64),
    {
        request.validate()?;

        let url = request.update.endpoint("download");
        tracing::info!(
            app_id = %request.update.app_id,
            from = %request.update.version,
            to = %request.new_version,
            "downloading delta"
        );

        let response = transport::post_json(&self.agent, &url, &request.payload())?;
        let status = response.status();
        match status {
            204 => {
                tracing::warn!("download endpoint reported no update");
                Err(UpdateError::NoUpdateAvailable)
            }
            200 => {
                let total = response
                    .header("Content-Length")
                    .and_then(|v| v.trim().parse::<u64>().ok());
                on_start(total);

                let bytes = read_chunked(response.into_reader(), total, on_progress)?;
                tracing::info!(bytes = bytes.len(), "delta downloaded");
                Ok(DeltaPayload::new(bytes))
            }
            _ => Err(UpdateError::Server {
                status,
                body: transport::read_text(response)?,
            }),
        }
    }
}

fn read_chunked<R: Read, P: FnMut(u64)>(
    reader: R,
    total: Option<u64>,
    on_progress: P,
) -> Result<Vec<u8>> {
    let capacity = total.map_or(0, |t| usize::try_from(t).unwrap_or(0).min(MAX_PREALLOC));
    let mut bytes = Vec::with_capacity(capacity);
    let mut reader = ProgressReader::new(reader, on_progress);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(UpdateError::Transport(format!("download read error: {e}"))),
        };
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);
    }
    Ok(bytes)
}
