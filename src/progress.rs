//! Download progress reporting.
//!
//! [`ProgressReader`] wraps any reader and hands the size of every
//! non-empty chunk to a callback. Callers that want totals accumulate the
//! increments themselves, e.g. with [`DownloadProgress`].

use std::io::Read;

/// Reader adapter that reports each chunk's byte count.
pub struct ProgressReader<R, F> {
    inner: R,
    report: F,
}

impl<R: Read, F: FnMut(u64)> ProgressReader<R, F> {
    /// Wraps `inner`, calling `report` after each read that returned data.
    pub fn new(inner: R, report: F) -> Self {
        Self { inner, report }
    }

    /// Unwraps the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, F: FnMut(u64)> Read for ProgressReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            (self.report)(n as u64);
        }
        Ok(n)
    }
}

/// Running total for a download of possibly unknown size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub downloaded: u64,
    /// Expected size from `Content-Length`, if the server sent one.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Starts tracking a download of `total` bytes.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            downloaded: 0,
            total,
        }
    }

    /// Adds one increment.
    pub fn advance(&mut self, bytes: u64) {
        self.downloaded = self.downloaded.saturating_add(bytes);
    }

    /// Completion percentage in `0.0..=100.0`, if the total is known.
    ///
    /// A zero-byte total counts as complete.
    pub fn percent(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.downloaded as f64 / total as f64 * 100.0).min(100.0)
            }
        })
    }
}
