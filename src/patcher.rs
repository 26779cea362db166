//! Binary delta application.
//!
//! The applier only needs "old bytes + delta bytes -> new bytes, or fail".
//! [`BsdiffPatcher`] provides that for bsdiff 4.x deltas (`BSDIFF40`);
//! hosts with another delta format implement [`Patcher`] themselves. Any
//! `Fn(&[u8], &[u8]) -> anyhow::Result<Vec<u8>>` closure is a patcher too.

use anyhow::Context;

/// Largest capacity pre-allocated from a delta's declared target size.
const MAX_TARGET_HINT: u64 = 256 * 1024 * 1024;

/// Produces a new binary from an old one and a delta.
pub trait Patcher: Send + Sync {
    /// Applies `delta` to `old`.
    ///
    /// Fails on a corrupt or truncated delta, or one built against a
    /// different base.
    fn patch(&self, old: &[u8], delta: &[u8]) -> anyhow::Result<Vec<u8>>;
}

impl<F> Patcher for F
where
    F: Fn(&[u8], &[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn patch(&self, old: &[u8], delta: &[u8]) -> anyhow::Result<Vec<u8>> {
        self(old, delta)
    }
}

/// Applies bsdiff 4.x deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsdiffPatcher;

impl Patcher for BsdiffPatcher {
    fn patch(&self, old: &[u8], delta: &[u8]) -> anyhow::Result<Vec<u8>> {
        let bspatch = qbsdiff::Bspatch::new(delta).context("invalid bsdiff delta")?;
        let hint = bspatch.hint_target_size().min(MAX_TARGET_HINT);
        let mut target = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
        bspatch
            .apply(old, std::io::Cursor::new(&mut target))
            .context("cannot apply bsdiff delta")?;
        Ok(target)
    }
}
