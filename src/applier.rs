//! Crash-safe application of a delta to the running executable.
//!
//! The swap walks through these states, one filesystem step each:
//!
//! ```text
//! Idle -> Patching -> StagedReady -> BackedUp -> Swapped -> CleanedUp
//! ```
//!
//! 1. **Patching**: read the current executable and run the patcher. Nothing
//!    on disk changes yet.
//! 2. **StagedReady**: the patched bytes are written to the staging path.
//!    The current executable is untouched.
//! 3. **BackedUp**: any old backup is removed, then current is renamed to
//!    the backup path. From here on the previous binary lives only at the
//!    backup path.
//! 4. **Swapped**: staging is renamed to current. On failure the backup is
//!    renamed back; if that fails too the result is
//!    [`UpdateError::UnrecoverableSwap`] naming the backup path.
//! 5. **CleanedUp**: the backup is removed. If removal fails the backup is
//!    hidden and kept, and the update still counts as a success.

use crate::error::{Result, UpdateError};
use crate::fetcher::DeltaPayload;
use crate::paths::ExecutablePathSet;
use crate::patcher::Patcher;
use crate::platform::{self, FileOps};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Position of an apply attempt in the swap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    /// Nothing has happened yet.
    Idle,
    /// The patcher is producing the new binary.
    Patching,
    /// The new binary is on disk at the staging path.
    StagedReady,
    /// The previous binary has been moved to the backup path.
    BackedUp,
    /// The new binary is at the current path.
    Swapped,
    /// The backup has been removed.
    CleanedUp,
}

impl std::fmt::Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Patching => write!(f, "patching"),
            Self::StagedReady => write!(f, "staged-ready"),
            Self::BackedUp => write!(f, "backed-up"),
            Self::Swapped => write!(f, "swapped"),
            Self::CleanedUp => write!(f, "cleaned-up"),
        }
    }
}

/// Terminal result of an apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The new binary is in place and the backup is gone.
    Replaced,
    /// The new binary is in place; the previous one was kept at `backup`.
    RetainedBackup {
        /// Where the previous binary lives.
        backup: PathBuf,
    },
    /// The attempt failed and the previous binary is at the current path.
    FailedBeforeReplace,
    /// No executable is at the current path; the previous one is at `backup`.
    Unrecoverable {
        /// Where the previous binary lives.
        backup: PathBuf,
    },
}

impl SwapOutcome {
    /// Classifies the result of [`PatchApplier::apply`].
    pub fn of(result: &Result<SwapOutcome>) -> SwapOutcome {
        match result {
            Ok(outcome) => outcome.clone(),
            Err(UpdateError::UnrecoverableSwap { backup, .. }) => Self::Unrecoverable {
                backup: backup.clone(),
            },
            Err(_) => Self::FailedBeforeReplace,
        }
    }

    /// Whether the new binary is at the current path.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Replaced | Self::RetainedBackup { .. })
    }
}

/// Applies deltas to an executable through the swap protocol.
pub struct PatchApplier {
    paths: ExecutablePathSet,
    patcher: Box<dyn Patcher>,
    file_ops: Box<dyn FileOps>,
    keep_backup: bool,
}

impl std::fmt::Debug for PatchApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchApplier")
            .field("paths", &self.paths)
            .field("keep_backup", &self.keep_backup)
            .finish_non_exhaustive()
    }
}

impl PatchApplier {
    /// Creates an applier for `paths` using the platform's file operations.
    pub fn new(paths: ExecutablePathSet, patcher: impl Patcher + 'static) -> Self {
        Self {
            paths,
            patcher: Box::new(patcher),
            file_ops: platform::default_file_ops(),
            keep_backup: false,
        }
    }

    /// Creates an applier for the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::CurrentExe`] if the executable path is unknown.
    pub fn for_current_exe(patcher: impl Patcher + 'static) -> Result<Self> {
        Ok(Self::new(ExecutablePathSet::for_current_exe()?, patcher))
    }

    /// Replaces the file operations backend.
    #[must_use]
    pub fn with_file_ops(mut self, file_ops: Box<dyn FileOps>) -> Self {
        self.file_ops = file_ops;
        self
    }

    /// Keeps the previous binary at the backup path after a successful swap.
    #[must_use]
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    /// The paths this applier operates on.
    pub fn paths(&self) -> &ExecutablePathSet {
        &self.paths
    }

    /// Patches the current executable with `delta` and swaps the result in.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Patch`] if the patcher rejects the delta (nothing on
    ///   disk changed)
    /// - [`UpdateError::Filesystem`] if staging, backup, or the swap failed
    ///   and the previous binary is at the current path
    /// - [`UpdateError::UnrecoverableSwap`] if the swap failed and the
    ///   previous binary could not be put back
    pub fn apply(&self, delta: &DeltaPayload) -> Result<SwapOutcome> {
        let paths = &self.paths;
        let mut state = SwapState::Idle;

        advance(&mut state, SwapState::Patching);
        let old = std::fs::read(&paths.current).map_err(|e| fs_error(state, &paths.current, e))?;
        let new = self
            .patcher
            .patch(&old, delta.as_bytes())
            .map_err(|e| UpdateError::Patch(format!("{e:#}")))?;
        tracing::debug!(old = old.len(), new = new.len(), "delta applied in memory");

        if let Err(e) = self.write_staged(&new) {
            self.discard_staging();
            return Err(fs_error(state, &paths.staging, e));
        }
        advance(&mut state, SwapState::StagedReady);

        match self.file_ops.remove(&paths.backup) {
            Ok(()) => tracing::debug!(path = %paths.backup.display(), "removed stale backup"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                self.discard_staging();
                return Err(fs_error(state, &paths.backup, e));
            }
        }
        if let Err(e) = self.file_ops.rename(&paths.current, &paths.backup) {
            self.discard_staging();
            return Err(fs_error(state, &paths.current, e));
        }
        advance(&mut state, SwapState::BackedUp);
        tracing::info!(backup = %paths.backup.display(), "previous binary moved to backup");

        if let Err(swap_err) = self.file_ops.rename(&paths.staging, &paths.current) {
            tracing::warn!(error = %swap_err, "cannot move new binary into place, restoring backup");
            return Err(match self.file_ops.rename(&paths.backup, &paths.current) {
                Ok(()) => {
                    tracing::info!("previous binary restored");
                    self.discard_staging();
                    fs_error(state, &paths.current, swap_err)
                }
                Err(restore_err) => {
                    tracing::error!(
                        current = %paths.current.display(),
                        backup = %paths.backup.display(),
                        swap_error = %swap_err,
                        error = %restore_err,
                        "cannot restore previous binary"
                    );
                    UpdateError::UnrecoverableSwap {
                        current: paths.current.clone(),
                        backup: paths.backup.clone(),
                        source: restore_err,
                    }
                }
            });
        }
        advance(&mut state, SwapState::Swapped);
        tracing::info!(path = %paths.current.display(), "new binary in place");

        if self.keep_backup {
            return Ok(SwapOutcome::RetainedBackup {
                backup: paths.backup.clone(),
            });
        }

        match self.file_ops.remove(&paths.backup) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %paths.backup.display(),
                    error = %e,
                    "cannot remove backup, retaining it"
                );
                if let Err(e) = self.file_ops.hide(&paths.backup) {
                    tracing::warn!(error = %e, "cannot hide retained backup");
                }
                return Ok(SwapOutcome::RetainedBackup {
                    backup: paths.backup.clone(),
                });
            }
        }
        advance(&mut state, SwapState::CleanedUp);
        Ok(SwapOutcome::Replaced)
    }

    /// Removes a backup retained by an earlier update.
    ///
    /// Returns `false` if there was none. Must not run concurrently with
    /// [`apply`](Self::apply).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Filesystem`] if the backup exists but cannot
    /// be removed.
    pub fn remove_retained_backup(&self) -> Result<bool> {
        match self.file_ops.remove(&self.paths.backup) {
            Ok(()) => {
                tracing::info!(path = %self.paths.backup.display(), "removed retained backup");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_error(SwapState::Idle, &self.paths.backup, e)),
        }
    }

    fn write_staged(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o755);
        }

        let mut file = options.open(&self.paths.staging)?;
        file.write_all(bytes)?;
        #[cfg(unix)]
        {
            if let Ok(meta) = std::fs::metadata(&self.paths.current) {
                file.set_permissions(meta.permissions())?;
            }
        }
        file.sync_all()
    }

    fn discard_staging(&self) {
        match std::fs::remove_file(&self.paths.staging) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.paths.staging.display(),
                error = %e,
                "cannot remove staged binary"
            ),
        }
    }
}

fn advance(state: &mut SwapState, next: SwapState) {
    tracing::debug!(from = %state, to = %next, "swap state");
    *state = next;
}

fn fs_error(stage: SwapState, path: &Path, source: std::io::Error) -> UpdateError {
    UpdateError::Filesystem {
        stage,
        path: path.to_path_buf(),
        source,
    }
}
