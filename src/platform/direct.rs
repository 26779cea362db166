//! Direct filesystem calls and spawn-then-exit process replacement.

use super::{FileOps, ProcessImage};
use crate::error::{Result, UpdateError};
use std::convert::Infallible;
use std::ffi::OsString;
use std::path::Path;

/// [`FileOps`] backed by plain `std::fs` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFileOps;

impl FileOps for DirectFileOps {
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    fn hide(&self, path: &Path) -> std::io::Result<()> {
        // Backup and staging names are already dot-prefixed.
        tracing::debug!(path = %path.display(), "retained file left in place");
        Ok(())
    }
}

/// [`ProcessImage`] that starts a new process and exits the current one.
///
/// Used where the OS cannot overlay a running process image.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnAndExit;

impl ProcessImage for SpawnAndExit {
    fn replace(
        &self,
        program: &Path,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Infallible> {
        let child = std::process::Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k, v)))
            .spawn()
            .map_err(|e| {
                UpdateError::Restart(format!("cannot start {}: {e}", program.display()))
            })?;

        tracing::info!(pid = child.id(), "replacement process started, exiting");
        std::process::exit(0)
    }
}
