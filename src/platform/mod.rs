//! Platform capabilities used by the applier and restarter.
//!
//! Two seams keep platform differences out of the update logic:
//!
//! - [`FileOps`]: rename/remove/hide. Unix renames and unlinks running
//!   executables directly; Windows falls back to a `cmd.exe` helper process
//!   when a direct call is refused because the file is in use.
//! - [`ProcessImage`]: replace the running process. Unix `exec`s in place;
//!   Windows spawns the new image and exits the old one.
//!
//! The implementation is picked at build time by [`default_file_ops`] and
//! [`default_process_image`].

use crate::error::Result;
use std::convert::Infallible;
use std::ffi::OsString;
use std::path::Path;

mod direct;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use direct::{DirectFileOps, SpawnAndExit};
#[cfg(unix)]
pub use unix::ExecReplace;
#[cfg(windows)]
pub use windows::HelperFileOps;

/// Filesystem operations the swap protocol performs on executables.
pub trait FileOps: Send + Sync {
    /// Renames `from` to `to`, replacing `to` if the platform allows.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Removes the file at `path`. A missing file is reported as
    /// [`std::io::ErrorKind::NotFound`].
    fn remove(&self, path: &Path) -> std::io::Result<()>;

    /// Marks a retained file as hidden where the platform has such a notion.
    fn hide(&self, path: &Path) -> std::io::Result<()>;
}

/// Replaces the running process with a fresh one.
pub trait ProcessImage: Send + Sync {
    /// Starts `program` with `args` (excluding argv\[0\]) and exactly the
    /// environment `env`, in place of the current process.
    ///
    /// Never returns on success. On failure the current process keeps
    /// running and gets the error back.
    fn replace(
        &self,
        program: &Path,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Infallible>;
}

/// File operations for the build target.
pub fn default_file_ops() -> Box<dyn FileOps> {
    #[cfg(windows)]
    {
        Box::new(HelperFileOps::default())
    }
    #[cfg(not(windows))]
    {
        Box::new(DirectFileOps)
    }
}

/// Process replacement for the build target.
pub fn default_process_image() -> Box<dyn ProcessImage> {
    #[cfg(unix)]
    {
        Box::new(ExecReplace)
    }
    #[cfg(not(unix))]
    {
        Box::new(SpawnAndExit)
    }
}
