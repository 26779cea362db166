//! Executable path resolution.
//!
//! The applier works on three sibling paths derived from the running
//! executable: the executable itself, a backup slot, and a staging slot.
//! All three share a directory so renames between them never cross a
//! volume.
//!
//! | Role | Path |
//! |------|------|
//! | current | `<dir>/<base>` |
//! | backup | `<dir>/.<base>.old` |
//! | staging | `<dir>/.<base>.new` |

use crate::error::{Result, UpdateError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The three paths the swap protocol touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePathSet {
    /// The executable being replaced.
    pub current: PathBuf,
    /// Where the previous executable is parked during and after the swap.
    pub backup: PathBuf,
    /// Where the patched executable is written before the swap.
    pub staging: PathBuf,
}

impl ExecutablePathSet {
    /// Derives the path set from an executable path. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::CurrentExe`] if `current` has no file name.
    pub fn resolve(current: &Path) -> Result<Self> {
        let base = current.file_name().ok_or_else(|| {
            UpdateError::CurrentExe(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", current.display()),
            ))
        })?;
        let dir = current.parent().unwrap_or_else(|| Path::new(""));

        Ok(Self {
            current: current.to_path_buf(),
            backup: dir.join(marked(base, "old")),
            staging: dir.join(marked(base, "new")),
        })
    }

    /// Resolves the path set for the running process.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::CurrentExe`] if the host cannot report the
    /// executable path.
    pub fn for_current_exe() -> Result<Self> {
        Self::resolve(&current_exe_path()?)
    }
}

/// Returns the path to the currently running executable.
///
/// # Errors
///
/// Returns [`UpdateError::CurrentExe`] if the path cannot be determined.
pub fn current_exe_path() -> Result<PathBuf> {
    std::env::current_exe().map_err(UpdateError::CurrentExe)
}

/// `.<base>.<suffix>`
fn marked(base: &std::ffi::OsStr, suffix: &str) -> OsString {
    let mut name = OsString::with_capacity(base.len() + suffix.len() + 2);
    name.push(".");
    name.push(base);
    name.push(".");
    name.push(suffix);
    name
}
