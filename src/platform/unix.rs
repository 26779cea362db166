//! In-place process replacement via `execve`.

use super::ProcessImage;
use crate::error::{Result, UpdateError};
use std::convert::Infallible;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::Path;

/// [`ProcessImage`] that overlays the current process with `exec`.
///
/// The PID is preserved. If `exec` fails nothing has changed and the
/// error is returned to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecReplace;

impl ProcessImage for ExecReplace {
    fn replace(
        &self,
        program: &Path,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Infallible> {
        tracing::info!(program = %program.display(), "re-executing");
        let err = std::process::Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k, v)))
            .exec();

        Err(UpdateError::Restart(format!(
            "cannot exec {}: {err}",
            program.display()
        )))
    }
}
