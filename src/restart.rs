//! Restarting into the updated executable.

use crate::error::Result;
use crate::paths::current_exe_path;
use crate::platform::{self, ProcessImage};
use std::convert::Infallible;
use std::ffi::OsString;

/// Replaces the running process with a fresh run of its own executable,
/// passing through the original arguments and environment.
pub struct ProcessRestarter {
    image: Box<dyn ProcessImage>,
}

impl Default for ProcessRestarter {
    fn default() -> Self {
        Self::new(platform::default_process_image())
    }
}

impl std::fmt::Debug for ProcessRestarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRestarter").finish_non_exhaustive()
    }
}

impl ProcessRestarter {
    /// Creates a restarter with an explicit replacement strategy.
    pub fn new(image: Box<dyn ProcessImage>) -> Self {
        Self { image }
    }

    /// Restarts the process. Only returns on failure, in which case the
    /// current process is still running unchanged.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::CurrentExe`](crate::UpdateError::CurrentExe) if the
    ///   executable path is unknown
    /// - [`UpdateError::Restart`](crate::UpdateError::Restart) if the
    ///   replacement was rejected
    pub fn reload(&self) -> Result<Infallible> {
        let program = current_exe_path()?;
        let args: Vec<OsString> = std::env::args_os().skip(1).collect();
        let env: Vec<(OsString, OsString)> = std::env::vars_os().collect();

        tracing::info!(
            program = %program.display(),
            args = args.len(),
            "restarting into updated binary"
        );
        self.image.replace(&program, &args, &env)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::UpdateError;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    type Call = (PathBuf, Vec<OsString>, Vec<(OsString, OsString)>);

    /// Records the replacement request and refuses it.
    struct Recorder(Arc<Mutex<Option<Call>>>);

    impl ProcessImage for Recorder {
        fn replace(
            &self,
            program: &Path,
            args: &[OsString],
            env: &[(OsString, OsString)],
        ) -> Result<Infallible> {
            *self.0.lock().unwrap() = Some((program.to_path_buf(), args.to_vec(), env.to_vec()));
            Err(UpdateError::Restart("refused by test".into()))
        }
    }

    #[test]
    fn reload_passes_self_args_and_env() {
        let calls = Arc::new(Mutex::new(None));
        let restarter = ProcessRestarter::new(Box::new(Recorder(Arc::clone(&calls))));

        let err = restarter.reload().unwrap_err();
        assert!(matches!(err, UpdateError::Restart(_)));

        let (program, args, env) = calls.lock().unwrap().take().unwrap();
        assert_eq!(program, std::env::current_exe().unwrap());
        let expected_args: Vec<OsString> = std::env::args_os().skip(1).collect();
        assert_eq!(args, expected_args);
        let expected_env: Vec<(OsString, OsString)> = std::env::vars_os().collect();
        assert_eq!(env.len(), expected_env.len());
    }
}
