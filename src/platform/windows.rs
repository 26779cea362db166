//! Windows file operations on executables that may be in use.
//!
//! A running `.exe` can usually be renamed but not deleted. When a direct
//! call is refused, the operation is retried through `cmd.exe` in a child
//! process and its effect is verified on disk afterwards.

use super::FileOps;
use std::io::ErrorKind;
use std::os::windows::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// [`FileOps`] that falls back to a `cmd.exe` helper process.
#[derive(Debug, Clone)]
pub struct HelperFileOps {
    shell: PathBuf,
}

impl Default for HelperFileOps {
    fn default() -> Self {
        let windir = std::env::var_os("windir").unwrap_or_else(|| "C:\\Windows".into());
        Self {
            shell: PathBuf::from(windir).join("system32").join("cmd.exe"),
        }
    }
}

impl HelperFileOps {
    fn run(&self, args: &[&std::ffi::OsStr]) -> std::io::Result<()> {
        let status = Command::new(&self.shell)
            .arg("/C")
            .args(args)
            .creation_flags(CREATE_NO_WINDOW)
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "helper command exited with {status}"
            )))
        }
    }
}

impl FileOps for HelperFileOps {
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        match std::fs::rename(from, to) {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::debug!(from = %from.display(), error = %e, "rename refused, using helper");
                self.run(&["move".as_ref(), "/Y".as_ref(), from.as_os_str(), to.as_os_str()])?;
                if from.exists() || !to.exists() {
                    return Err(std::io::Error::new(
                        ErrorKind::PermissionDenied,
                        format!("helper could not move {}", from.display()),
                    ));
                }
                Ok(())
            }
            other => other,
        }
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::debug!(path = %path.display(), error = %e, "remove refused, using helper");
                self.run(&["del".as_ref(), "/F".as_ref(), "/Q".as_ref(), path.as_os_str()])?;
                if path.exists() {
                    return Err(std::io::Error::new(
                        ErrorKind::PermissionDenied,
                        format!("{} is still in use", path.display()),
                    ));
                }
                Ok(())
            }
            other => other,
        }
    }

    fn hide(&self, path: &Path) -> std::io::Result<()> {
        self.run(&["attrib".as_ref(), "+H".as_ref(), path.as_os_str()])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn shell_is_system_cmd() {
        let ops = HelperFileOps::default();
        assert!(ops.shell.ends_with("system32\\cmd.exe"));
    }

    #[test]
    fn rename_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("demo.exe");
        let to = dir.path().join(".demo.exe.old");
        std::fs::write(&from, b"old").unwrap();

        HelperFileOps::default().rename(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"old");
    }

    #[test]
    fn remove_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = HelperFileOps::default()
            .remove(&dir.path().join("missing.exe"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn helper_commands_run_through_cmd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".demo.exe.old");
        std::fs::write(&path, b"old").unwrap();

        let ops = HelperFileOps::default();
        ops.hide(&path).unwrap();
        ops.run(&["del".as_ref(), "/F".as_ref(), "/Q".as_ref(), "/A:H".as_ref(), path.as_os_str()])
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn failing_helper_command_is_error() {
        let ops = HelperFileOps::default();
        assert!(ops.run(&["exit".as_ref(), "3".as_ref()]).is_err());
    }
}
