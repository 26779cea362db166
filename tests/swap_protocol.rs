//! Swap protocol tests against real files, with faults injected through a
//! custom [`FileOps`] backend.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use selfpatch::platform::{DirectFileOps, FileOps};
use selfpatch::{
    BsdiffPatcher, DeltaPayload, ExecutablePathSet, PatchApplier, SwapOutcome, SwapState,
    UpdateError,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const OLD: &[u8] = b"\x7fELF demo 1.0.0 -- the quick brown fox jumps over the lazy dog";
const NEW: &[u8] = b"\x7fELF demo 1.1.0 -- the quick brown fox leaps over the sleepy dog";

fn delta(old: &[u8], new: &[u8]) -> DeltaPayload {
    let mut patch = Vec::new();
    qbsdiff::Bsdiff::new(old, new)
        .compare(std::io::Cursor::new(&mut patch))
        .unwrap();
    DeltaPayload::new(patch)
}

fn install(dir: &Path) -> ExecutablePathSet {
    let current = dir.join("demo");
    std::fs::write(&current, OLD).unwrap();
    ExecutablePathSet::resolve(&current).unwrap()
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    names.sort();
    names
}

/// Direct file operations with switchable failures and an operation log.
#[derive(Clone)]
struct FaultyOps {
    paths: ExecutablePathSet,
    fail_swap: bool,
    fail_restore: bool,
    fail_cleanup: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl FaultyOps {
    fn new(paths: &ExecutablePathSet) -> Self {
        Self {
            paths: paths.clone(),
            fail_swap: false,
            fail_restore: false,
            fail_cleanup: false,
            log: Arc::default(),
        }
    }

    fn name(&self, path: &Path) -> &'static str {
        if path == self.paths.current {
            "current"
        } else if path == self.paths.backup {
            "backup"
        } else if path == self.paths.staging {
            "staging"
        } else {
            "other"
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl FileOps for FaultyOps {
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        let op = format!("rename {} -> {}", self.name(from), self.name(to));
        self.log.lock().unwrap().push(op);

        let swap = from == self.paths.staging && to == self.paths.current;
        let restore = from == self.paths.backup && to == self.paths.current;
        if (swap && self.fail_swap) || (restore && self.fail_restore) {
            return Err(std::io::Error::other("injected rename failure"));
        }
        DirectFileOps.rename(from, to)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        let op = format!("remove {}", self.name(path));
        self.log.lock().unwrap().push(op);

        if self.fail_cleanup && path.exists() {
            return Err(std::io::Error::from(ErrorKind::PermissionDenied));
        }
        DirectFileOps.remove(path)
    }

    fn hide(&self, path: &Path) -> std::io::Result<()> {
        let op = format!("hide {}", self.name(path));
        self.log.lock().unwrap().push(op);
        Ok(())
    }
}

#[test]
fn bsdiff_update_replaces_binary_and_removes_backup() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());
    let ops = FaultyOps::new(&paths);

    let outcome = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .with_file_ops(Box::new(ops.clone()))
        .apply(&delta(OLD, NEW))
        .unwrap();

    assert_eq!(outcome, SwapOutcome::Replaced);
    assert_eq!(std::fs::read(&paths.current).unwrap(), NEW);
    assert_eq!(entries(dir.path()), vec![paths.current.clone()]);
    assert_eq!(
        ops.log(),
        vec![
            "remove backup",
            "rename current -> backup",
            "rename staging -> current",
            "remove backup",
        ]
    );
}

#[test]
fn failed_cleanup_retains_original_as_backup() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());
    let ops = FaultyOps {
        fail_cleanup: true,
        ..FaultyOps::new(&paths)
    };

    let outcome = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .with_file_ops(Box::new(ops.clone()))
        .apply(&delta(OLD, NEW))
        .unwrap();

    assert_eq!(
        outcome,
        SwapOutcome::RetainedBackup {
            backup: paths.backup.clone()
        }
    );
    assert_eq!(std::fs::read(&paths.current).unwrap(), NEW);
    assert_eq!(std::fs::read(&paths.backup).unwrap(), OLD);
    assert_eq!(ops.log().last().map(String::as_str), Some("hide backup"));
}

#[test]
fn failed_swap_restores_original() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());
    let ops = FaultyOps {
        fail_swap: true,
        ..FaultyOps::new(&paths)
    };

    let result = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .with_file_ops(Box::new(ops.clone()))
        .apply(&delta(OLD, NEW));

    assert_eq!(SwapOutcome::of(&result), SwapOutcome::FailedBeforeReplace);
    let err = result.unwrap_err();
    assert!(!err.is_fatal());
    assert!(matches!(
        err,
        UpdateError::Filesystem {
            stage: SwapState::BackedUp,
            ..
        }
    ));
    assert_eq!(std::fs::read(&paths.current).unwrap(), OLD);
    assert!(!paths.backup.exists());
    assert!(!paths.staging.exists());
    assert!(ops
        .log()
        .contains(&"rename backup -> current".to_owned()));
}

#[test]
fn failed_swap_and_restore_is_unrecoverable_and_names_backup() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());
    let ops = FaultyOps {
        fail_swap: true,
        fail_restore: true,
        ..FaultyOps::new(&paths)
    };

    let result = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .with_file_ops(Box::new(ops))
        .apply(&delta(OLD, NEW));

    assert_eq!(
        SwapOutcome::of(&result),
        SwapOutcome::Unrecoverable {
            backup: paths.backup.clone()
        }
    );
    let err = result.unwrap_err();
    assert!(err.is_fatal());
    match &err {
        UpdateError::UnrecoverableSwap {
            current, backup, ..
        } => {
            assert_eq!(current, &paths.current);
            assert_eq!(backup, &paths.backup);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(&paths.backup.display().to_string()));

    // The previous binary is recoverable by hand from the backup path.
    assert!(!paths.current.exists());
    assert_eq!(std::fs::read(&paths.backup).unwrap(), OLD);
}

#[test]
fn corrupt_delta_leaves_directory_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());
    let ops = FaultyOps::new(&paths);

    let err = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .with_file_ops(Box::new(ops.clone()))
        .apply(&DeltaPayload::new(b"BSDIFF40 but truncated".to_vec()))
        .unwrap_err();

    assert!(matches!(err, UpdateError::Patch(_)));
    assert_eq!(entries(dir.path()), vec![paths.current.clone()]);
    assert_eq!(std::fs::read(&paths.current).unwrap(), OLD);
    assert!(ops.log().is_empty());
}

#[test]
fn retained_backup_is_replaced_by_next_update() {
    let dir = tempfile::tempdir().unwrap();
    let paths = install(dir.path());

    let first = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .keep_backup(true)
        .apply(&delta(OLD, NEW))
        .unwrap();
    assert!(matches!(first, SwapOutcome::RetainedBackup { .. }));
    assert_eq!(std::fs::read(&paths.backup).unwrap(), OLD);

    let newest = b"\x7fELF demo 1.2.0".to_vec();
    let second = PatchApplier::new(paths.clone(), BsdiffPatcher)
        .apply(&delta(NEW, &newest))
        .unwrap();
    assert_eq!(second, SwapOutcome::Replaced);
    assert_eq!(std::fs::read(&paths.current).unwrap(), newest);
    assert!(!paths.backup.exists());
}
