//! selfpatch: incremental self-update for desktop and CLI executables.
//!
//! A running program asks a Version Service whether a newer build exists,
//! downloads a binary delta, patches itself on disk, and restarts in place:
//! Check → Download → Apply → Reload.
//!
//! # Architecture
//!
//! - **[`VersionChecker`]**: `POST <base>/check`, distinguishing "no update"
//!   from failures
//! - **[`DeltaFetcher`]**: `POST <base>/download`, streaming the delta with
//!   progress callbacks
//! - **[`PatchApplier`]**: patches the executable into a staging file and
//!   swaps it in with two renames, so a crash or failed rename never leaves
//!   the host without a runnable binary
//! - **[`ProcessRestarter`]**: replaces the process with the updated binary,
//!   keeping arguments and environment
//! - **[`Updater`]**: runs the phases in order
//!
//! Platform differences (in-use executables on Windows, `exec` vs.
//! spawn-and-exit) live behind the [`platform::FileOps`] and
//! [`platform::ProcessImage`] traits.

pub mod applier;
pub mod checker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod patcher;
pub mod paths;
pub mod platform;
pub mod progress;
pub mod request;
pub mod restart;
pub mod transport;
pub mod updater;

pub use applier::{PatchApplier, SwapOutcome, SwapState};
pub use checker::VersionChecker;
pub use config::UpdaterConfig;
pub use error::{Result, UpdateError};
pub use fetcher::{DeltaFetcher, DeltaPayload};
pub use patcher::{BsdiffPatcher, Patcher};
pub use paths::ExecutablePathSet;
pub use progress::DownloadProgress;
pub use request::{DownloadRequest, UpdateAnswer, UpdateRequest};
pub use restart::ProcessRestarter;
pub use updater::{UpdateStatus, Updater};
