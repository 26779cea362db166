//! The update pipeline: check, download, apply, reload.
//!
//! Phases run strictly in sequence on the calling thread. A failure in any
//! phase stops the pipeline and is returned as-is; retrying is up to the
//! caller. Concurrent updates of the same executable must be serialized by
//! the caller.

use crate::applier::{PatchApplier, SwapOutcome};
use crate::checker::VersionChecker;
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::fetcher::{DeltaFetcher, DeltaPayload};
use crate::patcher::BsdiffPatcher;
use crate::progress::DownloadProgress;
use crate::request::{DownloadRequest, UpdateAnswer, UpdateRequest};
use crate::restart::ProcessRestarter;
use crate::transport::{self, TransportConfig};
use std::cell::Cell;
use std::convert::Infallible;

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The Version Service has nothing newer. No file was touched.
    UpToDate,
    /// The executable was replaced.
    Updated {
        /// Version now on disk.
        version: String,
        /// How the swap ended.
        outcome: SwapOutcome,
    },
}

/// Drives the four update phases for one executable.
#[derive(Debug)]
pub struct Updater {
    request: UpdateRequest,
    checker: VersionChecker,
    fetcher: DeltaFetcher,
    applier: PatchApplier,
    restarter: ProcessRestarter,
}

impl Updater {
    /// Creates an updater for the running executable at `version`, applying
    /// bsdiff deltas.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Config`] if `config` is invalid
    /// - [`UpdateError::CurrentExe`] if the executable path is unknown
    pub fn new(config: &UpdaterConfig, version: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let agent = transport::build_agent(&TransportConfig::from(config));
        let applier = PatchApplier::for_current_exe(BsdiffPatcher)?.keep_backup(config.keep_backup);

        Ok(Self::from_parts(
            UpdateRequest::from_config(config, version),
            VersionChecker::new(agent.clone()),
            DeltaFetcher::new(agent),
            applier,
            ProcessRestarter::default(),
        ))
    }

    /// Assembles an updater from individually configured phases.
    pub fn from_parts(
        request: UpdateRequest,
        checker: VersionChecker,
        fetcher: DeltaFetcher,
        applier: PatchApplier,
        restarter: ProcessRestarter,
    ) -> Self {
        Self {
            request,
            checker,
            fetcher,
            applier,
            restarter,
        }
    }

    /// The request identifying this application.
    pub fn request(&self) -> &UpdateRequest {
        &self.request
    }

    /// The applier, e.g. to call
    /// [`remove_retained_backup`](PatchApplier::remove_retained_backup) at
    /// startup.
    pub fn applier(&self) -> &PatchApplier {
        &self.applier
    }

    /// Runs the check phase.
    ///
    /// # Errors
    ///
    /// See [`VersionChecker::check`].
    pub fn check(&self) -> Result<UpdateAnswer> {
        self.checker.check(&self.request)
    }

    /// Runs the download phase for the version announced by `answer`.
    ///
    /// # Errors
    ///
    /// See [`DeltaFetcher::download`].
    pub fn download<P>(&self, answer: &UpdateAnswer, mut on_progress: P) -> Result<DeltaPayload>
    where
        P: FnMut(&DownloadProgress),
    {
        let request = DownloadRequest::new(self.request.clone(), &answer.new_version);
        let total = Cell::new(None);
        let mut progress = DownloadProgress::default();
        self.fetcher.download(
            &request,
            |expected| total.set(expected),
            |bytes| {
                progress.total = total.get();
                progress.advance(bytes);
                on_progress(&progress);
            },
        )
    }

    /// Runs the apply phase.
    ///
    /// # Errors
    ///
    /// See [`PatchApplier::apply`].
    pub fn apply(&self, delta: &DeltaPayload) -> Result<SwapOutcome> {
        self.applier.apply(delta)
    }

    /// Restarts into the executable on disk. Only returns on failure.
    ///
    /// # Errors
    ///
    /// See [`ProcessRestarter::reload`].
    pub fn reload(&self) -> Result<Infallible> {
        self.restarter.reload()
    }

    /// Checks, downloads, and applies an update. Does not restart.
    ///
    /// A "no update" answer from either endpoint yields
    /// [`UpdateStatus::UpToDate`] without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Any error from the individual phases except
    /// [`UpdateError::NoUpdateAvailable`].
    pub fn run<P>(&self, on_progress: P) -> Result<UpdateStatus>
    where
        P: FnMut(&DownloadProgress),
    {
        let answer = match self.check() {
            Ok(answer) => answer,
            Err(UpdateError::NoUpdateAvailable) => return Ok(UpdateStatus::UpToDate),
            Err(e) => return Err(e),
        };

        let delta = match self.download(&answer, on_progress) {
            Ok(delta) => delta,
            Err(UpdateError::NoUpdateAvailable) => return Ok(UpdateStatus::UpToDate),
            Err(e) => return Err(e),
        };

        let outcome = self.apply(&delta)?;
        tracing::info!(version = %answer.new_version, ?outcome, "update applied");
        Ok(UpdateStatus::Updated {
            version: answer.new_version,
            outcome,
        })
    }

    /// Like [`run`](Self::run), then restarts when an update was applied.
    ///
    /// Returns only when up to date, or on error.
    ///
    /// # Errors
    ///
    /// Any error from [`run`](Self::run) or [`reload`](Self::reload).
    pub fn run_and_reload<P>(&self, on_progress: P) -> Result<UpdateStatus>
    where
        P: FnMut(&DownloadProgress),
    {
        match self.run(on_progress)? {
            UpdateStatus::UpToDate => Ok(UpdateStatus::UpToDate),
            UpdateStatus::Updated { .. } => match self.reload()? {},
        }
    }
}
