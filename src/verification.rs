//! Resumable integrity verification
//!
//! A verification job independently audits one archive's stored content
//! against its own recorded checksums. The audit is resumable: results are
//! collected in a [`VerificationState`] checkpoint that is persisted
//! periodically during the run and once more at the end, so an interrupted
//! audit loses at most one checkpoint period of work.
//!
//! ## Scheduling
//!
//! Files verified successfully within the last 24 hours are trusted and
//! skipped. The remainder is audited oldest-or-never-verified first, so the
//! files with the least recent confirmation are always re-checked before
//! fresher ones.
//!
//! ## Concurrency
//!
//! [`VerificationJob::execute`] runs two logical tasks under a shared
//! cancellation scope: the worker, which verifies one file at a time, and
//! the checkpoint saver, which flushes the accumulated state on a period
//! (default 15s, doubled whenever a save outlasts the period so slow
//! checkpoint storage never starves the worker). When the worker finishes
//! for any reason it cancels a derived monitoring scope, which lets the
//! saver perform one final flush past its last tick and stop.
//!
//! The state is the one shared-mutable object in the core; the worker
//! writes results and the saver reads snapshots, both through a single
//! mutex.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::archive::{ArchiveReader, VerifiableArchive};
use crate::error::{ArchiveError, Result, ResultExt};
use crate::logger::ProgressLogger;

/// Default period between checkpoint saves
pub const DEFAULT_PROGRESS_SAVE_PERIOD: Duration = Duration::from_secs(15);

/// Freshness window within which a past successful verification is trusted
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Record of a successful file verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRecord {
    /// When the file last verified clean
    pub verified_at: DateTime<Utc>,
}

/// Record of a failed file verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// When the failure was observed
    pub verified_at: DateTime<Utc>,
    /// What the check found, e.g. "file was modified"
    pub error_message: String,
}

/// Accumulated verification results, persisted as a checkpoint
///
/// Serialized as an object with two maps keyed by path; drivers write it to
/// a temporary location and atomically rename into place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationState {
    /// Paths that verified clean, with their verification time
    pub correct_files: BTreeMap<String, SuccessRecord>,
    /// Paths that failed verification, with time and reason
    pub error_files: BTreeMap<String, ErrorRecord>,
}

impl VerificationState {
    fn add_success(&mut self, path: &str, at: DateTime<Utc>) {
        self.error_files.remove(path);
        self.correct_files
            .insert(path.to_string(), SuccessRecord { verified_at: at });
    }

    fn add_corrupted(&mut self, path: &str, message: String, at: DateTime<Utc>) {
        self.correct_files.remove(path);
        self.error_files.insert(
            path.to_string(),
            ErrorRecord {
                verified_at: at,
                error_message: message,
            },
        );
    }
}

/// Configuration of a single verification job
pub struct JobOptions<'a> {
    /// Sink for user-facing progress lines
    pub logger: &'a dyn ProgressLogger,
    /// Also log every file that verifies clean
    pub log_verified_files: bool,
    /// Persistence callback invoked with state snapshots; `None` disables
    /// checkpointing
    pub progress_saver: Option<&'a (dyn Fn(&VerificationState) -> Result<()> + Send + Sync)>,
    /// Period between checkpoint saves
    pub progress_save_period: Duration,
}

/// One verification run over one archive
///
/// A job instance may be started exactly once; a second `execute` call is a
/// programming error and is reported as such.
pub struct VerificationJob<'a> {
    archive: &'a dyn VerifiableArchive,
    previous_state: VerificationState,
    options: JobOptions<'a>,

    state: Mutex<VerificationState>,
    started: AtomicBool,
}

impl<'a> VerificationJob<'a> {
    /// Create a job resuming from a previously persisted state
    ///
    /// The working state starts as a copy of `previous_state`, so records
    /// for skipped-because-fresh files survive into the next checkpoint.
    pub fn new(
        archive: &'a dyn VerifiableArchive,
        previous_state: VerificationState,
        options: JobOptions<'a>,
    ) -> Self {
        VerificationJob {
            archive,
            state: Mutex::new(previous_state.clone()),
            previous_state,
            options,
            started: AtomicBool::new(false),
        }
    }

    /// Run the job to completion, interruption or failure
    ///
    /// Returns the accumulated state regardless of the outcome, so partial
    /// audit results are never discarded. The outcome is an error when the
    /// run was interrupted, when checkpointing failed, or when at least one
    /// corrupted file was found.
    pub async fn execute(&self, cancel: &CancellationToken) -> (VerificationState, Result<()>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return (
                self.state.lock().clone(),
                Err(ArchiveError::JobAlreadyStarted),
            );
        }

        // The work scope is cancelled by the caller or by a failing saver;
        // the derived monitoring scope additionally ends when the worker
        // finishes, letting the saver flush once more and stop.
        let work = cancel.child_token();
        let monitoring = work.child_token();

        let worker = async {
            let result = self.run_worker(&work).await;
            monitoring.cancel();
            result
        };
        let saver = self.run_saver(&work, &monitoring);

        let (worker_result, saver_result) = tokio::join!(worker, saver);

        // A saver failure cancels the worker, so it is the root cause and
        // wins over the induced interruption.
        let outcome = saver_result.and(worker_result);
        (self.state.lock().clone(), outcome)
    }

    async fn run_worker(&self, cancel: &CancellationToken) -> Result<()> {
        let files_to_verify = self.prepare_list_to_verify()?;

        let result = self.verify_files(cancel, &files_to_verify).await;

        let state = self.state.lock();
        self.options
            .logger
            .log(&format!("OK files:        {}", state.correct_files.len()));
        self.options
            .logger
            .log(&format!("Corrupted files: {}", state.error_files.len()));

        result
    }

    async fn verify_files(&self, cancel: &CancellationToken, files: &[String]) -> Result<()> {
        self.options
            .logger
            .log(&format!("Found {} files to verify", files.len()));

        for (n, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                self.options.logger.log("Verification interrupted");
                return Err(ArchiveError::Interrupted);
            }

            match self.archive.verify_file_integrity(path) {
                Ok(()) => self.on_success(path),
                Err(err) => self.on_error(path, &err),
            }

            if (n + 1) % 10 == 0 || n + 1 == files.len() {
                self.options
                    .logger
                    .log(&format!("Verified {} of {} files", n + 1, files.len()));
            }

            // File boundary: give the checkpoint saver a chance to run.
            tokio::task::yield_now().await;
        }

        self.options.logger.log("Verification completed");

        let corrupted_files = self.state.lock().error_files.len();
        if corrupted_files > 0 {
            return Err(ArchiveError::integrity(format!(
                "found {corrupted_files} corrupted files"
            )));
        }

        Ok(())
    }

    async fn run_saver(&self, work: &CancellationToken, monitoring: &CancellationToken) -> Result<()> {
        let Some(saver) = self.options.progress_saver else {
            return Ok(());
        };

        let mut period = self.options.progress_save_period;

        loop {
            tokio::select! {
                _ = monitoring.cancelled() => {
                    // Guaranteed final flush, even past the last tick.
                    return self.save_progress(saver);
                }
                _ = tokio::time::sleep(period) => {
                    let started = Instant::now();
                    if let Err(err) = self.save_progress(saver) {
                        // Stop the worker; continuing to audit without
                        // checkpointing would silently lose resumability.
                        work.cancel();
                        return Err(err);
                    }
                    period = next_save_period(period, started.elapsed());
                }
            }
        }
    }

    fn save_progress(
        &self,
        saver: &(dyn Fn(&VerificationState) -> Result<()> + Send + Sync),
    ) -> Result<()> {
        let snapshot = self.state.lock().clone();
        debug!(
            correct = snapshot.correct_files.len(),
            corrupted = snapshot.error_files.len(),
            "saving verification checkpoint"
        );
        saver(&snapshot).context("progress save failed")
    }

    fn prepare_list_to_verify(&self) -> Result<Vec<String>> {
        let threshold = Utc::now() - ChronoDuration::hours(FRESHNESS_WINDOW_HOURS);

        let mut stored_files = self
            .archive
            .stored_files()
            .context("retrieve current archive stored files")?;
        stored_files.sort();

        self.drop_stale_error_records(&stored_files);

        let mut files_to_verify: Vec<String> = stored_files
            .into_iter()
            .filter(|path| match self.previous_state.correct_files.get(path) {
                Some(record) => record.verified_at <= threshold,
                None => true,
            })
            .collect();

        // Oldest-or-never-verified first; the sort is stable, so paths with
        // equal standing keep their lexicographic order.
        files_to_verify.sort_by(|a, b| {
            let a_record = self.previous_state.correct_files.get(a);
            let b_record = self.previous_state.correct_files.get(b);

            match (a_record, b_record) {
                (Some(a_rec), Some(b_rec)) => a_rec.verified_at.cmp(&b_rec.verified_at),
                (None, Some(_)) => CmpOrdering::Less,
                (Some(_), None) => CmpOrdering::Greater,
                (None, None) => CmpOrdering::Equal,
            }
        });

        Ok(files_to_verify)
    }

    /// Carried-over error records for paths the archive no longer stores
    /// describe files that were removed since the failure was observed; they
    /// cannot be re-verified and must not count against this run.
    fn drop_stale_error_records(&self, stored_files: &[String]) {
        let mut state = self.state.lock();
        let before = state.error_files.len();
        state
            .error_files
            .retain(|path, _| stored_files.binary_search(path).is_ok());

        let dropped = before - state.error_files.len();
        if dropped > 0 {
            debug!(dropped, "dropped error records for files no longer stored");
        }
    }

    fn on_success(&self, path: &str) {
        if self.options.log_verified_files {
            self.options.logger.log(&format!("INFO: valid file {path}"));
        }

        self.state.lock().add_success(path, Utc::now());
    }

    fn on_error(&self, path: &str, err: &ArchiveError) {
        warn!(path, %err, "file failed verification");
        self.options
            .logger
            .log(&format!("ERROR: corrupted {path}: {err}"));

        self.state.lock().add_corrupted(path, err.to_string(), Utc::now());
    }
}

/// Double the save period whenever a save outlasts it
fn next_save_period(period: Duration, save_duration: Duration) -> Duration {
    if save_duration > period {
        period * 2
    } else {
        period
    }
}

/// Options of the [`execute`] entry point
pub struct ExecuteOptions<'a> {
    /// Sink for user-facing progress lines
    pub logger: &'a dyn ProgressLogger,
    /// Also log every file that verifies clean
    pub log_verified_files: bool,
    /// Discard the persisted state and re-verify everything
    pub start_from_scratch: bool,
    /// Period between checkpoint saves, defaulted when `None`
    pub progress_save_period: Option<Duration>,
}

/// Verify an archive's stored content, resuming from its persisted state
///
/// Queries the archive for the verification capability and fails with a
/// capability-unsupported error if the driver lacks it. Otherwise loads the
/// persisted [`VerificationState`] (or starts empty when
/// `start_from_scratch`), runs a [`VerificationJob`] with checkpointing
/// wired to the archive, and returns the final state alongside the outcome.
pub async fn execute(
    cancel: &CancellationToken,
    archive: &dyn ArchiveReader,
    options: &ExecuteOptions<'_>,
) -> (VerificationState, Result<()>) {
    let Some(verifiable) = archive.as_verifiable() else {
        return (
            VerificationState::default(),
            Err(ArchiveError::CapabilityUnsupported(
                "integrity verification".to_string(),
            )),
        );
    };

    let previous_state = if options.start_from_scratch {
        VerificationState::default()
    } else {
        match verifiable
            .load_verification_state()
            .context("load verification state")
        {
            Ok(state) => state,
            Err(err) => return (VerificationState::default(), Err(err)),
        }
    };

    let saver = |state: &VerificationState| verifiable.save_verification_state(state);

    let job = VerificationJob::new(
        verifiable,
        previous_state,
        JobOptions {
            logger: options.logger,
            log_verified_files: options.log_verified_files,
            progress_saver: Some(&saver),
            progress_save_period: options
                .progress_save_period
                .unwrap_or(DEFAULT_PROGRESS_SAVE_PERIOD),
        },
    );

    job.execute(cancel).await
}
