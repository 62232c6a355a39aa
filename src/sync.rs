//! Synchronization planning and execution
//!
//! Turns a [`CompareResult`] plus policy [`SyncOptions`] into a concrete,
//! ordered sequence of copy/move/delete calls against a target archive.
//!
//! Execution is deliberately sequential: one file at a time, so that
//! partial-failure state and destination-exists conflicts stay
//! deterministic. The first error on any transfer, move or delete aborts
//! the whole sync; files already transferred remain committed. Because
//! identity is content-addressed and `save_file` never overwrites,
//! re-running the same sync after fixing the cause safely skips the
//! already-applied changes; the operation is idempotent at the
//! archive-pair level even though it is not transactional.
//!
//! Cancellation is cooperative and observed at file boundaries only; a
//! transfer already in flight runs to completion or failure.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::comparison::CompareResult;
use crate::error::{ArchiveError, Result, ResultExt};

/// Policy flags gating what a sync run is allowed to do
///
/// With no flag set, a sync only copies content missing from the target;
/// any detected relocation is an error. The reconciliation modes are
/// mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Eliminate placement drift with actual renames and deletes
    pub resolve_moves: bool,
    /// Allow resolve-moves to create additional duplicate copies
    pub enable_duplicate_increase: bool,
    /// Allow resolve-moves to delete surplus duplicate copies
    pub enable_duplicate_reduction: bool,
    /// Only ever add files, even when a move is suspected
    pub additive_duplicating: bool,
}

/// Execute a computed comparison against a target archive
///
/// Decision policy, evaluated once per invocation:
///
/// - both reconciliation modes requested at once is a configuration error;
///   nothing is touched
/// - relocations present with neither mode chosen is a policy error;
///   nothing is touched
/// - additive mode copies every missing path and never deletes or renames
/// - resolve-moves renames the matched pairs and, gated by the duplicate
///   flags, copies excess new duplicates or deletes excess stale ones
///
/// After relocation handling, content missing from the target is copied one
/// file at a time in sorted order.
pub fn perform_sync(
    cancel: &CancellationToken,
    options: &SyncOptions,
    result: &CompareResult,
    source: &dyn ArchiveReader,
    target: &dyn ArchiveWriter,
) -> Result<()> {
    if options.resolve_moves && options.additive_duplicating {
        return Err(ArchiveError::policy(
            "use only one of resolve-moves or additive-duplicating",
        ));
    }

    if !result.relocations.is_empty() {
        if options.additive_duplicating {
            perform_additive_duplicating(cancel, result, source, target)
                .context("copy extra files")?;
        } else if options.resolve_moves {
            perform_relocations_sync(cancel, result, options, source, target)
                .context("relocate moved files")?;
        } else {
            return Err(ArchiveError::policy(
                "relocations detected, choose a reconciliation mode",
            ));
        }
    }

    perform_new_files_sync(cancel, result, source, target).context("copy new files")?;

    info!(
        relocations = result.relocations.len(),
        new_groups = result.unmatched_base_extras.len(),
        "sync finished"
    );

    Ok(())
}

fn perform_additive_duplicating(
    cancel: &CancellationToken,
    result: &CompareResult,
    source: &dyn ArchiveReader,
    target: &dyn ArchiveWriter,
) -> Result<()> {
    for relocation in &result.relocations {
        for file_to_copy in &relocation.missing_new_file_names {
            check_cancelled(cancel)?;

            copy_file(target, source, file_to_copy)
                .context(format!("transfer file {file_to_copy}"))?;
        }
    }

    Ok(())
}

fn perform_relocations_sync(
    cancel: &CancellationToken,
    result: &CompareResult,
    options: &SyncOptions,
    source: &dyn ArchiveReader,
    target: &dyn ArchiveWriter,
) -> Result<()> {
    for relocation in &result.relocations {
        let extra_original = &relocation.extra_original_file_names;
        let missing_new = &relocation.missing_new_file_names;

        if relocation.is_increasing_duplicates() {
            if !options.enable_duplicate_increase {
                return Err(ArchiveError::policy(
                    "duplicate increase requires enable-duplicate-increase",
                ));
            }

            for extra_duplication in &missing_new[extra_original.len()..] {
                check_cancelled(cancel)?;

                copy_file(target, source, extra_duplication)
                    .context(format!("create duplication {extra_duplication}"))?;
            }
        }

        if relocation.is_decreasing_duplicates() {
            if !options.enable_duplicate_reduction {
                return Err(ArchiveError::policy(
                    "duplicate reduction requires enable-duplicate-reduction",
                ));
            }

            for extra_duplication in &extra_original[missing_new.len()..] {
                check_cancelled(cancel)?;

                target
                    .delete_file(extra_duplication)
                    .context(format!("remove extra duplication {extra_duplication}"))?;
            }
        }

        for (from, to) in extra_original.iter().zip(missing_new.iter()) {
            check_cancelled(cancel)?;

            debug!(from, to, "moving file");
            target
                .move_file(from, to)
                .context(format!("move {from} -> {to}"))?;
        }
    }

    Ok(())
}

fn perform_new_files_sync(
    cancel: &CancellationToken,
    result: &CompareResult,
    source: &dyn ArchiveReader,
    target: &dyn ArchiveWriter,
) -> Result<()> {
    for source_extra_group in &result.unmatched_base_extras {
        for file_to_push in &source_extra_group.filenames {
            check_cancelled(cancel)?;

            copy_file(target, source, file_to_push)
                .context(format!("transfer file {file_to_push}"))?;
        }
    }

    Ok(())
}

fn copy_file(target: &dyn ArchiveWriter, source: &dyn ArchiveReader, path: &str) -> Result<()> {
    let (info, mut reader) = source.open_file(path).context("open file")?;

    debug!(path, length = info.length, "copying file");
    target.save_file(&mut reader, &info)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ArchiveError::Interrupted);
    }
    Ok(())
}
