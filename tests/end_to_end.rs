//! End-to-end flow over the public API: compare, reconcile, audit.

use archivekeep::comparison::compare;
use archivekeep::logger::BufferLogger;
use archivekeep::memory::MemoryArchive;
use archivekeep::sync::{perform_sync, SyncOptions};
use archivekeep::verification::{self, ExecuteOptions};
use archivekeep::VerifiableArchive;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn archive_with(contents: &[(&str, &str)]) -> MemoryArchive {
    let archive = MemoryArchive::new();
    for (path, content) in contents {
        archive.add(path, content.as_bytes()).unwrap();
    }
    archive
}

#[tokio::test]
async fn mirror_reorganized_archive_and_audit_it() {
    init_tracing();

    let primary = archive_with(&[
        ("photos/2024/beach.jpg", "beach bytes"),
        ("photos/2024/city.jpg", "city bytes"),
        ("documents/taxes.pdf", "taxes bytes"),
    ]);
    let mirror = archive_with(&[
        // Same content, pre-reorganization layout.
        ("beach.jpg", "beach bytes"),
        ("city.jpg", "city bytes"),
    ]);

    // First pass: relocations require an explicit mode.
    let result = compare(&primary, &mirror).unwrap();
    assert_eq!(result.relocations.len(), 2);
    assert!(perform_sync(
        &CancellationToken::new(),
        &SyncOptions::default(),
        &result,
        &primary,
        &mirror,
    )
    .is_err());

    // Resolve the moves and push the missing document.
    let options = SyncOptions {
        resolve_moves: true,
        ..SyncOptions::default()
    };
    perform_sync(
        &CancellationToken::new(),
        &options,
        &result,
        &primary,
        &mirror,
    )
    .unwrap();

    assert_eq!(
        mirror.paths(),
        vec![
            "documents/taxes.pdf",
            "photos/2024/beach.jpg",
            "photos/2024/city.jpg",
        ]
    );

    // The pair is now in sync and a second run is a no-op.
    let remaining = compare(&primary, &mirror).unwrap();
    assert!(remaining.is_in_sync());
    perform_sync(
        &CancellationToken::new(),
        &options,
        &remaining,
        &primary,
        &mirror,
    )
    .unwrap();

    // The mirrored content audits clean.
    let log = BufferLogger::new();
    let (state, outcome) = verification::execute(
        &CancellationToken::new(),
        &mirror,
        &ExecuteOptions {
            logger: &log,
            log_verified_files: false,
            start_from_scratch: false,
            progress_save_period: None,
        },
    )
    .await;

    outcome.unwrap();
    assert_eq!(state.correct_files.len(), 3);
    assert!(state.error_files.is_empty());
    assert!(log
        .lines()
        .contains(&"OK files:        3".to_string()));
}

#[tokio::test]
async fn corruption_on_the_mirror_is_reported_not_papered_over() {
    init_tracing();

    let mirror = archive_with(&[("a", "1"), ("b", "2")]);

    mirror.corrupt_file("b", "flipped bits".as_bytes());

    let log = BufferLogger::new();
    let (state, outcome) = verification::execute(
        &CancellationToken::new(),
        &mirror,
        &ExecuteOptions {
            logger: &log,
            log_verified_files: false,
            start_from_scratch: false,
            progress_save_period: None,
        },
    )
    .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "found 1 corrupted files");
    assert_eq!(state.error_files["b"].error_message, "file was modified");

    // The checkpoint carrying the finding was persisted to the archive.
    let persisted = mirror.load_verification_state().unwrap();
    assert_eq!(persisted, state);
}
