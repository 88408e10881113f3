mod common;

use common::run_queue;
use storj_transfer::bridge::{BridgeClient, LocalBridge};
use storj_transfer::config::Operation;
use storj_transfer::transfer::{BatchReport, CancelController, Outcome};
use storj_transfer::uri::FileTarget;
use storj_transfer::utils::error::TransferError;

#[tokio::test]
async fn upload_directory_then_download_everything() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    let src = tempfile::tempdir().unwrap();
    std::fs::create_dir(src.path().join("nested")).unwrap();
    std::fs::write(src.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(src.path().join("nested/b.txt"), "beta").unwrap();
    let out = tempfile::tempdir().unwrap();
    let lists = tempfile::tempdir().unwrap();

    let bridge = LocalBridge::new(root.path()).with_chunk_size(2);
    let cancel = CancelController::manual();

    let uploaded = run_queue(
        &bridge,
        Operation::Upload {
            bucket: "docs".into(),
            source: src.path().into(),
            requested_name: None,
            recursive: true,
        },
        lists.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();
    assert_eq!(
        uploaded,
        Outcome::Done(BatchReport {
            succeeded: 2,
            failed: 0
        })
    );

    let files = bridge
        .list_files(&LocalBridge::bucket_id("docs"))
        .await
        .unwrap();
    let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.txt"]);

    let downloaded = run_queue(
        &bridge,
        Operation::Download {
            bucket: "docs".into(),
            target: FileTarget::All,
            dest: Some(out.path().into()),
        },
        lists.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();
    assert_eq!(
        downloaded,
        Outcome::Done(BatchReport {
            succeeded: 2,
            failed: 0
        })
    );
    assert_eq!(std::fs::read_to_string(out.path().join("a.txt")).unwrap(), "alpha");
    assert_eq!(std::fs::read_to_string(out.path().join("b.txt")).unwrap(), "beta");
}

#[tokio::test]
async fn single_download_to_a_new_path() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    std::fs::write(root.path().join("docs/report.txt"), "quarterly").unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("sub/copy.txt");

    let bridge = LocalBridge::new(root.path());
    let cancel = CancelController::manual();
    let outcome = run_queue(
        &bridge,
        Operation::Download {
            bucket: "docs".into(),
            target: FileTarget::Named("report.txt".into()),
            dest: Some(target.clone()),
        },
        out.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        Outcome::Done(BatchReport {
            succeeded: 1,
            failed: 0
        })
    );
    assert_eq!(std::fs::read_to_string(target).unwrap(), "quarterly");
}

#[tokio::test]
async fn unknown_bucket_is_reported_by_name() {
    let root = tempfile::tempdir().unwrap();
    let lists = tempfile::tempdir().unwrap();
    let bridge = LocalBridge::new(root.path());
    let cancel = CancelController::manual();

    let result = run_queue(
        &bridge,
        Operation::GetBucketId {
            bucket: "nope".into(),
        },
        lists.path(),
        &cancel,
        false,
    )
    .await;

    assert!(matches!(result, Err(TransferError::BucketNotFound { name }) if name == "nope"));
}

#[tokio::test]
async fn add_bucket_then_remove_its_file_and_itself() {
    let root = tempfile::tempdir().unwrap();
    let lists = tempfile::tempdir().unwrap();
    let bridge = LocalBridge::new(root.path());
    let cancel = CancelController::manual();

    run_queue(
        &bridge,
        Operation::AddBucket {
            name: "photos".into(),
        },
        lists.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();
    std::fs::write(root.path().join("photos/cat.png"), "png").unwrap();

    run_queue(
        &bridge,
        Operation::RemoveFile {
            bucket: "photos".into(),
            file: "cat.png".into(),
        },
        lists.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();
    assert!(!root.path().join("photos/cat.png").exists());

    run_queue(
        &bridge,
        Operation::RemoveBucket {
            bucket: "photos".into(),
        },
        lists.path(),
        &cancel,
        false,
    )
    .await
    .unwrap();
    assert!(bridge.list_buckets().await.unwrap().is_empty());
}
