use std::time::Duration;

use common::storage::ContentHash;

use crate::common::TestApp;

/// Replace a blob with a non-empty directory so removing it fails.
fn wedge_blob(app: &TestApp, content_hash: &str) -> std::path::PathBuf {
    let blob = app.blob_path(content_hash);
    std::fs::remove_file(&blob).unwrap();
    std::fs::create_dir(&blob).unwrap();
    std::fs::write(blob.join("inner"), b"x").unwrap();
    blob
}

mod reclaim_orphans {
    use super::*;

    #[tokio::test]
    async fn nothing_to_do_on_clean_store() {
        let app = TestApp::spawn().await;
        app.upload("live.txt", b"still referenced").await;

        let summary = app.hub.reclaim_orphans(Duration::ZERO).await.unwrap();

        assert_eq!(summary.objects_reclaimed, 0);
        assert_eq!(summary.stray_blobs_removed, 0);
        assert_eq!(summary.staging_files_removed, 0);
        assert_eq!(summary.failures, 0);
        assert_eq!(app.physical_count().await, 1);
    }

    #[tokio::test]
    async fn failed_reclaim_is_picked_up_later() {
        let app = TestApp::spawn().await;
        let file = app.upload("stuck.txt", b"orphan to be").await;
        let blob = wedge_blob(&app, &file.content_hash);
        app.hub.delete(file.id).await.unwrap();
        assert_eq!(app.physical_count().await, 1);

        std::fs::remove_dir_all(&blob).unwrap();
        let summary = app.hub.reclaim_orphans(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(summary.objects_reclaimed, 1);
        assert_eq!(summary.failures, 0);
        assert_eq!(app.physical_count().await, 0);
        assert!(!blob.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn still_failing_orphan_is_counted() {
        let app = TestApp::spawn().await;
        let file = app.upload("stuck.txt", b"wedged").await;
        wedge_blob(&app, &file.content_hash);
        app.hub.delete(file.id).await.unwrap();

        let summary = app.hub.reclaim_orphans(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(summary.objects_reclaimed, 0);
        assert_eq!(summary.failures, 1);
        assert_eq!(app.physical_count().await, 1);
    }

    #[tokio::test]
    async fn referenced_objects_are_left_alone() {
        let app = TestApp::spawn().await;
        let orphan = app.upload("gone.txt", b"orphan").await;
        let live = app.upload("live.txt", b"live").await;
        let blob = wedge_blob(&app, &orphan.content_hash);
        app.hub.delete(orphan.id).await.unwrap();
        std::fs::remove_dir_all(&blob).unwrap();

        let summary = app.hub.reclaim_orphans(Duration::ZERO).await.unwrap();

        assert_eq!(summary.objects_reclaimed, 1);
        assert_eq!(app.physical_count().await, 1);
        assert!(app.blob_path(&live.content_hash).is_file());
    }

    #[tokio::test]
    async fn stale_staging_files_are_removed() {
        let app = TestApp::spawn().await;
        std::fs::write(app.storage_root.join(".tmp").join("crashed-upload"), b"half").unwrap();
        assert_eq!(app.staging_files(), 1);

        let kept = app.hub.reclaim_orphans(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(kept.staging_files_removed, 0);
        assert_eq!(app.staging_files(), 1);

        let swept = app.hub.reclaim_orphans(Duration::ZERO).await.unwrap();
        assert_eq!(swept.staging_files_removed, 1);
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn blob_without_row_is_removed() {
        let app = TestApp::spawn().await;
        let live = app.upload("live.txt", b"kept").await;

        // What an upload cancelled between persisting and committing leaves.
        let stray = ContentHash::compute(b"never committed").to_hex();
        let blob = app.blob_path(&stray);
        std::fs::create_dir_all(blob.parent().unwrap()).unwrap();
        std::fs::write(&blob, b"never committed").unwrap();

        let summary = app.hub.reclaim_orphans(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(summary.stray_blobs_removed, 1);
        assert_eq!(summary.objects_reclaimed, 0);
        assert_eq!(summary.failures, 0);
        assert!(!blob.exists());
        assert!(!blob.parent().unwrap().exists());
        assert!(app.blob_path(&live.content_hash).is_file());
        assert_eq!(app.physical_count().await, 1);
    }

    #[tokio::test]
    async fn stray_blob_content_can_be_uploaded_again() {
        let app = TestApp::spawn().await;
        let stray = ContentHash::compute(b"comes back").to_hex();
        let blob = app.blob_path(&stray);
        std::fs::create_dir_all(blob.parent().unwrap()).unwrap();
        std::fs::write(&blob, b"comes back").unwrap();

        app.hub.reclaim_orphans(Duration::ZERO).await.unwrap();
        let file = app.upload("back.txt", b"comes back").await;

        assert_eq!(file.content_hash, stray);
        assert!(!file.is_duplicate);
        assert!(app.blob_path(&file.content_hash).is_file());
    }
}
