use filehub::{HubError, UploadRequest};
use tokio::io::AsyncReadExt;

use crate::common::{BrokenStream, TestApp, reader};

mod upload_dedup {
    use super::*;

    #[tokio::test]
    async fn same_bytes_under_two_names_share_one_object() {
        let app = TestApp::spawn().await;

        let first = app.upload("a.txt", b"identical payload").await;
        let second = app.upload("b.txt", b"identical payload").await;

        assert_ne!(first.id, second.id);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.url, second.url);
        assert!(!first.is_duplicate);
        assert!(second.is_duplicate);
        assert_eq!(app.physical_count().await, 1);
        assert_eq!(app.logical_count().await, 2);
        assert!(app.blob_path(&first.content_hash).is_file());
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn view_reports_size_hash_and_url() {
        let app = TestApp::spawn().await;

        let file = app.upload("abc.txt", b"abc").await;

        assert_eq!(file.original_name, "abc.txt");
        assert_eq!(file.size, 3);
        assert_eq!(
            file.content_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            file.url,
            "/media/ba/78/16bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn distinct_bytes_get_distinct_objects() {
        let app = TestApp::spawn().await;

        let a = app.upload("same-name.txt", b"version one").await;
        let b = app.upload("same-name.txt", b"version two").await;

        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(app.physical_count().await, 2);
        assert!(!b.is_duplicate);
    }

    #[tokio::test]
    async fn empty_file_is_stored() {
        let app = TestApp::spawn().await;

        let file = app.upload("empty.txt", b"").await;

        assert_eq!(file.size, 0);
        assert!(app.blob_path(&file.content_hash).is_file());
    }
}

mod upload_content_type {
    use super::*;

    #[tokio::test]
    async fn guessed_from_name() {
        let app = TestApp::spawn().await;

        let file = app.upload("photo.jpg", b"JPEG").await;

        assert_eq!(file.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn declared_type_is_used() {
        let app = TestApp::spawn().await;

        let file = app
            .hub
            .upload(
                reader(b"a,b\n1,2\n"),
                UploadRequest::new("data.bin").content_type("text/csv"),
            )
            .await
            .unwrap();

        assert_eq!(file.content_type, "text/csv");
    }

    #[tokio::test]
    async fn unknown_extension_is_octet_stream() {
        let app = TestApp::spawn().await;

        let file = app.upload("blob.zzzunknown", b"?").await;

        assert_eq!(file.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn duplicates_keep_first_type() {
        let app = TestApp::spawn().await;

        app.upload("photo.jpg", b"JPEG bytes").await;
        let dup = app.upload("copy.png", b"JPEG bytes").await;

        assert_eq!(dup.content_type, "image/jpeg");
        assert!(dup.is_duplicate);
    }
}

mod upload_rejections {
    use super::*;

    #[tokio::test]
    async fn observed_size_over_limit_leaves_nothing() {
        let app = TestApp::spawn_with_limit(16).await;

        let err = app.try_upload("big.bin", &[7u8; 32]).await.unwrap_err();

        assert!(matches!(
            err,
            HubError::SizeLimitExceeded { limit: 16, .. }
        ));
        assert_eq!(app.physical_count().await, 0);
        assert_eq!(app.logical_count().await, 0);
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn declared_size_over_limit_is_rejected_up_front() {
        let app = TestApp::spawn_with_limit(16).await;

        let err = app
            .hub
            .upload(
                reader(b"tiny"),
                UploadRequest::new("claims-big.bin").declared_size(1000),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HubError::SizeLimitExceeded {
                actual: 1000,
                limit: 16
            }
        ));
        assert_eq!(app.logical_count().await, 0);
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn exactly_at_limit_is_accepted() {
        let app = TestApp::spawn_with_limit(16).await;

        let file = app.upload("fits.bin", &[1u8; 16]).await;

        assert_eq!(file.size, 16);
    }

    #[tokio::test]
    async fn broken_stream_is_a_read_error() {
        let app = TestApp::spawn().await;

        let err = app
            .hub
            .upload(BrokenStream::boxed(b"partial"), UploadRequest::new("cut.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::Read(_)));
        assert_eq!(app.physical_count().await, 0);
        assert_eq!(app.logical_count().await, 0);
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_reading() {
        let app = TestApp::spawn().await;

        for name in ["", "   ", "bad\nname.txt"] {
            let err = app.try_upload(name, b"content").await.unwrap_err();
            assert!(matches!(err, HubError::InvalidName(_)), "accepted {name:?}");
        }
        assert_eq!(app.logical_count().await, 0);
        assert_eq!(app.staging_files(), 0);
    }

    #[tokio::test]
    async fn path_components_are_stripped_from_names() {
        let app = TestApp::spawn().await;

        let file = app.upload("/home/me/Documents/notes.md", b"# notes").await;

        assert_eq!(file.original_name, "notes.md");
    }
}

mod get_and_open {
    use super::*;

    #[tokio::test]
    async fn get_returns_view() {
        let app = TestApp::spawn().await;
        let file = app.upload("a.txt", b"hello").await;

        let fetched = app.hub.get(file.id).await.unwrap();

        assert_eq!(fetched.id, file.id);
        assert_eq!(fetched.original_name, "a.txt");
        assert_eq!(fetched.content_hash, file.content_hash);
        assert_eq!(fetched.size, 5);
        assert_eq!(fetched.content_type, "text/plain");
        assert!(!fetched.is_duplicate);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let app = TestApp::spawn().await;

        let err = app.hub.get(uuid::Uuid::now_v7()).await.unwrap_err();

        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn open_content_streams_bytes() {
        let app = TestApp::spawn().await;
        let file = app.upload("a.txt", b"stream me back").await;

        let (view, mut content) = app.hub.open_content(file.id).await.unwrap();
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await.unwrap();

        assert_eq!(view.id, file.id);
        assert_eq!(buf, b"stream me back");
    }
}
