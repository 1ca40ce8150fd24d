use std::time::Duration;

use chrono::{Days, Utc};
use filehub::HubError;
use filehub::models::FileFilter;

use crate::common::TestApp;

/// Uploads in order with a short pause so upload times are distinct.
async fn seed(app: &TestApp, files: &[(&str, &[u8])]) {
    for (name, bytes) in files {
        app.upload(name, bytes).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn names(files: &[filehub::models::FileView]) -> Vec<&str> {
    files.iter().map(|f| f.original_name.as_str()).collect()
}

mod list_order {
    use super::*;

    #[tokio::test]
    async fn newest_first_without_filters() {
        let app = TestApp::spawn().await;
        seed(&app, &[("one.txt", b"1"), ("two.txt", b"2"), ("three.txt", b"3")]).await;

        let files = app.hub.list(&FileFilter::default()).await.unwrap();

        assert_eq!(names(&files), ["three.txt", "two.txt", "one.txt"]);
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let app = TestApp::spawn().await;

        let files = app.hub.list(&FileFilter::default()).await.unwrap();

        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn duplicates_are_flagged_in_listing() {
        let app = TestApp::spawn().await;
        seed(&app, &[("a.txt", b"same"), ("b.txt", b"same"), ("c.txt", b"other")]).await;

        let files = app.hub.list(&FileFilter::default()).await.unwrap();

        let flags: Vec<bool> = files.iter().map(|f| f.is_duplicate).collect();
        assert_eq!(flags, [false, true, true]);
    }
}

mod list_filters {
    use super::*;

    #[tokio::test]
    async fn name_contains_is_case_insensitive() {
        let app = TestApp::spawn().await;
        seed(
            &app,
            &[
                ("report_final.pdf", b"final"),
                ("report_draft.txt", b"draft"),
                ("summary.txt", b"summary"),
            ],
        )
        .await;

        let filter = FileFilter {
            name_contains: Some("REPORT".into()),
            ..Default::default()
        };
        let files = app.hub.list(&filter).await.unwrap();

        assert_eq!(names(&files), ["report_draft.txt", "report_final.pdf"]);
    }

    #[tokio::test]
    async fn name_contains_folds_non_ascii_case() {
        let app = TestApp::spawn().await;
        seed(
            &app,
            &[("ÜBERSICHT.pdf", b"overview"), ("Straße.txt", b"street"), ("other.txt", b"x")],
        )
        .await;

        let filter = FileFilter {
            name_contains: Some("übersicht".into()),
            ..Default::default()
        };
        assert_eq!(names(&app.hub.list(&filter).await.unwrap()), ["ÜBERSICHT.pdf"]);

        let filter = FileFilter {
            name_contains: Some("STRAßE".into()),
            ..Default::default()
        };
        assert_eq!(names(&app.hub.list(&filter).await.unwrap()), ["Straße.txt"]);
    }

    #[tokio::test]
    async fn extension_ignores_case_and_leading_dot() {
        let app = TestApp::spawn().await;
        seed(
            &app,
            &[("a.TXT", b"a"), ("b.txt", b"b"), ("c.pdf", b"c"), ("txt", b"d")],
        )
        .await;

        for ext in ["txt", ".txt", "TXT"] {
            let filter = FileFilter {
                extension: Some(ext.into()),
                ..Default::default()
            };
            let files = app.hub.list(&filter).await.unwrap();
            assert_eq!(names(&files), ["b.txt", "a.TXT"], "extension {ext:?}");
        }
    }

    #[tokio::test]
    async fn content_type_is_exact_and_case_insensitive() {
        let app = TestApp::spawn().await;
        seed(&app, &[("a.png", b"png"), ("b.txt", b"text")]).await;

        let filter = FileFilter {
            content_type_exact: Some("IMAGE/PNG".into()),
            ..Default::default()
        };
        let files = app.hub.list(&filter).await.unwrap();
        assert_eq!(names(&files), ["a.png"]);

        let filter = FileFilter {
            content_type_exact: Some("image".into()),
            ..Default::default()
        };
        assert!(app.hub.list(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn size_bounds_are_inclusive() {
        let app = TestApp::spawn().await;
        seed(
            &app,
            &[("s.bin", &[0u8; 5]), ("m.bin", &[1u8; 10]), ("l.bin", &[2u8; 20])],
        )
        .await;

        let filter = FileFilter {
            min_size: Some(5),
            max_size: Some(10),
            ..Default::default()
        };
        let files = app.hub.list(&filter).await.unwrap();
        assert_eq!(names(&files), ["m.bin", "s.bin"]);

        let filter = FileFilter {
            min_size: Some(11),
            ..Default::default()
        };
        assert_eq!(names(&app.hub.list(&filter).await.unwrap()), ["l.bin"]);
    }

    #[tokio::test]
    async fn date_bounds_cover_whole_days() {
        let app = TestApp::spawn().await;
        seed(&app, &[("today.txt", b"t")]).await;
        let today = Utc::now().date_naive();

        let filter = FileFilter {
            start_date: Some(today),
            end_date: Some(today),
            ..Default::default()
        };
        assert_eq!(names(&app.hub.list(&filter).await.unwrap()), ["today.txt"]);

        let filter = FileFilter {
            end_date: today.checked_sub_days(Days::new(1)),
            ..Default::default()
        };
        assert!(app.hub.list(&filter).await.unwrap().is_empty());

        let filter = FileFilter {
            start_date: today.checked_add_days(Days::new(1)),
            ..Default::default()
        };
        assert!(app.hub.list(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let app = TestApp::spawn().await;
        seed(
            &app,
            &[
                ("report.txt", b"short"),
                ("report.pdf", b"a much longer report body"),
                ("notes.txt", b"another long text body here"),
            ],
        )
        .await;

        let filter = FileFilter {
            name_contains: Some("report".into()),
            extension: Some("txt".into()),
            max_size: Some(10),
            ..Default::default()
        };
        let files = app.hub.list(&filter).await.unwrap();

        assert_eq!(names(&files), ["report.txt"]);
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected() {
        let app = TestApp::spawn().await;
        let today = Utc::now().date_naive();

        let filter = FileFilter {
            start_date: today.checked_add_days(Days::new(2)),
            end_date: Some(today),
            ..Default::default()
        };
        let err = app.hub.list(&filter).await.unwrap_err();

        assert!(matches!(err, HubError::InvalidFilter(_)));
    }
}
