//! Integration tests for cleanup and statistics

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use libautoposter::accounts::AccountRegistry;
use libautoposter::platforms::mock::{MockConfig, MockPlatform};
use libautoposter::service::cleanup::{cleanup_client, CleanupItem, CleanupOutcome, CleanupService};
use libautoposter::service::stats::{export_views_with, ExportOutcome, StatsService};
use libautoposter::types::{MediaSummary, PlatformKind, PostSummary, SearchTerm};
use serde_json::json;

fn post(id: u64, date: &str) -> PostSummary {
    PostSummary {
        id,
        title: format!("Post {}", id),
        date: date.to_string(),
        url: Some(format!("https://blog.test/?p={}", id)),
    }
}

fn media(id: u64, url: &str) -> MediaSummary {
    MediaSummary {
        id,
        url: Some(url.to_string()),
    }
}

fn january_blog() -> MockPlatform {
    MockPlatform::wordpress("blog.test")
        .with_posts(vec![
            post(3, "2024-01-03T09:00:00+00:00"),
            post(1, "2024-01-01T09:00:00+00:00"),
            post(4, "2024-01-04T09:00:00+00:00"),
            post(2, "2024-01-02T09:00:00+00:00"),
        ])
        .with_media(vec![
            media(10, "https://blog.test/icon.png"),
            media(11, "https://blog.test/old-1.png"),
            media(12, "https://blog.test/logo.png"),
            media(13, "https://blog.test/old-2.png"),
        ])
        .with_site_info(json!({
            "icon": {"img": "https://blog.test/icon.png", "ico": "https://blog.test/icon.ico"},
            "logo": {"id": 5, "url": "https://blog.test/logo.png"}
        }))
}

#[tokio::test]
async fn test_keep_two_of_four() {
    let platform = january_blog();
    let state = platform.state();

    let report = cleanup_client(&platform, "blog", 2).await.unwrap();

    assert_eq!(report.deleted_posts, vec![1, 2]);
    assert_eq!(report.trash_emptied, 2);
    assert_eq!(report.deleted_media, 2);
    assert!(report.errors.is_empty());

    let state = state.lock().unwrap();
    let mut deleted_media = state.deleted_media.clone();
    deleted_media.sort_unstable();
    assert_eq!(deleted_media, vec![11, 13]);
    assert_eq!(
        state.posts.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![3, 4]
    );
    assert!(state.trash.is_empty());
}

#[tokio::test]
async fn test_nothing_to_delete_skips_later_passes() {
    for keep in [4, 10] {
        let platform = january_blog();
        let state = platform.state();

        let report = cleanup_client(&platform, "blog", keep).await.unwrap();
        assert!(report.deleted_posts.is_empty());
        assert_eq!(report.deleted_media, 0);

        let state = state.lock().unwrap();
        assert_eq!(state.count("empty_trash"), 0);
        assert_eq!(state.count("list_media"), 0);
    }
}

#[tokio::test]
async fn test_protected_media_never_deleted() {
    let platform = january_blog();
    let state = platform.state();

    cleanup_client(&platform, "blog", 0).await.unwrap();

    let state = state.lock().unwrap();
    assert!(!state.deleted_media.contains(&10));
    assert!(!state.deleted_media.contains(&12));
    assert_eq!(state.media.len(), 2);
}

#[tokio::test]
async fn test_pagination_stops_after_short_page() {
    let posts: Vec<PostSummary> = (1..=250)
        .map(|i| post(i, &format!("2023-{:02}-{:02}", (i % 12) + 1, (i % 28) + 1)))
        .collect();
    let platform = MockPlatform::wordpress("blog.test").with_posts(posts);
    let state = platform.state();

    let report = cleanup_client(&platform, "blog", 250).await.unwrap();
    assert!(report.deleted_posts.is_empty());

    let pages: Vec<u32> = state.lock().unwrap().post_pages.iter().map(|(p, _)| *p).collect();
    assert_eq!(pages, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_exactly_full_pages_need_one_empty_page() {
    let posts: Vec<PostSummary> = (1..=100).map(|i| post(i, "2024-02-01")).collect();
    let platform = MockPlatform::wordpress("blog.test").with_posts(posts);
    let state = platform.state();

    cleanup_client(&platform, "blog", 100).await.unwrap();

    let pages: Vec<u32> = state.lock().unwrap().post_pages.iter().map(|(p, _)| *p).collect();
    assert_eq!(pages, vec![1, 2]);
}

#[tokio::test]
async fn test_deletes_are_bounded_and_failures_recorded() {
    let mut config = MockConfig {
        name: "wordpress".to_string(),
        site: Some("blog.test".to_string()),
        delay: Duration::from_millis(20),
        ..Default::default()
    };
    config.failing_post_deletes.insert(7);
    config.failing_media_deletes.insert(31);

    let posts: Vec<PostSummary> = (1..=20).map(|i| post(i, &format!("2024-03-{:02}", i))).collect();
    let platform = MockPlatform::new(config)
        .with_posts(posts)
        .with_media(vec![media(30, "https://blog.test/a.png"), media(31, "https://blog.test/b.png")])
        .with_site_info(json!({}));
    let state = platform.state();

    let report = cleanup_client(&platform, "blog", 5).await.unwrap();

    assert_eq!(report.deleted_posts.len(), 14);
    assert!(!report.deleted_posts.contains(&7));
    assert!(report.errors["7"].contains("post 7 is locked"));
    assert!(report.errors["media:31"].contains("media 31 not found"));
    assert_eq!(report.deleted_media, 1);

    let max = state.lock().unwrap().max_in_flight;
    assert!(max <= 5, "at most five deletes in flight, saw {}", max);
    assert!(max > 1, "deletes should overlap");
}

#[tokio::test]
async fn test_batch_reports_each_account() {
    let registry = AccountRegistry::default()
        .with_client(PlatformKind::Wordpress, "blog", Box::new(january_blog()))
        .with_error(PlatformKind::Wordpress, "broken", "missing password");
    let service = CleanupService::new(Arc::new(registry));

    let results = service
        .cleanup_batch(&[
            CleanupItem { identifier: "blog".to_string(), keep_latest: 3 },
            CleanupItem { identifier: "broken".to_string(), keep_latest: 3 },
            CleanupItem { identifier: "ghost".to_string(), keep_latest: 3 },
        ])
        .await;

    assert_eq!(results.len(), 3);
    match &results[0] {
        CleanupOutcome::Completed(report) => assert_eq!(report.deleted_posts, vec![1]),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        serde_json::to_value(&results[1]).unwrap(),
        json!({"account": "broken", "error": "Account misconfigured"})
    );
    assert_eq!(
        serde_json::to_value(&results[2]).unwrap(),
        json!({"account": "ghost", "error": "Account not configured"})
    );
}

#[tokio::test]
async fn test_csv_export_rows() {
    let mut config = MockConfig {
        name: "wordpress".to_string(),
        site: Some("mysite".to_string()),
        ..Default::default()
    };
    config.failing_views.insert(3);
    let platform = MockPlatform::new(config)
        .with_posts(vec![post(1, "2024-01-01"), post(2, "2024-01-02"), post(3, "2024-01-03")])
        .with_daily_views(1, vec![0, 0, 1, 2, 3, 4, 5, 6, 7])
        .with_daily_views(2, vec![9]);

    let dir = tempfile::tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let (path, count) = export_views_with(&platform, "acc", 7, dir.path(), date).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(path.file_name().unwrap(), "wp_pv_mysite_20240601.csv");

    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(&path).unwrap();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();

    let mut header = vec!["site", "post_id", "title"];
    let days: Vec<String> = (1..=7).map(|i| format!("pv_day{}", i)).collect();
    header.extend(days.iter().map(String::as_str));
    assert_eq!(rows[0], header);
    assert_eq!(rows[1], vec!["mysite", "1", "Post 1", "1", "2", "3", "4", "5", "6", "7"]);
    assert_eq!(rows[2][3..], ["0", "0", "0", "0", "0", "0", "9"]);
    assert_eq!(rows[3][0..3], ["mysite", "3", "Post 3"]);
    assert!(rows[3][3].starts_with("error: "));
}

#[tokio::test]
async fn test_stats_service_lookups() {
    let platform = MockPlatform::wordpress("blog.test")
        .with_daily_views(5, vec![3, 4])
        .with_search_terms(vec![SearchTerm { term: "rust".to_string(), views: 12 }]);
    let registry = AccountRegistry::default().with_client(PlatformKind::Wordpress, "blog", Box::new(platform));
    let stats = StatsService::new(Arc::new(registry));

    assert_eq!(stats.post_views("blog", 5, 7).await.unwrap(), json!(7));
    assert_eq!(stats.search_terms("blog", 7).await.unwrap()[0].term, "rust");
    assert_eq!(stats.post_views("blog", 5, 31).await.unwrap_err().exit_code(), 3);
    assert_eq!(
        stats.search_terms("nobody", 7).await.unwrap_err().to_string(),
        "Account not configured"
    );

    let dir = tempfile::tempdir().unwrap();
    match stats.export_views("nobody", 7, dir.path()).await {
        ExportOutcome::Failed { error, .. } => assert_eq!(error, "Account not configured"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_posts_batch() {
    let mut config = MockConfig {
        name: "wordpress".to_string(),
        site: Some("blog.test".to_string()),
        ..Default::default()
    };
    config.failing_post_deletes.insert(2);
    let platform = MockPlatform::new(config).with_posts(vec![
        post(1, "2024-01-01"),
        post(2, "2024-01-02"),
        post(3, "2024-01-03"),
    ]);
    let state = platform.state();
    let registry = AccountRegistry::default().with_client(PlatformKind::Wordpress, "blog", Box::new(platform));
    let stats = StatsService::new(Arc::new(registry));

    let report = stats.delete_posts("blog", &[1, 2, 3]).await.unwrap();
    assert_eq!(report.deleted, vec![1, 3]);
    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert!(report.errors.contains_key("2"));
    assert_eq!(state.lock().unwrap().deleted_posts, vec![1, 3]);
}

#[tokio::test]
async fn test_delete_posts_counts_repeated_failures() {
    let mut config = MockConfig {
        name: "wordpress".to_string(),
        site: Some("blog.test".to_string()),
        ..Default::default()
    };
    config.failing_post_deletes.insert(2);
    let platform = MockPlatform::new(config).with_posts(vec![post(1, "2024-01-01"), post(2, "2024-01-02")]);
    let registry = AccountRegistry::default().with_client(PlatformKind::Wordpress, "blog", Box::new(platform));
    let stats = StatsService::new(Arc::new(registry));

    let report = stats.delete_posts("blog", &[2, 1, 2]).await.unwrap();
    assert_eq!(report.success, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors.len(), 1);
}
