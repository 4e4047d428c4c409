use std::sync::atomic::Ordering;

use axum::http::StatusCode;

use crate::storage::Memory;
use crate::tests::helper;
use crate::tests::helper::TestStorage;

#[tokio::test]
async fn test_unknown_slug_falls_back() {
    let mut test = helper::setup_test_app();

    let (status_code, location, _) = helper::root(&mut test.app, "does-not-exist").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("/302".to_string()), location);
}

#[tokio::test]
async fn test_empty_slug_falls_back() {
    let mut test = helper::setup_test_app();

    let (status_code, location, _) = helper::root(&mut test.app, "").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("/302".to_string()), location);
}

#[tokio::test]
async fn test_invalid_utf8_falls_back() {
    let mut test = helper::setup_test_app();

    let (status_code, location, _) = helper::root(&mut test.app, "%c0").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("/302".to_string()), location);
}

#[tokio::test]
async fn test_known_slug_redirects_to_destination() {
    let mut test = helper::setup_test_app();

    let url = "https://example.com/x";
    helper::seed_link(&test.storage, "campaign", "sho.rt/campaign", url).await;

    let (status_code, location, _) = helper::root(&mut test.app, "campaign").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some(url.to_string()), location);
}

#[tokio::test]
async fn test_percent_encoded_slug_resolves() {
    let mut test = helper::setup_test_app();

    let url = "https://www.example.com/";
    helper::seed_link(&test.storage, "hello world", "sho.rt/hello", url).await;

    let (status_code, location, _) = helper::root(&mut test.app, "hello%20world").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some(url.to_string()), location);
}

#[tokio::test]
async fn test_short_url_suffix_resolves() {
    let mut test = helper::setup_test_app();

    // the stored slug differs from the short URL's trailing segment; only
    // the suffix attempt can find this one
    let url = "https://www.example.com/very-long-path";
    helper::seed_link(&test.storage, "marketing-q1", "sho.rt/mq1", url).await;

    let (status_code, location, _) = helper::root(&mut test.app, "mq1").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some(url.to_string()), location);
}

#[tokio::test]
async fn test_exact_match_wins_over_suffix() {
    let mut test = helper::setup_test_app();

    let exact = "https://www.example.com/exact";
    let suffix = "https://www.example.com/suffix";
    helper::seed_link(&test.storage, "promo", "sho.rt/other", exact).await;
    helper::seed_link(&test.storage, "something-else", "sho.rt/promo", suffix).await;

    let (status_code, location, _) = helper::root(&mut test.app, "promo").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some(exact.to_string()), location);
}

#[tokio::test]
async fn test_inactive_link_still_resolves() {
    let mut test = helper::setup_test_app();

    // the active flag is a dashboard concern, the resolver ignores it
    let url = "https://www.example.com/";
    helper::seed_link_with(&test.storage, "paused", "sho.rt/paused", url, false).await;

    let (status_code, location, _) = helper::root(&mut test.app, "paused").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some(url.to_string()), location);
}

#[tokio::test]
async fn test_lookup_error_degrades_to_fallback() {
    let inner = Memory::new();
    let storage = TestStorage::new(inner.clone());
    let (mut app, _hub) = helper::setup_test_app_with_storage(storage.clone());

    // the row exists, but every lookup for it errors
    helper::seed_link(&inner, "flaky", "sho.rt/flaky", "https://example.com/").await;
    storage.fail_link_lookups.store(true, Ordering::SeqCst);

    let (status_code, location, _) = helper::root(&mut app, "flaky").await;

    // a store error is treated like a miss, the visitor never sees a 5xx
    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("/302".to_string()), location);
}

#[tokio::test]
async fn test_blank_destination_falls_back() {
    let inner = Memory::new();
    let storage = TestStorage::new(inner.clone());
    let (mut app, _hub) = helper::setup_test_app_with_storage(storage.clone());

    // legacy rows can carry an empty destination; those are misses
    helper::seed_link(&inner, "empty", "sho.rt/empty", "https://example.com/").await;
    storage.blank_destinations.store(true, Ordering::SeqCst);

    let (status_code, location, _) = helper::root(&mut app, "empty").await;

    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("/302".to_string()), location);
}

#[tokio::test]
async fn test_missing_service_key_answers_structured_500() {
    let mut config = helper::test_config();
    config.service_key = None;

    let mut test = helper::setup_test_app_with_config(config);

    let (status_code, location, body) = helper::root(&mut test.app, "anything").await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status_code);
    assert_eq!(None, location);
    assert!(body["data"].is_null());
    assert_eq!(
        Some("Missing `SERVICE_KEY` in environment."),
        body["error"].as_str()
    );
}

#[tokio::test]
async fn test_fallback_page() {
    let mut test = helper::setup_test_app();

    let (status_code, _) = helper::get_plain(&mut test.app, "/302").await;

    assert_eq!(StatusCode::NOT_FOUND, status_code);
}
