use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_summary_counts_the_callers_links() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "sum@example.com").await;
    let other = helper::sign_in(&mut test.app, &test.storage, "unrelated@example.com").await;

    let (_, data, _) =
        helper::maybe_create_link(&mut test.app, &session, "one", "https://example.com/1").await;
    let one = helper::id_of(&data.unwrap());

    helper::maybe_create_link(&mut test.app, &session, "two", "https://example.com/2").await;
    helper::maybe_create_link(&mut test.app, &other, "theirs", "https://example.com/3").await;

    // two clicks on the first link; waiting in between keeps the counter
    // writes sequential, so the totals are deterministic here
    helper::root(&mut test.app, "one").await;
    helper::wait_for_events(&test.storage, &one, 1).await;
    helper::root(&mut test.app, "one").await;
    helper::wait_for_events(&test.storage, &one, 2).await;

    let (status_code, data) =
        helper::get_with_session(&mut test.app, &session, "/api/analytics").await;
    assert_eq!(StatusCode::OK, status_code);

    let data = data.unwrap();
    assert_eq!(Some(2), data["linkCount"].as_i64());
    assert_eq!(Some(2), data["totalClicks"].as_i64());

    let per_link = data["perLink"].as_array().unwrap();
    assert_eq!(2, per_link.len());
}

#[tokio::test]
async fn test_summary_requires_authentication() {
    let mut test = helper::setup_test_app();

    let (status_code, data) = helper::get_plain(&mut test.app, "/api/analytics").await;

    assert_eq!(StatusCode::UNAUTHORIZED, status_code);
    assert!(data.is_none());
}

#[tokio::test]
async fn test_me_returns_the_profile() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "profile@example.com").await;

    let (status_code, data) = helper::get_with_session(&mut test.app, &session, "/api/me").await;

    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(
        "profile@example.com",
        data.unwrap()["email"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_site_config_is_public() {
    let mut config = helper::test_config();
    config.analytics_measurement_id = Some("G-TEST123".to_string());

    let mut test = helper::setup_test_app_with_config(config);

    let (status_code, data) = helper::get_plain(&mut test.app, "/api/config").await;

    assert_eq!(StatusCode::OK, status_code);

    let data = data.unwrap();
    assert_eq!(
        json!({
            "siteUrl": "http://localhost:7100",
            "analyticsMeasurementId": "G-TEST123",
        }),
        data
    );
}
