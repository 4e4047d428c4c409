use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::storage::Storage;
use crate::tests::helper;

#[tokio::test]
async fn test_create_requires_authentication() {
    let mut test = helper::setup_test_app();

    let (status_code, data, error) = helper::create_link(
        &mut test.app,
        None,
        &json!({ "slug": "nope", "fullUrl": "https://example.com/" }),
    )
    .await;

    assert_eq!(StatusCode::UNAUTHORIZED, status_code);
    assert!(data.is_none());
    assert!(error.is_some());
}

#[tokio::test]
async fn test_create_forces_owner() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "owner@example.com").await;

    let forged_owner = Uuid::new_v4();

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({
            "slug": "forged",
            "fullUrl": "https://example.com/",
            "userId": forged_owner,
        }),
    )
    .await;

    assert_eq!(StatusCode::OK, status_code);
    let data = data.unwrap();

    let caller = test
        .storage
        .find_single_user_by_email("owner@example.com")
        .await
        .unwrap()
        .unwrap();

    // the stored owner is the authenticated caller, never the forged value
    let stored = test
        .storage
        .find_single_link_by_slug("forged")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(caller.id, stored.user_id);
    assert_ne!(forged_owner, stored.user_id);
    assert_eq!(caller.id.to_string(), data["userId"].as_str().unwrap());
}

#[tokio::test]
async fn test_create_accepts_both_field_spellings() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "spelling@example.com").await;

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({ "slug": "camel", "fullUrl": "https://example.com/camel", "isActive": false }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let data = data.unwrap();
    assert_eq!("https://example.com/camel", data["fullUrl"].as_str().unwrap());
    assert_eq!(Some(false), data["isActive"].as_bool());

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({ "slug": "snake", "full_url": "https://example.com/snake", "is_active": false }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let data = data.unwrap();

    // one canonical output shape, no matter the input spelling
    assert_eq!("https://example.com/snake", data["fullUrl"].as_str().unwrap());
    assert_eq!(Some(false), data["isActive"].as_bool());
    assert!(data.get("full_url").is_none());
}

#[tokio::test]
async fn test_create_generates_slug_and_short_url() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "generated@example.com").await;

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({ "fullUrl": "https://example.com/" }),
    )
    .await;

    assert_eq!(StatusCode::OK, status_code);
    let data = data.unwrap();

    let slug = data["slug"].as_str().unwrap();
    assert_eq!(7, slug.len());
    assert!(slug.chars().all(char::is_alphanumeric));

    assert_eq!(
        format!("localhost:7100/{slug}"),
        data["shortUrl"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_create_tags_accept_string_or_array() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "tags@example.com").await;

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({ "slug": "one-tag", "fullUrl": "https://example.com/", "tags": "launch" }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(json!(["launch"]), data.unwrap()["tags"]);

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({ "slug": "two-tags", "fullUrl": "https://example.com/", "tags": ["a", "b"] }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(json!(["a", "b"]), data.unwrap()["tags"]);
}

#[tokio::test]
async fn test_create_rejections() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "reject@example.com").await;

    // invalid destination
    let (status_code, _, error) =
        helper::maybe_create_link(&mut test.app, &session, "valid", "not a url").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert!(error.is_some());

    // invalid slug characters
    let (status_code, _, error) =
        helper::maybe_create_link(&mut test.app, &session, "hello?world", "https://example.com/")
            .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some(r#"Slug can not contain "?""#.to_string()), error);

    // reserved prefix
    let (status_code, _, _) =
        helper::maybe_create_link(&mut test.app, &session, "api/sneaky", "https://example.com/")
            .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    // duplicates
    let (status_code, _, _) =
        helper::maybe_create_link(&mut test.app, &session, "taken", "https://example.com/").await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, _, error) =
        helper::maybe_create_link(&mut test.app, &session, "taken", "https://example.com/").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Slug already exists".to_string()), error);
}

#[tokio::test]
async fn test_single_update_delete_roundtrip() {
    let mut test = helper::setup_test_app();

    let session = helper::sign_in(&mut test.app, &test.storage, "crud@example.com").await;

    let (status_code, data, _) = helper::create_link(
        &mut test.app,
        Some(&session),
        &json!({
            "slug": "crud",
            "fullUrl": "https://example.com/before",
            "description": "before",
        }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let id = helper::id_of(&data.unwrap());

    // read it back
    let (status_code, data) = helper::single_link(&mut test.app, &session, &id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("before", data.unwrap()["description"].as_str().unwrap());

    // partial update: change the destination, clear the description
    let (status_code, data, _) = helper::update_link(
        &mut test.app,
        &session,
        &id,
        &json!({ "fullUrl": "https://example.com/after", "description": null }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let data = data.unwrap();
    assert_eq!("https://example.com/after", data["fullUrl"].as_str().unwrap());
    assert!(data["description"].is_null());

    // untouched fields survive
    assert_eq!("crud", data["slug"].as_str().unwrap());

    // toggle the active flag
    let (status_code, data, _) =
        helper::update_link(&mut test.app, &session, &id, &json!({ "isActive": false })).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some(false), data.unwrap()["isActive"].as_bool());

    // delete
    let status_code = helper::delete_link(&mut test.app, &session, &id).await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    // gone over HTTP
    let (status_code, data) = helper::single_link(&mut test.app, &session, &id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert!(data.is_none());

    // and gone in the store: no row, no error
    let stored = test.storage.find_single_link_by_id(&id).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_links_are_scoped_to_their_owner() {
    let mut test = helper::setup_test_app();

    let owner = helper::sign_in(&mut test.app, &test.storage, "first@example.com").await;
    let other = helper::sign_in(&mut test.app, &test.storage, "second@example.com").await;

    let (status_code, data, _) =
        helper::maybe_create_link(&mut test.app, &owner, "mine", "https://example.com/").await;
    assert_eq!(StatusCode::OK, status_code);
    let id = helper::id_of(&data.unwrap());

    // somebody else's link looks exactly like a missing one
    let (status_code, _) = helper::single_link(&mut test.app, &other, &id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _, _) = helper::update_link(
        &mut test.app,
        &other,
        &id,
        &json!({ "fullUrl": "https://evil.example.com/" }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let status_code = helper::delete_link(&mut test.app, &other, &id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    // the list only shows the caller's own links
    let (_, data) = helper::list_links(&mut test.app, &other).await;
    assert_eq!(0, data.unwrap().as_array().unwrap().len());

    let (_, data) = helper::list_links(&mut test.app, &owner).await;
    assert_eq!(1, data.unwrap().as_array().unwrap().len());
}

#[tokio::test]
async fn test_missing_service_key_fails_create_without_storage_calls() {
    let mut config = helper::test_config();
    config.service_key = None;

    let mut test = helper::setup_test_app_with_config(config);

    let (status_code, data, error) = helper::create_link(
        &mut test.app,
        None,
        &json!({ "slug": "nope", "fullUrl": "https://example.com/" }),
    )
    .await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status_code);
    assert!(data.is_none());
    assert_eq!(
        Some("Missing `SERVICE_KEY` in environment.".to_string()),
        error
    );

    // the route bailed before any storage interaction
    let links = test.storage.find_all_links(None).await.unwrap();
    assert!(links.is_empty());
}
