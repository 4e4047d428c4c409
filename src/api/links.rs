//! Links API endpoints
//!
//! Everything related to short link management, plus the realtime change
//! feed of a single link.

use std::convert::Infallible;

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::Request;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::Extension;
use chrono::NaiveDateTime;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::analytics::AnalyticsEvent;
use crate::config::Config;
use crate::links::Link;
use crate::realtime::ChangeEvent;
use crate::realtime::Hub;
use crate::storage;
use crate::storage::CreateLinkValues;
use crate::storage::Storage;
use crate::storage::UpdateLinkValues;
use crate::storage::UpsertUserValues;
use crate::users::User;

use super::parse_slug;
use super::parse_url;
use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;

/// Length of generated short codes
const SHORT_CODE_LENGTH: usize = 7;

/// Link response going to the dashboard
///
/// The one canonical wire shape; the snake/camel drift of older revisions
/// stops at this boundary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    /// Link ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Slug used by the resolver
    pub slug: String,

    /// Display form of the short URL
    pub short_url: String,

    /// Destination the resolver redirects to
    pub full_url: String,

    /// Optional display description
    pub description: Option<String>,

    /// Optional favicon URL
    pub favicon: Option<String>,

    /// Display tags
    pub tags: Vec<String>,

    /// Dashboard-facing active flag
    pub is_active: bool,

    /// Click counter
    pub clicks: i64,

    /// Creation date
    pub created_at: NaiveDateTime,

    /// Last updated at
    pub updated_at: NaiveDateTime,
}

impl LinkResponse {
    /// Create a response from a [`Link`](Link)
    fn from_link(link: Link) -> Self {
        Self {
            id: link.id,
            user_id: link.user_id,
            slug: link.slug,
            short_url: link.short_url,
            full_url: link.full_url,
            description: link.description,
            favicon: link.favicon,
            tags: link.tags,
            is_active: link.is_active,
            clicks: link.clicks,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }

    /// Create a response from multiple [`Link`](Link)s
    fn from_link_multiple(mut links: Vec<Link>) -> Vec<Self> {
        links.drain(..).map(Self::from_link).collect::<Vec<Self>>()
    }
}

/// Tags come in as either a single string or an array; the canonical shape
/// is an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagsField {
    One(String),
    Many(Vec<String>),
}

impl TagsField {
    fn into_vec(self) -> Vec<String> {
        match self {
            TagsField::One(tag) => vec![tag],
            TagsField::Many(tags) => tags,
        }
    }
}

/// List all links of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:7100/api/links
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "<uuid>", "slug": "abc1234", ... } ], "error": null }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<LinkResponse>>, Error> {
    let links = storage
        .find_all_links(Some(&current_user.id))
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(LinkResponse::from_link_multiple(links)))
}

/// Get a single link
///
/// Links of other users are indistinguishable from missing ones
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<LinkResponse>, Error> {
    fetch_link(&storage, &current_user, &link_id)
        .await
        .map(|link| Success::ok(LinkResponse::from_link(link)))
}

/// Create link form
///
/// Field names are accepted in both the camelCase and snake_case spelling;
/// a caller-supplied owner is ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkForm {
    /// Slug to create the link with; generated when missing
    #[serde(default)]
    slug: Option<String>,

    /// Display short URL; derived from the site origin when missing
    #[serde(default, alias = "short_url")]
    short_url: Option<String>,

    /// Destination URL
    #[serde(alias = "full_url")]
    full_url: String,

    /// Optional display description
    #[serde(default)]
    description: Option<String>,

    /// Optional favicon URL
    #[serde(default)]
    favicon: Option<String>,

    /// Display tags, a single string or an array
    #[serde(default)]
    tags: Option<TagsField>,

    /// Dashboard-facing active flag, defaults to active
    #[serde(default, alias = "is_active")]
    is_active: Option<bool>,

    /// Accepted and ignored; the owner is always the authenticated caller
    #[serde(default, alias = "user_id")]
    #[allow(dead_code)]
    user_id: Option<Uuid>,
}

/// Create a link based on the [`CreateLinkForm`](CreateLinkForm) form
///
/// The configuration check runs before anything else, then the session
/// check, then the body parse — a misconfigured route answers 500 without a
/// single storage interaction.
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "slug": "hello", "fullUrl": "https://www.example.com/" }' \
///     http://localhost:7100/api/links
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "<uuid>", "slug": "hello", ... }, "error": null }
/// ```
pub async fn create<S: Storage>(
    Extension(config): Extension<Config>,
    Extension(storage): Extension<S>,
    request: Request,
) -> Result<Success<LinkResponse>, Error> {
    config
        .ensure_service_access()
        .map_err(Error::internal_server_error)?;

    let (mut parts, body) = request.into_parts();

    let current_user = CurrentUser::<S>::from_request_parts(&mut parts, &()).await?;

    let Form(form) = Form::<CreateLinkForm>::from_request(Request::from_parts(parts, body), &())
        .await?;

    let full_url = parse_url(&form.full_url)?;

    let slug = match &form.slug {
        Some(slug) => parse_slug(slug)?,
        None => generate_short_code(),
    };

    let short_url = match form.short_url.as_deref().map(str::trim) {
        Some(short_url) if !short_url.is_empty() => short_url.trim_matches('/').to_string(),
        _ => format!("{}/{slug}", config.short_url_base()),
    };

    // make sure the owner row exists before the link insert; not fatal when
    // it does not work out, the insert itself will complain
    let upserted = storage
        .upsert_user(&UpsertUserValues {
            email: &current_user.email,
            name: current_user.name.as_deref(),
        })
        .await;

    if let Err(err) = upserted {
        tracing::warn!("Failed to upsert user row before link insert: {err}");
    }

    let existing = storage
        .find_single_link_by_slug(&slug)
        .await
        .map_err(Error::internal_server_error)?;

    if existing.is_some() {
        return Err(Error::bad_request("Slug already exists"));
    }

    let tags = form.tags.map(TagsField::into_vec).unwrap_or_default();

    let values = CreateLinkValues {
        user: &current_user,
        slug: &slug,
        short_url: &short_url,
        full_url: &full_url,
        description: form.description.as_deref(),
        favicon: form.favicon.as_deref(),
        tags: &tags,
        is_active: form.is_active.unwrap_or(true),
    };

    let link = storage.create_link(&values).await.map_err(|err| match err {
        storage::Error::Conflict(message) => Error::bad_request(message),
        err => Error::internal_server_error(err),
    })?;

    Ok(Success::ok(LinkResponse::from_link(link)))
}

/// Update link form
///
/// All fields are optional and are not touched when not provided; an
/// explicit `null` clears the clearable ones
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkForm {
    /// New destination URL
    #[serde(default, alias = "full_url")]
    full_url: Option<String>,

    /// New description
    #[serde(default)]
    description: Option<Option<String>>,

    /// New favicon URL
    #[serde(default)]
    favicon: Option<Option<String>>,

    /// New tags
    #[serde(default)]
    tags: Option<TagsField>,

    /// New active flag
    #[serde(default, alias = "is_active")]
    is_active: Option<bool>,
}

/// Update a link based on the [`UpdateLinkForm`](UpdateLinkForm) form
///
/// Only provided values are processed; subscribers of the link's change
/// feed see the updated row.
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(hub): Extension<Hub>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
    Form(form): Form<UpdateLinkForm>,
) -> Result<Success<LinkResponse>, Error> {
    let link = fetch_link(&storage, &current_user, &link_id).await?;

    let full_url = if let Some(ref full_url) = form.full_url {
        Some(parse_url(full_url)?)
    } else {
        None
    };

    let values = UpdateLinkValues {
        full_url,
        description: form.description,
        favicon: form.favicon,
        tags: form.tags.map(TagsField::into_vec),
        is_active: form.is_active,
    };

    let updated_link = storage
        .update_link(&link, &values)
        .await
        .map_err(Error::internal_server_error)?;

    hub.publish(&updated_link.id, ChangeEvent::LinkUpdated(updated_link.clone()));

    Ok(Success::ok(LinkResponse::from_link(updated_link)))
}

/// Delete a link
///
/// Hard delete; the links of other users are indistinguishable from missing
/// ones
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:7100/api/links/<uuid>
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &current_user, &link_id).await?;

    storage
        .delete_link(&link)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Analytics event response on the change feed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventResponse {
    /// Event ID
    pub id: Uuid,

    /// The clicked link
    pub link_id: Uuid,

    /// When the click happened
    pub clicked_at: NaiveDateTime,
}

impl AnalyticsEventResponse {
    /// Create a response from an [`AnalyticsEvent`](AnalyticsEvent)
    fn from_event(event: AnalyticsEvent) -> Self {
        Self {
            id: event.id,
            link_id: event.link_id,
            clicked_at: event.clicked_at,
        }
    }
}

/// One change on the SSE feed of a link
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeEventResponse {
    /// The link row changed
    LinkUpdated {
        /// The updated row
        link: LinkResponse,
    },

    /// One click was recorded
    ClickRecorded {
        /// The recorded event
        event: AnalyticsEventResponse,
    },
}

impl ChangeEventResponse {
    /// Create a response from a [`ChangeEvent`](ChangeEvent)
    fn from_change(change: ChangeEvent) -> Self {
        match change {
            ChangeEvent::LinkUpdated(link) => Self::LinkUpdated {
                link: LinkResponse::from_link(link),
            },
            ChangeEvent::ClickRecorded(event) => Self::ClickRecorded {
                event: AnalyticsEventResponse::from_event(event),
            },
        }
    }
}

/// Subscribe to the realtime change feed of a link
///
/// Server-sent events; one event per counter write, click record or
/// dashboard edit. Subscribers of the same link share one underlying
/// channel.
pub async fn events<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(hub): Extension<Hub>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let link = fetch_link(&storage, &current_user, &link_id).await?;

    let stream = hub.subscribe(link.id).into_stream().filter_map(|change| {
        let response = ChangeEventResponse::from_change(change);

        match Event::default().json_data(&response) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                tracing::warn!("Could not serialize a change event: {err}");

                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Fetch a link from storage, scoped to its owner
///
/// Somebody else's link yields the same "not found" as a missing one
async fn fetch_link<S: Storage>(
    storage: &S,
    current_user: &User,
    link_id: &Uuid,
) -> Result<Link, Error> {
    let link = storage
        .find_single_link_by_id(link_id)
        .await
        .map_err(Error::internal_server_error)?;

    match link {
        Some(link) if link.user_id == current_user.id => Ok(link),
        _ => Err(Error::not_found("Link not found")),
    }
}

/// Generate a random short code for links created without a slug
fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LENGTH)
        .map(char::from)
        .collect()
}
