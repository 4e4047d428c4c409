//! The resolver
//!
//! The most important part of linkboard, the actual redirect logic.
//!
//! All wildcard requests end up here. A slug is looked up with an exact
//! match first, then by the trailing path segment of stored short URLs
//! (compound `host/slug` forms). Misses and lookup errors both degrade to a
//! redirect to the fallback page; a visitor never sees a 5xx once the
//! service is configured.

use axum::http::header::LOCATION;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Extension;
use percent_encoding::percent_decode_str;
use unicode_normalization::UnicodeNormalization;

use crate::accountant;
use crate::api::Error;
use crate::config::Config;
use crate::links::Link;
use crate::realtime::Hub;
use crate::storage;
use crate::storage::Storage;

/// Path of the fallback landing page
pub const FALLBACK_PATH: &str = "/302";

/// Resolve a slug and redirect
///
/// The click accounting side effects are fired and forgotten; the redirect
/// goes out regardless of what happens to them.
///
/// The `is_active` flag is deliberately not consulted: inactive links keep
/// resolving, the flag is a dashboard display concern.
pub async fn resolve<S: Storage>(
    Extension(config): Extension<Config>,
    Extension(storage): Extension<S>,
    Extension(hub): Extension<Hub>,
    uri: Uri,
) -> Response {
    if let Err(err) = config.ensure_service_access() {
        return Error::internal_server_error(err).into_response();
    }

    let slug = uri.path().trim_matches('/');

    let Ok(slug) = percent_decode_str(slug).decode_utf8() else {
        tracing::debug!("Requested path is not valid UTF-8, falling back");

        return fallback_redirect();
    };

    let slug = slug.nfc().collect::<String>();

    if slug.is_empty() {
        return fallback_redirect();
    }

    tracing::debug!("Looking for slug: /{slug}");

    match lookup(&storage, &slug).await {
        Ok(Some(link)) if !link.full_url.is_empty() => {
            let Ok(location) = HeaderValue::from_str(&link.full_url) else {
                tracing::error!(r#"Slug "{slug}" has an unusable destination, falling back"#);

                return fallback_redirect();
            };

            tracing::debug!(r#"Slug "{slug}" redirecting to: {}"#, link.full_url);

            // detached on purpose, may finish after the response is out
            accountant::record_click(storage, hub, link);

            redirect(location)
        }
        Ok(_) => {
            tracing::debug!(r#"Slug "{slug}" not found"#);

            fallback_redirect()
        }
        Err(err) => {
            tracing::error!(r#"Error looking up slug "{slug}": {err}"#);

            fallback_redirect()
        }
    }
}

/// The fallback landing page for everything that does not resolve
pub async fn not_found_page() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(
            "<!doctype html>\
             <html><head><title>Link not found</title></head>\
             <body><h1>Link not found</h1>\
             <p>This short link does not exist or is no longer available.</p>\
             </body></html>",
        ),
    )
}

/// Exact slug match first, then one suffix attempt against compound
/// `host/slug` short URLs
async fn lookup<S: Storage>(storage: &S, slug: &str) -> storage::Result<Option<Link>> {
    if let Some(link) = storage.find_single_link_by_slug(slug).await? {
        return Ok(Some(link));
    }

    storage.find_single_link_by_short_url_suffix(slug).await
}

/// A `302 Found` to the fallback page
fn fallback_redirect() -> Response {
    redirect(HeaderValue::from_static(FALLBACK_PATH))
}

/// A `302 Found` to the given location
fn redirect(location: HeaderValue) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location);

    (StatusCode::FOUND, headers).into_response()
}
