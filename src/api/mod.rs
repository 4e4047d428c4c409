//! All API endpoint setup

use axum::routing::get;
use axum::Extension;
use axum::Router;
use serde::Serialize;

use crate::config::Config;
use crate::storage::Storage;

pub use request::parse_slug;
pub use request::parse_url;
pub use request::Form;
pub use request::PathParameters;
pub use response::Error;
pub use response::Success;
pub use session::CurrentUser;
pub use session::JwtKeys;

mod analytics;
pub mod auth;
mod links;
mod request;
mod response;
mod session;
mod users;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let links = Router::new()
        .route("/", get(links::list::<S>).post(links::create::<S>))
        .route(
            "/:link",
            get(links::single::<S>)
                .patch(links::update::<S>)
                .delete(links::delete::<S>),
        )
        .route("/:link/events", get(links::events::<S>));

    Router::new()
        .nest("/links", links)
        .route("/analytics", get(analytics::summary::<S>))
        .route("/me", get(users::me::<S>))
        .route("/config", get(site_config))
}

/// Public runtime configuration for the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteConfigResponse {
    /// Public origin of the deployment
    site_url: String,

    /// Analytics measurement ID, when configured
    #[serde(skip_serializing_if = "Option::is_none")]
    analytics_measurement_id: Option<String>,
}

/// Get the public runtime configuration
///
/// The only unauthenticated API route; nothing secret in here
async fn site_config(Extension(config): Extension<Config>) -> Success<SiteConfigResponse> {
    Success::ok(SiteConfigResponse {
        site_url: config.site_url.clone(),
        analytics_measurement_id: config.analytics_measurement_id.clone(),
    })
}
