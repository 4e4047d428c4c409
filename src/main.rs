#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Result;
use axum::routing::get;
use axum::routing::post;
use axum::Extension;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::config::Config;
use crate::realtime::Hub;
use crate::storage::Storage;

mod accountant;
mod analytics;
mod api;
mod config;
mod graceful_shutdown;
mod links;
mod realtime;
mod resolver;
mod storage;
#[cfg(test)]
mod tests;
mod users;
mod utils;

const DEFAULT_RUST_LOG: &str = "linkboard=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;
    let address = config.address;

    let app = setup_app(config).await;

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("Listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}

/// Create and setup the app with its dependencies
async fn setup_app(config: Config) -> Router {
    let storage = storage::setup().await;
    let hub = Hub::new();
    let jwt_keys = setup_jwt_keys(&config);

    create_router(config, storage, hub, jwt_keys)
}

/// Create the router for linkboard
///
/// The API routes, the sign-in flow, the fallback landing page, and last of
/// all the resolver catching every other path
fn create_router<S: Storage>(config: Config, storage: S, hub: Hub, jwt_keys: JwtKeys) -> Router {
    Router::new()
        .nest("/api", api::router::<S>())
        .route("/auth/magic-link", post(api::auth::magic_link::<S>))
        .route("/auth/confirm", get(api::auth::confirm::<S>))
        .route(resolver::FALLBACK_PATH, get(resolver::not_found_page))
        .fallback(get(resolver::resolve::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(config))
        .layer(Extension(storage))
        .layer(Extension(hub))
        .layer(Extension(jwt_keys))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;
    use tracing_subscriber::EnvFilter;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

fn setup_jwt_keys(config: &Config) -> JwtKeys {
    let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
        let jwt_secret = utils::generate_secret();
        tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
        jwt_secret
    });

    JwtKeys::new(jwt_secret.as_bytes())
}
