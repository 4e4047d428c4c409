//! Sign-in endpoints
//!
//! Magic-link flow: a one-time emailed credential is requested, then
//! verified by the confirm route, which establishes a cookie session. Token
//! delivery itself is an external concern; the confirm URL is handed to the
//! log at info level.

use axum::extract::Query;
use axum::http::header::LOCATION;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Extension;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::cookie::SameSite;
use chrono::Duration;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::storage::CreateLoginTokenValues;
use crate::storage::Storage;
use crate::storage::UpsertUserValues;
use crate::users::TokenKind;

use super::session::generate_session_token;
use super::session::SESSION_COOKIE;
use super::Error;
use super::Form;
use super::JwtKeys;
use super::Success;

/// Where a verified sign-in lands
const ACCOUNT_PATH: &str = "/account";

/// Where a failed sign-in lands
const ERROR_PATH: &str = "/error";

/// How long a one-time credential stays usable
const TOKEN_LIFETIME_MINUTES: i64 = 15;

/// Length of the opaque token value
const TOKEN_LENGTH: usize = 32;

/// Magic link request form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkForm {
    /// Address the sign-in link goes to
    email: String,

    /// Optional display name, stored on first sign-in
    name: Option<String>,
}

/// Magic link response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkResponse {
    /// Address the sign-in link went to
    email: String,

    /// In how many seconds the link expires
    expires_in: i64,
}

/// Request a one-time sign-in link
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "someone@example.com" }' \
///     http://localhost:7100/auth/magic-link
/// ```
///
/// Response:
/// ```json
/// { "data": { "email": "someone@example.com", "expiresIn": 900 } }
/// ```
pub async fn magic_link<S: Storage>(
    Extension(config): Extension<Config>,
    Extension(storage): Extension<S>,
    Form(form): Form<MagicLinkForm>,
) -> Result<Success<MagicLinkResponse>, Error> {
    let email = form.email.trim().to_lowercase();

    if !is_plausible_email(&email) {
        return Err(Error::bad_request("Invalid email address"));
    }

    let user = storage
        .upsert_user(&UpsertUserValues {
            email: &email,
            name: form.name.as_deref(),
        })
        .await
        .map_err(Error::internal_server_error)?;

    let token = generate_token();
    let expires_at = (Utc::now() + Duration::minutes(TOKEN_LIFETIME_MINUTES)).naive_utc();

    storage
        .create_login_token(&CreateLoginTokenValues {
            token: &token,
            user: &user,
            kind: TokenKind::Email,
            expires_at,
        })
        .await
        .map_err(Error::internal_server_error)?;

    let confirm_url = format!(
        "{}/auth/confirm?token_hash={token}&type=email",
        config.site_url
    );

    // delivery is an external collaborator; the log plays the mailbox
    tracing::info!("Magic link for {email}: {confirm_url}");

    Ok(Success::ok(MagicLinkResponse {
        email,
        expires_in: TOKEN_LIFETIME_MINUTES * 60,
    }))
}

/// Confirm route query parameters
///
/// Everything optional; anything missing or unknown lands on the error page
/// instead of a JSON rejection
#[derive(Debug, Deserialize)]
pub struct ConfirmParams {
    /// The opaque one-time token from the emailed URL
    token_hash: Option<String>,

    /// Kind tag of the token
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Verify a one-time sign-in token
///
/// On success a session cookie is set and the user lands on the account
/// page; every failure path lands on the error page.
pub async fn confirm<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(jwt_keys): Extension<JwtKeys>,
    jar: CookieJar,
    Query(params): Query<ConfirmParams>,
) -> Response {
    let (Some(token), Some(kind)) = (params.token_hash, params.kind) else {
        tracing::debug!("Sign-in confirmation without token or type");

        return found_redirect(ERROR_PATH);
    };

    let kind = match kind.as_str() {
        "email" => TokenKind::Email,
        other => {
            tracing::debug!(r#"Unknown sign-in token type "{other}""#);

            return found_redirect(ERROR_PATH);
        }
    };

    match storage.consume_login_token(&token, kind).await {
        Ok(Some(user)) => match generate_session_token(&jwt_keys, &user) {
            Ok(session) => {
                tracing::debug!("Verified sign-in for {}", user.email);

                let cookie = Cookie::build((SESSION_COOKIE, session))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build();

                (jar.add(cookie), found_redirect(ACCOUNT_PATH)).into_response()
            }
            Err(_) => {
                tracing::error!("Could not sign a session token");

                found_redirect(ERROR_PATH)
            }
        },
        Ok(None) => {
            tracing::debug!("Sign-in token unknown, expired or already used");

            found_redirect(ERROR_PATH)
        }
        Err(err) => {
            tracing::error!("Could not verify sign-in token: {err}");

            found_redirect(ERROR_PATH)
        }
    }
}

/// Generate an opaque one-time token value
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Just enough validation to catch obvious typos; the mailbox is the real
/// verifier
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// A `302 Found` to the given page
fn found_redirect(path: &'static str) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, HeaderValue::from_static(path))],
    )
        .into_response()
}
