//! API request helpers

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::Json;
use axum::extract::Path;
use axum::extract::Request;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use unicode_normalization::UnicodeNormalization;
use url::Url;

use super::Error;

/// Path prefixes that can never be a slug
///
/// They are claimed by the API, the sign-in flow, the fallback page and the
/// dashboard pages
const RESERVED_SLUGS: [&str; 5] = ["302", "account", "api", "auth", "error"];

/// Parse and normalize a slug
///
/// ```rust
/// let slug = "/some-slug";
/// assert_eq!(parse_slug(slug).unwrap(), "some-slug".to_string())
/// ```
pub fn parse_slug(slug: &str) -> Result<String, Error> {
    let slug = slug.trim_matches('/');

    for ch in slug.chars() {
        if ch == '?' {
            return Err(Error::bad_request(r#"Slug can not contain "?""#));
        }

        if ch == '#' {
            return Err(Error::bad_request(r##"Slug can not contain "#""##));
        }
    }

    let slug = slug.nfc().collect::<String>();

    if slug.is_empty() {
        return Err(Error::bad_request("Slug can not be empty"));
    }

    let first_segment = slug.split('/').next().unwrap_or_default();

    if RESERVED_SLUGS.contains(&first_segment) {
        return Err(Error::bad_request(format!(
            r#"Slug can not start with "{first_segment}""#
        )));
    }

    Ok(slug)
}

/// Parse and validate a URL
///
/// ```rust
/// let url = "https://www.example.com/";
/// assert!(parse_url(url).is_ok())
/// ```
pub fn parse_url<I>(url: I) -> Result<Url, Error>
where
    I: AsRef<str>,
{
    Url::parse(url.as_ref()).map_err(Error::bad_request)
}

fn parse_json<J>(json: Result<Json<J>, JsonRejection>) -> Result<J, Error> {
    match json {
        Ok(Json(json)) => Ok(json),
        Err(err) => match err {
            JsonRejection::JsonDataError(err) => {
                Err(Error::bad_request("Data error").with_description(err))
            }
            JsonRejection::JsonSyntaxError(err) => {
                Err(Error::bad_request("JSON syntax error").with_description(err))
            }
            JsonRejection::MissingJsonContentType(_err) => Err(Error::bad_request(
                "Missing `application/json` content type",
            )),
            JsonRejection::BytesRejection(err) => {
                Err(Error::bad_request("Invalid characters in JSON").with_description(err))
            }
            err => Err(Error::bad_request("Unknown JSON error").with_description(err)),
        },
    }
}

/// Wrapper for the JSON extractor
pub struct Form<F>(pub F);

#[async_trait]
impl<S, F> FromRequest<S> for Form<F>
where
    S: Send + Sync,
    F: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = Result::<Json<F>, JsonRejection>::from_request(req, state)
            .await
            .map_err(|_| Error::internal_server_error("Could not extract form"))?;

        parse_json(json).map(Form)
    }
}

fn parse_path<P>(path: Result<Path<P>, PathRejection>) -> Result<P, Error> {
    match path {
        Ok(Path(path)) => Ok(path),
        Err(err) => match err {
            PathRejection::FailedToDeserializePathParams(err) => {
                Err(Error::bad_request("Invalid path parameter").with_description(err))
            }
            PathRejection::MissingPathParams(err) => {
                Err(Error::bad_request("Missing path parameter").with_description(err))
            }
            err => Err(Error::bad_request("Unknown path error").with_description(err)),
        },
    }
}

/// Wrapper for the path parameter extractor
pub struct PathParameters<P>(pub P);

#[async_trait]
impl<S, P> FromRequestParts<S> for PathParameters<P>
where
    S: Send + Sync,
    P: DeserializeOwned + Send,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = Result::<Path<P>, PathRejection>::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::internal_server_error("Could not extract path"))?;

        parse_path(path).map(PathParameters)
    }
}
