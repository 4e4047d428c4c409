//! Session service
//!
//! Sessions are established by the magic-link confirm flow and carried as a
//! signed token, either in the `Authorization` header or in the session
//! cookie. The `jti` claim is checked against the user's session ID, which
//! is the invalidation mechanism.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Extension;
use axum::RequestPartsExt;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::api::Error;
use crate::storage::Storage;
use crate::users::User;

/// Name of the session cookie set by the confirm flow
pub const SESSION_COOKIE: &str = "linkboard_session";

/// How long a session token stays valid, in seconds (one week)
const SESSION_LIFETIME: i64 = 60 * 60 * 24 * 7;

/// The keys used for encoding/decoding session tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The encoding key
    encoding: EncodingKey,

    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create new encoding/decoding keys, derived from a secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// The claims that identify a user session
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// The user ID
    sub: Uuid,

    /// Unix timestamp the token expires at
    exp: i64,

    /// The user's session ID, used to invalidate tokens early
    jti: Uuid,
}

/// Sign a session token for a user
pub fn generate_session_token(jwt_keys: &JwtKeys, user: &User) -> Result<String, Error> {
    use jsonwebtoken::encode;
    use jsonwebtoken::Header;

    let claims = Claims {
        sub: user.id,
        exp: chrono::Utc::now().timestamp() + SESSION_LIFETIME,
        jti: user.session_id,
    };

    encode(&Header::default(), &claims, &jwt_keys.encoding).map_err(Error::internal_server_error)
}

/// Current user service
///
/// Extracting it gates a route on a valid session
pub struct CurrentUser<S: Storage> {
    /// The actual user
    user: Arc<User>,

    /// Marker for the storage the user was loaded from
    _storage: PhantomData<S>,
}

impl<S: Storage> CurrentUser<S> {
    /// Create the current user from a user
    fn new(user: User) -> Self {
        Self {
            user: Arc::new(user),
            _storage: PhantomData,
        }
    }
}

impl<S: Storage> Deref for CurrentUser<S> {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

#[async_trait]
impl<B, S> FromRequestParts<B> for CurrentUser<S>
where
    B: Send + Sync,
    S: Storage,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &B) -> Result<Self, Self::Rejection> {
        use jsonwebtoken::decode;
        use jsonwebtoken::Validation;

        // Bearer header first, session cookie second
        let token = if let Ok(TypedHeader(Authorization(bearer))) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
        {
            bearer.token().to_string()
        } else {
            let jar = CookieJar::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("Not authenticated"))?;

            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .ok_or_else(|| Error::unauthorized("Not authenticated"))?
        };

        let Extension(jwt_keys) = parts
            .extract::<Extension<JwtKeys>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get JWT keys"))?;

        let Extension(storage) = parts
            .extract::<Extension<S>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get a storage pool"))?;

        let validation = Validation::default();

        let token_data = decode::<Claims>(&token, &jwt_keys.decoding, &validation)
            .map_err(|err| Error::unauthorized(format!("Invalid session: {err}")))?;

        let claims = token_data.claims;

        let user = storage
            .find_single_user_by_id(&claims.sub)
            .await
            .map_err(|_| Error::unauthorized("Could not find user"))?;

        if let Some(user) = user {
            // mechanism to invalidate session tokens
            if claims.jti != user.session_id {
                return Err(Error::unauthorized("Session expired"));
            }

            Ok(CurrentUser::new(user))
        } else {
            Err(Error::unauthorized("Could not find user"))
        }
    }
}
