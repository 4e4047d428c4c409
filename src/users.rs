//! Dashboard users and their one-time sign-in credentials

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,

    /// Rotating handle baked into session tokens, used to invalidate them
    pub session_id: Uuid,

    /// Sign-in address, unique across users
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Kinds of one-time sign-in credentials
///
/// Matches the `type` query parameter of the confirm route
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// Emailed magic link
    Email,
}

/// A single-use emailed sign-in credential
///
/// Consumed (removed from storage) on first successful verification
#[derive(Clone, Debug)]
pub struct LoginToken {
    /// The opaque token value carried by the emailed URL
    pub token: String,

    /// The user this credential signs in
    pub user_id: Uuid,

    /// Kind of credential
    pub kind: TokenKind,

    /// Hard expiry; the token is useless afterwards
    pub expires_at: NaiveDateTime,
}

impl LoginToken {
    /// Has the hard expiry passed?
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at < now
    }
}
