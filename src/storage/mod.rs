//! Link store gateway
//!
//! All access to the backing store of links, users, sign-in credentials and
//! analytics events goes through the [`Storage`](Storage) trait. Operations
//! return a `Result`; nothing panics or throws across this boundary.

use axum::async_trait;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::analytics::AnalyticsEvent;
use crate::links::Link;
use crate::users::LoginToken;
use crate::users::TokenKind;
use crate::users::User;

pub use memory::Memory;
#[cfg(feature = "postgres")]
use postgres::Postgres;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> Memory {
    Memory::new()
}

/// Setup the storage
#[cfg(feature = "postgres")]
pub async fn setup() -> Postgres {
    Postgres::new().await
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// A uniqueness guarantee of the store rejected a write
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create or refresh a user row
///
/// Upsert semantics: matched by email; an existing row keeps its ID and
/// session ID
pub struct UpsertUserValues<'a> {
    /// Sign-in address, the upsert key
    pub email: &'a str,

    /// Optional display name; `None` leaves an existing name untouched
    pub name: Option<&'a str>,
}

/// Values to store a one-time sign-in credential
pub struct CreateLoginTokenValues<'a> {
    /// The opaque token value
    pub token: &'a str,

    /// The user the credential signs in
    pub user: &'a User,

    /// Kind of credential
    pub kind: TokenKind,

    /// Hard expiry
    pub expires_at: chrono::NaiveDateTime,
}

/// Values to create a Link
pub struct CreateLinkValues<'a> {
    /// The owning user
    ///
    /// Always the authenticated caller; caller-supplied owner fields are
    /// ignored before this point
    pub user: &'a User,

    /// Normalized slug
    pub slug: &'a str,

    /// Display form of the short URL
    pub short_url: &'a str,

    /// Destination URL
    pub full_url: &'a Url,

    /// Optional display description
    pub description: Option<&'a str>,

    /// Optional favicon URL
    pub favicon: Option<&'a str>,

    /// Display tags
    pub tags: &'a [String],

    /// Dashboard-facing active flag
    pub is_active: bool,
}

/// Values to update a Link
///
/// Only `Some` fields are touched
#[derive(Default)]
pub struct UpdateLinkValues {
    /// New destination URL
    pub full_url: Option<Url>,

    /// New description; `Some(None)` clears it
    pub description: Option<Option<String>>,

    /// New favicon; `Some(None)` clears it
    pub favicon: Option<Option<String>>,

    /// New tags
    pub tags: Option<Vec<String>>,

    /// New active flag
    pub is_active: Option<bool>,
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Find a single user by its email address
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Create a user row, or refresh an existing one matched by email
    async fn upsert_user(&self, values: &UpsertUserValues<'_>) -> Result<User>;

    /// Store a one-time sign-in credential
    async fn create_login_token(&self, values: &CreateLoginTokenValues<'_>) -> Result<LoginToken>;

    /// Consume a one-time sign-in credential
    ///
    /// The credential is removed on a hit; expired or wrong-kind tokens are
    /// removed as well but yield `None`
    async fn consume_login_token(&self, token: &str, kind: TokenKind) -> Result<Option<User>>;

    /// Find all links, optionally scoped to one owner
    async fn find_all_links(&self, user_id: Option<&Uuid>) -> Result<Vec<Link>>;

    /// Find a single link by its ID
    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>>;

    /// Find a single link by an exact slug match
    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>>;

    /// Find a single link whose short URL ends in the given path segment
    ///
    /// The suffix lookup of the resolver; at most one row is returned
    async fn find_single_link_by_short_url_suffix(&self, slug: &str) -> Result<Option<Link>>;

    /// Create a link
    async fn create_link(&self, values: &CreateLinkValues<'_>) -> Result<Link>;

    /// Update a single link
    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link>;

    /// Delete a link
    ///
    /// Hard delete; a subsequent lookup by ID yields `Ok(None)`
    async fn delete_link(&self, link: &Link) -> Result<()>;

    /// Write an absolute click counter value
    ///
    /// Read-then-write companion of the click accountant; yields `None` when
    /// the link disappeared in the meantime
    async fn update_clicks(&self, id: &Uuid, clicks: i64) -> Result<Option<Link>>;

    /// Append one analytics event for a link
    async fn create_analytics_event(&self, link_id: &Uuid) -> Result<AnalyticsEvent>;

    /// Count the analytics events recorded for a link
    async fn count_analytics_events(&self, link_id: &Uuid) -> Result<i64>;
}
