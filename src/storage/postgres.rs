//! Postgres storage

use std::time::Duration;

use axum::async_trait;
use chrono::NaiveDateTime;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analytics::AnalyticsEvent;
use crate::links::Link;
use crate::users::LoginToken;
use crate::users::TokenKind;
use crate::users::User;

use super::CreateLinkValues;
use super::CreateLoginTokenValues;
use super::Error;
use super::Result;
use super::Storage;
use super::UpdateLinkValues;
use super::UpsertUserValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Columns of a full link row, kept in one place for the RETURNING clauses
const LINK_COLUMNS: &str = "id, user_id, slug, short_url, full_url, description, favicon, tags, is_active, clicks, created_at, updated_at";

/// Columns of a full user row
const USER_COLUMNS: &str = "id, session_id, email, name, created_at, updated_at";

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Use the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    pub async fn new() -> Self {
        let database_connection_string = std::env::var("DATABASE_URL").expect("Valid DATABASE_URL");

        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_connection_string)
            .await
            .expect("Valid connection");

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> Self {
        let migration_result = MIGRATOR.run(&connection_pool).await;

        if let Err(err) = migration_result {
            panic!("Migrations could not run: {err}");
        }

        Self { connection_pool }
    }
}

/// Postgres version of a user row
#[derive(sqlx::FromRow)]
struct PostgresUser {
    id: Uuid,
    session_id: Uuid,
    email: String,
    name: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl User {
    /// Create user from postgres version
    fn from_postgres_user(user: PostgresUser) -> Self {
        Self {
            id: user.id,
            session_id: user.session_id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    /// Maybe create user from postgres version
    fn from_postgres_user_optional(user: Option<PostgresUser>) -> Option<Self> {
        user.map(Self::from_postgres_user)
    }
}

/// Postgres version of a link row
#[derive(sqlx::FromRow)]
struct PostgresLink {
    id: Uuid,
    user_id: Uuid,
    slug: String,
    short_url: String,
    full_url: String,
    description: Option<String>,
    favicon: Option<String>,
    tags: Vec<String>,
    is_active: bool,
    clicks: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl Link {
    /// Create link from postgres version
    fn from_postgres_link(link: PostgresLink) -> Self {
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

    /// Maybe create link from postgres version
    fn from_postgres_link_optional(link: Option<PostgresLink>) -> Option<Self> {
        link.map(Self::from_postgres_link)
    }

    /// Create multiple links from postgres versions
    fn from_postgres_link_multiple(mut links: Vec<PostgresLink>) -> Vec<Self> {
        links
            .drain(..)
            .map(Self::from_postgres_link)
            .collect::<Vec<Self>>()
    }
}

/// Postgres version of an analytics event row
#[derive(sqlx::FromRow)]
struct PostgresEvent {
    id: Uuid,
    link_id: Uuid,
    clicked_at: NaiveDateTime,
}

impl AnalyticsEvent {
    /// Create analytics event from postgres version
    fn from_postgres_event(event: PostgresEvent) -> Self {
        Self {
            id: event.id,
            link_id: event.link_id,
            clicked_at: event.clicked_at,
        }
    }
}

/// Postgres version of a consumed login token row
#[derive(sqlx::FromRow)]
struct PostgresLoginToken {
    user_id: Uuid,
    kind: String,
    expires_at: NaiveDateTime,
}

impl TokenKind {
    /// Text representation stored in the `kind` column
    fn as_column_text(self) -> &'static str {
        match self {
            TokenKind::Email => "email",
        }
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn upsert_user(&self, values: &UpsertUserValues<'_>) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "
            INSERT INTO users (id, session_id, email, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET name = COALESCE(EXCLUDED.name, users.name),
                updated_at = now()
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .bind(values.email)
        .bind(values.name)
        .fetch_one(&self.connection_pool)
        .await
        .map(User::from_postgres_user)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn create_login_token(&self, values: &CreateLoginTokenValues<'_>) -> Result<LoginToken> {
        sqlx::query(
            "
            INSERT INTO login_tokens (token, user_id, kind, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(values.token)
        .bind(values.user.id)
        .bind(values.kind.as_column_text())
        .bind(values.expires_at)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(LoginToken {
            token: values.token.to_string(),
            user_id: values.user.id,
            kind: values.kind,
            expires_at: values.expires_at,
        })
    }

    async fn consume_login_token(&self, token: &str, kind: TokenKind) -> Result<Option<User>> {
        // single-use: the row is removed no matter the outcome
        let consumed = sqlx::query_as::<_, PostgresLoginToken>(
            "
            DELETE FROM login_tokens
            WHERE token = $1
            RETURNING user_id, kind, expires_at
            ",
        )
        .bind(token)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        let Some(consumed) = consumed else {
            return Ok(None);
        };

        if consumed.kind != kind.as_column_text()
            || consumed.expires_at < chrono::Utc::now().naive_utc()
        {
            return Ok(None);
        }

        self.find_single_user_by_id(&consumed.user_id).await
    }

    async fn find_all_links(&self, user_id: Option<&Uuid>) -> Result<Vec<Link>> {
        let links = if let Some(user_id) = user_id {
            sqlx::query_as::<_, PostgresLink>(&format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE user_id = $1 ORDER BY created_at DESC"
            ))
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
        } else {
            sqlx::query_as::<_, PostgresLink>(&format!(
                "SELECT {LINK_COLUMNS} FROM links ORDER BY created_at DESC"
            ))
            .fetch_all(&self.connection_pool)
            .await
        };

        Ok(links
            .map(Link::from_postgres_link_multiple)
            .map_err(connection_error)?)
    }

    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map(Link::from_postgres_link_optional)
        .map_err(connection_error)?;

        Ok(link)
    }

    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE slug = $1 LIMIT 1"
        ))
        .bind(slug)
        .fetch_optional(&self.connection_pool)
        .await
        .map(Link::from_postgres_link_optional)
        .map_err(connection_error)?;

        Ok(link)
    }

    async fn find_single_link_by_short_url_suffix(&self, slug: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "
            SELECT {LINK_COLUMNS} FROM links
            WHERE short_url = $1 OR short_url LIKE '%/' || $1
            LIMIT 1
            "
        ))
        .bind(slug)
        .fetch_optional(&self.connection_pool)
        .await
        .map(Link::from_postgres_link_optional)
        .map_err(connection_error)?;

        Ok(link)
    }

    async fn create_link(&self, values: &CreateLinkValues<'_>) -> Result<Link> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "
            INSERT INTO links (user_id, slug, short_url, full_url, description, favicon, tags, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LINK_COLUMNS}
            "
        ))
        .bind(values.user.id)
        .bind(values.slug)
        .bind(values.short_url)
        .bind(values.full_url.to_string())
        .bind(values.description)
        .bind(values.favicon)
        .bind(values.tags.to_vec())
        .bind(values.is_active)
        .fetch_one(&self.connection_pool)
        .await
        .map(Link::from_postgres_link)
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::Conflict(format!(r#"Slug "{}" already exists"#, values.slug))
            } else {
                connection_error(err)
            }
        })?;

        Ok(link)
    }

    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "
            UPDATE links
            SET full_url = COALESCE($2, full_url),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                favicon = CASE WHEN $5 THEN $6 ELSE favicon END,
                tags = COALESCE($7, tags),
                is_active = COALESCE($8, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING {LINK_COLUMNS}
            "
        ))
        .bind(link.id)
        .bind(values.full_url.as_ref().map(ToString::to_string))
        .bind(values.description.is_some())
        .bind(values.description.clone().flatten())
        .bind(values.favicon.is_some())
        .bind(values.favicon.clone().flatten())
        .bind(values.tags.clone())
        .bind(values.is_active)
        .fetch_one(&self.connection_pool)
        .await
        .map(Link::from_postgres_link)
        .map_err(connection_error)?;

        Ok(link)
    }

    async fn delete_link(&self, link: &Link) -> Result<()> {
        sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(link.id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(())
    }

    async fn update_clicks(&self, id: &Uuid, clicks: i64) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, PostgresLink>(&format!(
            "
            UPDATE links
            SET clicks = $2, updated_at = now()
            WHERE id = $1
            RETURNING {LINK_COLUMNS}
            "
        ))
        .bind(id)
        .bind(clicks)
        .fetch_optional(&self.connection_pool)
        .await
        .map(Link::from_postgres_link_optional)
        .map_err(connection_error)?;

        Ok(link)
    }

    async fn create_analytics_event(&self, link_id: &Uuid) -> Result<AnalyticsEvent> {
        let event = sqlx::query_as::<_, PostgresEvent>(
            "
            INSERT INTO analytics (link_id)
            VALUES ($1)
            RETURNING id, link_id, clicked_at
            ",
        )
        .bind(link_id)
        .fetch_one(&self.connection_pool)
        .await
        .map(AnalyticsEvent::from_postgres_event)
        .map_err(connection_error)?;

        Ok(event)
    }

    async fn count_analytics_events(&self, link_id: &Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM analytics WHERE link_id = $1",
        )
        .bind(link_id)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(count)
    }
}

/// Map any sqlx error to a connection error
fn connection_error(err: sqlx::Error) -> Error {
    Error::Connection(err.to_string())
}

/// Did a uniqueness constraint reject the write?
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}
