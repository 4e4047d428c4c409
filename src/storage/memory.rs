//! Memory storage
//!
//! Will be destroyed on system shutdown; backs local development and the
//! test suite

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
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

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<Uuid, User>>>,

    /// All links in storage
    links: Arc<Mutex<HashMap<Uuid, Link>>>,

    /// Outstanding one-time sign-in credentials, keyed by token value
    login_tokens: Arc<Mutex<HashMap<String, LoginToken>>>,

    /// All recorded analytics events
    events: Arc<Mutex<HashMap<Uuid, AnalyticsEvent>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            links: Arc::new(Mutex::new(HashMap::new())),
            login_tokens: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Outstanding token value for a user, if any
    ///
    /// The delivery side of magic links is external; tests use this to play
    /// the part of the mailbox
    #[cfg(test)]
    pub async fn peek_login_token(&self, user_id: &Uuid) -> Option<String> {
        self.login_tokens
            .lock()
            .await
            .values()
            .find(|token| &token.user_id == user_id)
            .map(|token| token.token.clone())
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn upsert_user(&self, values: &UpsertUserValues<'_>) -> Result<User> {
        let mut users = self.users.lock().await;

        if let Some(user) = users.values_mut().find(|user| user.email == values.email) {
            if let Some(name) = values.name {
                user.name = Some(name.to_string());
                user.updated_at = Utc::now().naive_utc();
            }

            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            email: values.email.to_string(),
            name: values.name.map(ToString::to_string),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn create_login_token(&self, values: &CreateLoginTokenValues<'_>) -> Result<LoginToken> {
        let token = LoginToken {
            token: values.token.to_string(),
            user_id: values.user.id,
            kind: values.kind,
            expires_at: values.expires_at,
        };

        self.login_tokens
            .lock()
            .await
            .insert(token.token.clone(), token.clone());

        Ok(token)
    }

    async fn consume_login_token(&self, token: &str, kind: TokenKind) -> Result<Option<User>> {
        let consumed = self.login_tokens.lock().await.remove(token);

        let Some(consumed) = consumed else {
            return Ok(None);
        };

        if consumed.kind != kind || consumed.is_expired(Utc::now().naive_utc()) {
            return Ok(None);
        }

        self.find_single_user_by_id(&consumed.user_id).await
    }

    async fn find_all_links(&self, user_id: Option<&Uuid>) -> Result<Vec<Link>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .filter(|link| user_id.is_none() || user_id == Some(&link.user_id))
            .cloned()
            .collect())
    }

    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>> {
        Ok(self.links.lock().await.get(id).cloned())
    }

    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .find(|link| link.slug == slug)
            .cloned())
    }

    async fn find_single_link_by_short_url_suffix(&self, slug: &str) -> Result<Option<Link>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .find(|link| link.short_url_suffix() == slug)
            .cloned())
    }

    async fn create_link(&self, values: &CreateLinkValues<'_>) -> Result<Link> {
        let mut links = self.links.lock().await;

        if links.values().any(|link| link.slug == values.slug) {
            return Err(Error::Conflict(format!(
                r#"Slug "{}" already exists"#,
                values.slug
            )));
        }

        let link = Link {
            id: Uuid::new_v4(),
            user_id: values.user.id,
            slug: values.slug.to_string(),
            short_url: values.short_url.to_string(),
            full_url: values.full_url.to_string(),
            description: values.description.map(ToString::to_string),
            favicon: values.favicon.map(ToString::to_string),
            tags: values.tags.to_vec(),
            is_active: values.is_active,
            clicks: 0,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        links.insert(link.id, link.clone());

        Ok(link)
    }

    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link> {
        let mut links = self.links.lock().await;

        let link = links
            .get_mut(&link.id)
            .expect("HashMap is the source of the link");

        if let Some(full_url) = &values.full_url {
            link.full_url = full_url.to_string();
        }

        if let Some(description) = &values.description {
            link.description.clone_from(description);
        }

        if let Some(favicon) = &values.favicon {
            link.favicon.clone_from(favicon);
        }

        if let Some(tags) = &values.tags {
            link.tags.clone_from(tags);
        }

        if let Some(is_active) = values.is_active {
            link.is_active = is_active;
        }

        link.updated_at = Utc::now().naive_utc();

        Ok(link.clone())
    }

    async fn delete_link(&self, link: &Link) -> Result<()> {
        self.links.lock().await.remove(&link.id);

        Ok(())
    }

    async fn update_clicks(&self, id: &Uuid, clicks: i64) -> Result<Option<Link>> {
        let mut links = self.links.lock().await;

        Ok(links.get_mut(id).map(|link| {
            link.clicks = clicks;
            link.updated_at = Utc::now().naive_utc();

            link.clone()
        }))
    }

    async fn create_analytics_event(&self, link_id: &Uuid) -> Result<AnalyticsEvent> {
        let event = AnalyticsEvent {
            id: Uuid::new_v4(),
            link_id: *link_id,
            clicked_at: Utc::now().naive_utc(),
        };

        self.events.lock().await.insert(event.id, event.clone());

        Ok(event)
    }

    async fn count_analytics_events(&self, link_id: &Uuid) -> Result<i64> {
        let count = self
            .events
            .lock()
            .await
            .values()
            .filter(|event| &event.link_id == link_id)
            .count();

        i64::try_from(count).map_err(|err| Error::Connection(err.to_string()))
    }
}
