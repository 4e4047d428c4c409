//! Short link records

use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// A shortened URL owned by a dashboard user
#[derive(Clone, Debug)]
pub struct Link {
    /// Link ID
    pub id: Uuid,

    /// The ID of the owning user
    pub user_id: Uuid,

    /// Slug used by the resolver, unique across links
    pub slug: String,

    /// Display form of the short URL, possibly a `host/slug` compound
    pub short_url: String,

    /// Destination the resolver redirects to
    pub full_url: String,

    /// Optional display description
    pub description: Option<String>,

    /// Optional favicon URL of the destination
    pub favicon: Option<String>,

    /// Free-form display tags
    pub tags: Vec<String>,

    /// Dashboard-facing active flag
    ///
    /// Not consulted by the resolver; inactive links still resolve
    pub is_active: bool,

    /// Click counter, best-effort and advisory
    pub clicks: i64,

    /// Creation date
    pub created_at: NaiveDateTime,

    /// Last updated at
    pub updated_at: NaiveDateTime,
}

impl Link {
    /// Trailing path segment of the short URL
    ///
    /// For a compound `host/slug` short URL this is the part a visitor
    /// actually types after the domain
    pub fn short_url_suffix(&self) -> &str {
        self.short_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}
