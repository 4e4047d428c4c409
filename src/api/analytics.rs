//! Analytics API endpoints
//!
//! Simple counting over the caller's links; nothing beyond totals and
//! per-link counters.

use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Success;

/// Clicks of one link in the summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerLinkClicks {
    /// Link ID
    pub id: Uuid,

    /// Display form of the short URL
    pub short_url: String,

    /// Click counter of the link
    pub clicks: i64,
}

/// Click totals over all links of one user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummaryResponse {
    /// Sum of all click counters
    pub total_clicks: i64,

    /// Number of links
    pub link_count: usize,

    /// Counter per link
    pub per_link: Vec<PerLinkClicks>,
}

/// Summarize click counts over the caller's links
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:7100/api/analytics
/// ```
///
/// Response:
/// ```json
/// { "data": { "totalClicks": 3, "linkCount": 2, "perLink": [ ... ] }, "error": null }
/// ```
pub async fn summary<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<AnalyticsSummaryResponse>, Error> {
    let links = storage
        .find_all_links(Some(&current_user.id))
        .await
        .map_err(Error::internal_server_error)?;

    let per_link = links
        .into_iter()
        .map(|link| PerLinkClicks {
            id: link.id,
            short_url: link.short_url,
            clicks: link.clicks,
        })
        .collect::<Vec<PerLinkClicks>>();

    Ok(Success::ok(AnalyticsSummaryResponse {
        total_clicks: per_link.iter().map(|link| link.clicks).sum(),
        link_count: per_link.len(),
        per_link,
    }))
}
