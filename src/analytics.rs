//! Click analytics events

use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// One recorded redirect through the resolver
///
/// Created by the click accountant only; never mutated or deleted
#[derive(Clone, Debug)]
pub struct AnalyticsEvent {
    /// Event ID
    pub id: Uuid,

    /// The link that was resolved
    pub link_id: Uuid,

    /// When the click happened
    pub clicked_at: NaiveDateTime,
}
