//! Click accounting
//!
//! Best-effort side effects of a successful resolution: counter increment
//! and one analytics event. Runs detached from the request; the redirect is
//! never blocked on, or failed by, anything in here.

use tokio::task::JoinHandle;

use crate::links::Link;
use crate::realtime::ChangeEvent;
use crate::realtime::Hub;
use crate::storage::Storage;

/// Record one click on a resolved link
///
/// Spawned fire-and-forget; the effects may land after the redirect response
/// is already out. Each effect is individually best-effort: failures go to
/// the log and nowhere else.
///
/// The counter write is read-then-write: `clicks` was read at resolution
/// time and `clicks + 1` is written as an absolute value, so concurrent
/// resolutions of the same link can lose updates.
pub fn record_click<S: Storage>(storage: S, hub: Hub, link: Link) -> JoinHandle<()> {
    tokio::spawn(async move {
        let clicks = link.clicks + 1;

        match storage.update_clicks(&link.id, clicks).await {
            Ok(Some(updated)) => {
                let updated_id = updated.id;
                hub.publish(&updated_id, ChangeEvent::LinkUpdated(updated));
            }
            Ok(None) => {
                tracing::warn!(
                    r#"Link "{}" disappeared between resolution and click accounting"#,
                    link.slug
                );
            }
            Err(err) => {
                tracing::warn!(r#"Failed to increment clicks of "{}": {err}"#, link.slug);
            }
        }

        match storage.create_analytics_event(&link.id).await {
            Ok(event) => {
                hub.publish(&link.id, ChangeEvent::ClickRecorded(event));
            }
            Err(err) => {
                tracing::warn!(
                    r#"Failed to record analytics event for "{}": {err}"#,
                    link.slug
                );
            }
        }
    })
}
