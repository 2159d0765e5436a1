//! Checkpointed delivery of new notifications.
//!
//! The checkpoint is the id of the last notification handed to the notifier
//! successfully. It lives in an external [`CheckpointStore`]; this module only
//! reads it at the start of a run and writes it once delivery stops.

mod notifier;
mod store;

pub use notifier::{LogNotifier, WebhookNotifier};
pub use store::{FileCheckpointStore, MemoryCheckpointStore};

use async_trait::async_trait;
use futures::{pin_mut, StreamExt};

use crate::error::{Error, Result};
use crate::notifications::{notifications, FailurePolicy, Notification, PageOptions};
use crate::session::Session;

/// Persistent "last delivered id".
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns `Ok(None)` when no checkpoint has been recorded yet.
    async fn get_last_id(&self) -> anyhow::Result<Option<u64>>;

    async fn put_last_id(&self, id: u64) -> anyhow::Result<()>;
}

/// Outbound channel for new notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Summary of one delivery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// No checkpoint existed; the newest id was recorded without delivering.
    pub bootstrapped: bool,
    pub delivered: usize,
    /// Checkpoint written by this run, if any.
    pub checkpoint: Option<u64>,
}

/// Notifications with an id greater than `last_id`, oldest first.
///
/// The feed is read newest first and reading stops at the first entry at or
/// below `last_id`; this relies on ids decreasing down the feed. The result is
/// sorted by id so the output is strictly increasing even when a page is
/// slightly out of order.
///
/// Under [`FailurePolicy::FailOpen`] a page that can't be read ends the batch
/// early, so the result may be missing older entries between the failure and
/// `last_id`. Under [`FailurePolicy::FailClosed`] the failure is returned.
pub async fn notifications_after(
    session: &Session,
    last_id: u64,
    policy: FailurePolicy,
) -> Result<Vec<Notification>> {
    let feed = notifications(session, PageOptions::default().with_policy(policy));
    pin_mut!(feed);

    let mut batch = Vec::new();
    while let Some(notification) = feed.next().await {
        let notification = notification?;
        if notification.id <= last_id {
            break;
        }
        batch.push(notification);
    }

    batch.sort_by_key(|n| n.id);
    batch.dedup_by_key(|n| n.id);
    Ok(batch)
}

/// Delivers notifications newer than the stored checkpoint and advances it.
///
/// Without a checkpoint (or when reading it fails) the newest id is recorded
/// and nothing is delivered, so a first run does not replay the backlog.
///
/// If the notifier fails partway, the checkpoint is moved to the last
/// notification that was delivered and the notifier's error is returned.
/// Errors writing the checkpoint are returned as well.
///
/// With [`FailurePolicy::FailClosed`] a feed failure aborts the run before
/// anything is sent and the checkpoint is left alone. With
/// [`FailurePolicy::FailOpen`] whatever was read before the failure is
/// delivered and the checkpoint advances past it, skipping any unread
/// notifications between it and the old checkpoint for good.
pub async fn deliver_new_notifications(
    session: &Session,
    store: &dyn CheckpointStore,
    notifier: &dyn Notifier,
    policy: FailurePolicy,
) -> Result<DeliveryReport> {
    let last_id = match store.get_last_id().await {
        Ok(last_id) => last_id,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read checkpoint, starting fresh");
            None
        }
    };
    tracing::info!(last_id = ?last_id, "Loaded checkpoint");

    let Some(last_id) = last_id else {
        return bootstrap(session, store, policy).await;
    };

    let batch = notifications_after(session, last_id, policy).await?;
    let mut report = DeliveryReport::default();
    let mut failure = None;

    for notification in &batch {
        match notifier.send(notification).await {
            Ok(()) => {
                tracing::info!(id = notification.id, "Sent notification");
                report.delivered += 1;
                report.checkpoint = Some(notification.id);
            }
            Err(err) => {
                failure = Some(err.context(format!("delivering notification {}", notification.id)));
                break;
            }
        }
    }

    if let Some(id) = report.checkpoint {
        store.put_last_id(id).await?;
        tracing::info!(id, "Updated checkpoint");
    }

    match failure {
        Some(err) => Err(Error::External(err)),
        None => Ok(report),
    }
}

async fn bootstrap(
    session: &Session,
    store: &dyn CheckpointStore,
    policy: FailurePolicy,
) -> Result<DeliveryReport> {
    let options = PageOptions::default().with_limit(1).with_policy(policy);
    let feed = notifications(session, options);
    pin_mut!(feed);

    let mut report = DeliveryReport {
        bootstrapped: true,
        ..DeliveryReport::default()
    };
    if let Some(latest) = feed.next().await {
        let latest = latest?;
        store.put_last_id(latest.id).await?;
        tracing::info!(id = latest.id, "Recorded initial checkpoint");
        report.checkpoint = Some(latest.id);
    }
    Ok(report)
}
