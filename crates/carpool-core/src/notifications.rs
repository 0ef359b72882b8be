use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use carpool_db::{Database, queries};
use carpool_types::models::{Notification, NotificationPayload};

use crate::error::CoreResult;

/// Appends a notification. Only called from inside the transaction of the
/// operation that caused it.
pub(crate) fn notify(
    conn: &Connection,
    user_id: Uuid,
    message: String,
    payload: NotificationPayload,
    now: DateTime<Utc>,
) -> anyhow::Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        message,
        read: false,
        created_at: now,
        payload,
    };
    queries::insert_notification(conn, &notification)?;
    debug!(
        "Queued {} notification for {} on ride {}",
        notification.payload.kind(),
        user_id,
        notification.payload.ride_id()
    );
    Ok(notification)
}

/// Per-user, append-only event log read by polling clients.
#[derive(Clone)]
pub struct NotificationSink {
    db: Arc<Database>,
}

impl NotificationSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Unread notifications, newest first.
    pub fn list_unread(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        Ok(self
            .db
            .with_conn(|conn| queries::notifications_for_user(conn, user_id, true))?)
    }

    /// Every notification, read or not, newest first.
    pub fn list_all(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        Ok(self
            .db
            .with_conn(|conn| queries::notifications_for_user(conn, user_id, false))?)
    }

    pub fn mark_all_read(&self, user_id: Uuid) -> CoreResult<usize> {
        Ok(self.db.with_conn(|conn| queries::mark_all_read(conn, user_id))?)
    }
}
