use rusqlite::{Connection, params};
use uuid::Uuid;

use aura_types::Notification;

use crate::error::OptionalExt;
use crate::models::{NOTIFICATION_COLUMNS, NotificationRow, ts};
use crate::{Database, Result};

impl Database {
    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, related_id, is_read,
                                            sender_id, sender_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.kind.as_str(),
                    n.message,
                    n.related_id.to_string(),
                    n.is_read,
                    n.sender_id.map(|id| id.to_string()),
                    n.sender_name,
                    ts(&n.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| query_notification(conn, id))
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], NotificationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(NotificationRow::into_notification).collect()
        })
    }

    pub fn unread_notification_count(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            Ok(updated)
        })
    }

    /// Marks a notification read and replaces its text with the outcome of
    /// the action taken on it.
    pub fn close_notification(&self, id: Uuid, message: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET is_read = 1, message = ?2 WHERE id = ?1",
                params![id.to_string(), message],
            )?;
            Ok(())
        })
    }
}

fn query_notification(conn: &Connection, id: Uuid) -> Result<Option<Notification>> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], NotificationRow::from_row)
        .optional()?
        .map(NotificationRow::into_notification)
        .transpose()
}
