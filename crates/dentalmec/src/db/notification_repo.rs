//! Notification repository.
//!
//! Rows are written only as a side effect of status changes and comments.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::DatabaseError;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    /// Kind of entity the notification points to (`order`, `comment`).
    pub related_to: String,
    pub related_id: i64,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            message: row.get("message")?,
            related_to: row.get("related_to")?,
            related_id: row.get("related_id")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(
    conn: &Connection,
    user_id: i64,
    title: &str,
    message: &str,
    related_to: &str,
    related_id: i64,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (user_id, title, message, related_to, related_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![user_id, title, message, related_to, related_id, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Notifications of a user, newest first.
pub fn list_for_user(
    conn: &Connection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<NotificationRow>, DatabaseError> {
    let sql = if unread_only {
        "SELECT * FROM notifications WHERE user_id = ?1 AND is_read = 0 ORDER BY id DESC"
    } else {
        "SELECT * FROM notifications WHERE user_id = ?1 ORDER BY id DESC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id], NotificationRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Marks a notification read. Only the recipient's own notifications match.
pub fn mark_read(conn: &Connection, user_id: i64, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(changed > 0)
}

pub fn count_unread(conn: &Connection, user_id: i64) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Total notifications for a user, read or not.
pub fn count_for_user(conn: &Connection, user_id: i64) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
        params![user_id],
        |r| r.get(0),
    )?;
    Ok(count)
}
