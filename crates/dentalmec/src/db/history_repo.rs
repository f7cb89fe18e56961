//! Status history repository: append-only log of order status changes.
//!
//! There is deliberately no update function; rows disappear only when their
//! order is deleted.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::order::OrderStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    /// Name of the user in `created_by`, if any.
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            status: row.get("status")?,
            notes: row.get("notes")?,
            created_by: row.get("created_by")?,
            created_by_name: row.get("user_name")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn append(
    conn: &Connection,
    order_id: i64,
    status: OrderStatus,
    notes: Option<&str>,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO status_history (order_id, status, notes, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![order_id, status, notes, created_by, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// History of an order, oldest first.
pub fn list_for_order(conn: &Connection, order_id: i64) -> Result<Vec<HistoryRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT sh.*, u.name AS user_name
         FROM status_history sh
         LEFT JOIN users u ON sh.created_by = u.id
         WHERE sh.order_id = ?1
         ORDER BY sh.id ASC",
    )?;
    let rows = stmt
        .query_map(params![order_id], HistoryRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn latest_for_order(
    conn: &Connection,
    order_id: i64,
) -> Result<Option<HistoryRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT sh.*, u.name AS user_name
             FROM status_history sh
             LEFT JOIN users u ON sh.created_by = u.id
             WHERE sh.order_id = ?1
             ORDER BY sh.id DESC LIMIT 1",
            params![order_id],
            HistoryRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn count_for_order(conn: &Connection, order_id: i64) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM status_history WHERE order_id = ?1",
        params![order_id],
        |r| r.get(0),
    )?;
    Ok(count)
}
