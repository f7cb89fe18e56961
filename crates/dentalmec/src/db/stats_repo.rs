//! Order statistics repository: dashboard figures for a single client.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::DatabaseError;
use crate::order::OrderStatus;

/// The soonest expected delivery among a user's open orders.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextDelivery {
    pub order_id: i64,
    pub reference_number: String,
    pub estimated_completion_date: NaiveDate,
}

/// Aggregate order figures for one user.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserOrderStats {
    /// Orders in `new`, `pending` or `processing`.
    pub active_orders: u64,
    /// Orders in `new` or `pending`.
    pub pending_orders: u64,
    pub processing_orders: u64,
    /// Orders completed in the calendar month of `now`.
    pub monthly_completed: u64,
    /// Mean days from creation to completion, rounded to one decimal.
    pub average_days: f64,
    pub next_delivery: Option<NextDelivery>,
}

pub fn user_order_stats(
    conn: &Connection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<UserOrderStats, DatabaseError> {
    let (active_orders, pending_orders, processing_orders): (u64, u64, u64) = conn.query_row(
        "SELECT COUNT(*),
         COALESCE(SUM(CASE WHEN status IN (?2, ?3) THEN 1 ELSE 0 END), 0),
         COALESCE(SUM(CASE WHEN status = ?4 THEN 1 ELSE 0 END), 0)
         FROM orders
         WHERE user_id = ?1 AND status IN (?2, ?3, ?4)",
        params![
            user_id,
            OrderStatus::New,
            OrderStatus::Pending,
            OrderStatus::Processing
        ],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    // completion_date is stored as text starting with YYYY-MM.
    let month_prefix = format!("{:04}-{:02}", now.year(), now.month());
    let monthly_completed: u64 = conn.query_row(
        "SELECT COUNT(*) FROM orders
         WHERE user_id = ?1 AND status = ?2 AND substr(completion_date, 1, 7) = ?3",
        params![user_id, OrderStatus::Completed, month_prefix],
        |r| r.get(0),
    )?;

    let average_days: Option<f64> = conn.query_row(
        "SELECT AVG(julianday(completion_date) - julianday(created_at))
         FROM orders
         WHERE user_id = ?1 AND status = ?2 AND completion_date IS NOT NULL",
        params![user_id, OrderStatus::Completed],
        |r| r.get(0),
    )?;
    let average_days = average_days
        .map(|days| (days * 10.0).round() / 10.0)
        .unwrap_or(0.0);

    let next_delivery = conn
        .query_row(
            "SELECT id, reference_number, estimated_completion_date
             FROM orders
             WHERE user_id = ?1 AND status IN (?2, ?3)
             ORDER BY estimated_completion_date ASC, id ASC
             LIMIT 1",
            params![user_id, OrderStatus::Pending, OrderStatus::Processing],
            |row| {
                Ok(NextDelivery {
                    order_id: row.get(0)?,
                    reference_number: row.get(1)?,
                    estimated_completion_date: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(UserOrderStats {
        active_orders,
        pending_orders,
        processing_orders,
        monthly_completed,
        average_days,
        next_delivery,
    })
}

/// Number of orders per status across all users, for the staff dashboard.
pub fn count_by_status(conn: &Connection) -> Result<Vec<(OrderStatus, u64)>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
