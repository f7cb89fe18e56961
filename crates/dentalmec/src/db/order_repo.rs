//! Order repository: CRUD operations for the `orders` table.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::order::{OrderStatus, ProcessType};

/// A raw order row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub reference_number: String,
    pub process_type: ProcessType,
    pub status: OrderStatus,
    pub material: Option<String>,
    pub color: Option<String>,
    pub observations: Option<String>,
    pub estimated_completion_date: NaiveDate,
    pub completion_date: Option<DateTime<Utc>>,
    pub total_price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            reference_number: row.get("reference_number")?,
            process_type: row.get("process_type")?,
            status: row.get("status")?,
            material: row.get("material")?,
            color: row.get("color")?,
            observations: row.get("observations")?,
            estimated_completion_date: row.get("estimated_completion_date")?,
            completion_date: row.get("completion_date")?,
            total_price_cents: row.get("total_price_cents")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Column values for a new order. The reference number is supplied separately
/// by the allocator.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub process_type: ProcessType,
    pub status: OrderStatus,
    pub material: Option<String>,
    pub color: Option<String>,
    pub observations: Option<String>,
    pub estimated_completion_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Partial update of the editable order columns. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub process_type: Option<ProcessType>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub observations: Option<String>,
    pub estimated_completion_date: Option<NaiveDate>,
    pub total_price_cents: Option<i64>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        *self == OrderPatch::default()
    }
}

/// An order plus the aggregate columns shown in order lists.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub order: OrderRow,
    pub owner_name: String,
    pub owner_email: String,
    pub file_count: u64,
    pub comment_count: u64,
}

/// Query filter parameters for order listing.
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub process_type: Option<ProcessType>,
    /// Substring match on reference number, owner name or owner email.
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts an order with the given reference number and returns its id.
///
/// Fails with a unique violation if the reference number is taken.
pub fn insert(
    conn: &Connection,
    reference_number: &str,
    order: &NewOrder,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO orders (user_id, reference_number, process_type, status, material, color,
         observations, estimated_completion_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            order.user_id,
            reference_number,
            order.process_type,
            order.status,
            order.material,
            order.color,
            order.observations,
            order.estimated_completion_date,
            order.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<OrderRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM orders WHERE id = ?1",
            params![id],
            OrderRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_by_reference(
    conn: &Connection,
    reference_number: &str,
) -> Result<Option<OrderRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM orders WHERE reference_number = ?1",
            params![reference_number],
            OrderRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns the lexicographically greatest reference number starting with `prefix`.
pub fn max_reference_with_prefix(
    conn: &Connection,
    prefix: &str,
) -> Result<Option<String>, DatabaseError> {
    let max: Option<String> = conn.query_row(
        "SELECT MAX(reference_number) FROM orders WHERE substr(reference_number, 1, ?2) = ?1",
        params![prefix, prefix.len() as i64],
        |r| r.get(0),
    )?;
    Ok(max)
}

/// Applies a partial update. Returns false if the order does not exist.
pub fn update_details(
    conn: &Connection,
    id: i64,
    patch: &OrderPatch,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    if patch.is_empty() {
        return Ok(find_by_id(conn, id)?.is_some());
    }

    let mut assignments = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(process_type) = patch.process_type {
        param_values.push(Box::new(process_type));
        assignments.push(format!("process_type = ?{}", param_values.len()));
    }
    if let Some(ref material) = patch.material {
        param_values.push(Box::new(material.clone()));
        assignments.push(format!("material = ?{}", param_values.len()));
    }
    if let Some(ref color) = patch.color {
        param_values.push(Box::new(color.clone()));
        assignments.push(format!("color = ?{}", param_values.len()));
    }
    if let Some(ref observations) = patch.observations {
        param_values.push(Box::new(observations.clone()));
        assignments.push(format!("observations = ?{}", param_values.len()));
    }
    if let Some(date) = patch.estimated_completion_date {
        param_values.push(Box::new(date));
        assignments.push(format!("estimated_completion_date = ?{}", param_values.len()));
    }
    if let Some(price) = patch.total_price_cents {
        param_values.push(Box::new(price));
        assignments.push(format!("total_price_cents = ?{}", param_values.len()));
    }

    param_values.push(Box::new(updated_at));
    assignments.push(format!("updated_at = ?{}", param_values.len()));
    param_values.push(Box::new(id));

    let sql = format!(
        "UPDATE orders SET {} WHERE id = ?{}",
        assignments.join(", "),
        param_values.len()
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let changed = conn.execute(&sql, params_ref.as_slice())?;
    Ok(changed > 0)
}

/// Writes all three free-form fields, clearing the ones that are `None`.
/// Returns false if the order does not exist.
pub fn set_details(
    conn: &Connection,
    id: i64,
    material: Option<&str>,
    color: Option<&str>,
    observations: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE orders SET material = ?1, color = ?2, observations = ?3, updated_at = ?4
         WHERE id = ?5",
        params![material, color, observations, updated_at, id],
    )?;
    Ok(changed > 0)
}

/// Sets status, `updated_at` and `completion_date` in one statement.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: OrderStatus,
    completion_date: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?2, completion_date = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, status, completion_date, updated_at],
    )?;
    Ok(changed > 0)
}

/// Deletes an order. Files, history and comments go with it (cascade).
pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Queries orders with filters, newest first, returning (rows, total_count).
pub fn query(
    conn: &Connection,
    filter: &OrderFilter,
) -> Result<(Vec<OrderSummary>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(user_id) = filter.user_id {
        param_values.push(Box::new(user_id));
        conditions.push(format!("o.user_id = ?{}", param_values.len()));
    }
    if let Some(status) = filter.status {
        param_values.push(Box::new(status));
        conditions.push(format!("o.status = ?{}", param_values.len()));
    }
    if let Some(process_type) = filter.process_type {
        param_values.push(Box::new(process_type));
        conditions.push(format!("o.process_type = ?{}", param_values.len()));
    }
    if let Some(ref search) = filter.search {
        let search = search.trim();
        if !search.is_empty() {
            param_values.push(Box::new(format!("%{}%", search)));
            let n = param_values.len();
            conditions.push(format!(
                "(o.reference_number LIKE ?{n} OR u.name LIKE ?{n} OR u.email LIKE ?{n})"
            ));
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM orders o JOIN users u ON o.user_id = u.id {}",
        where_clause
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT o.*, u.name AS owner_name, u.email AS owner_email,
         (SELECT COUNT(*) FROM files f WHERE f.order_id = o.id) AS file_count,
         (SELECT COUNT(*) FROM comments c WHERE c.order_id = o.id) AS comment_count
         FROM orders o JOIN users u ON o.user_id = u.id
         {} ORDER BY o.created_at DESC, o.id DESC LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), |row| {
            Ok(OrderSummary {
                order: OrderRow::from_row(row)?,
                owner_name: row.get("owner_name")?,
                owner_email: row.get("owner_email")?,
                file_count: row.get("file_count")?,
                comment_count: row.get("comment_count")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Ids of draft (`new`) orders created before `cutoff`.
pub fn find_drafts_created_before(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM orders WHERE status = ?1 AND created_at < ?2 ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![OrderStatus::New, cutoff], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}
