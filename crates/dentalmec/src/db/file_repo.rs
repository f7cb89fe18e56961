//! File repository: metadata rows for uploaded design files.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: i64,
    pub order_id: i64,
    pub original_name: String,
    /// File name on disk after de-duplication.
    pub stored_name: String,
    pub file_path: String,
    pub file_size: u64,
    /// Lowercase extension, e.g. `stl`.
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            original_name: row.get("original_name")?,
            stored_name: row.get("stored_name")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            file_type: row.get("file_type")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub order_id: i64,
    pub original_name: &'a str,
    pub stored_name: &'a str,
    pub file_path: &'a str,
    pub file_size: u64,
    pub file_type: &'a str,
    pub uploaded_at: DateTime<Utc>,
}

pub fn insert(conn: &Connection, file: &NewFile<'_>) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO files (order_id, original_name, stored_name, file_path, file_size,
         file_type, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file.order_id,
            file.original_name,
            file.stored_name,
            file.file_path,
            file.file_size as i64,
            file.file_type,
            file.uploaded_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<FileRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM files WHERE id = ?1",
            params![id],
            FileRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Files attached to an order, in upload order.
pub fn list_for_order(conn: &Connection, order_id: i64) -> Result<Vec<FileRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM files WHERE order_id = ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![order_id], FileRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
