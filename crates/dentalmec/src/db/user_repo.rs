//! User repository: the subset of user data the order core reads.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::auth::{Actor, Role};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            role: row.get("role")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// Fields needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub role: Role,
}

/// Inserts a user and returns its id.
pub fn insert(
    conn: &Connection,
    user: &NewUser<'_>,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (name, email, role, active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        params![user.name, user.email, user.role, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![id],
            UserRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            UserRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Enables or disables a user account.
pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET active = ?2 WHERE id = ?1",
        params![id, active],
    )?;
    Ok(changed > 0)
}
