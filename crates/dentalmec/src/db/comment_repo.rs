//! Comment repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::DatabaseError;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

pub fn insert(
    conn: &Connection,
    order_id: i64,
    user_id: i64,
    text: &str,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO comments (order_id, user_id, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![order_id, user_id, text, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on an order with author names, newest first.
pub fn list_for_order(conn: &Connection, order_id: i64) -> Result<Vec<CommentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.order_id, c.user_id, u.name, c.comment, c.created_at
         FROM comments c
         JOIN users u ON c.user_id = u.id
         WHERE c.order_id = ?1
         ORDER BY c.created_at DESC, c.id DESC",
    )?;
    let rows = stmt
        .query_map(params![order_id], |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                order_id: row.get(1)?,
                user_id: row.get(2)?,
                user_name: row.get(3)?,
                text: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::order_repo::tests::{sample_order, seed_user};
    use crate::db::{order_repo, Database};

    #[test]
    fn test_insert_and_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let user = seed_user(conn, "a@example.com");
            let order = order_repo::insert(conn, "20260309-0001", &sample_order(user))?;
            let t1: DateTime<Utc> = "2026-03-09T10:00:00Z".parse().unwrap();
            let t2: DateTime<Utc> = "2026-03-09T11:00:00Z".parse().unwrap();

            insert(conn, order, user, "Please use shade A2", t1)?;
            insert(conn, order, user, "Any update?", t2)?;

            let rows = list_for_order(conn, order)?;
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].text, "Any update?");
            assert_eq!(rows[1].user_name, "Clínica Sonrisa");
            Ok(())
        })
        .unwrap();
    }
}
