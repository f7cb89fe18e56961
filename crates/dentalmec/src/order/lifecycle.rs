//! Order lifecycle: status transitions and comments.
//!
//! Every transition writes the new status, one status history entry and (when
//! someone other than the owner acted) one notification for the owner. The
//! three writes share a transaction, so a failure in any of them leaves the
//! order exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{error, info, info_span};

use crate::clock::Clock;
use crate::db::{comment_repo, history_repo, notification_repo, order_repo, user_repo, Database};
use crate::error::{PortalError, Result};
use crate::order::OrderStatus;

/// What a committed transition wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub order_id: i64,
    pub reference_number: String,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub history_id: i64,
    /// `None` when the owner changed their own order.
    pub notification_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub comment_id: i64,
    pub notification_id: Option<i64>,
}

#[derive(Clone)]
pub struct LifecycleManager {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Moves an order to `new_status`.
    ///
    /// Any status may follow any other. Moving to `completed` stamps
    /// `completion_date`; moving anywhere else clears it. `actor` is recorded
    /// as the author of the history entry.
    pub fn transition(
        &self,
        order_id: i64,
        new_status: OrderStatus,
        notes: Option<&str>,
        actor: Option<i64>,
    ) -> Result<TransitionRecord> {
        let _span = info_span!("order.transition", order_id, status = %new_status).entered();
        let now = self.clock.now();

        let result = self
            .db
            .with_tx(|conn| apply_transition(conn, order_id, new_status, notes, actor, now));

        match &result {
            Ok(record) => info!(
                reference = %record.reference_number,
                from = %record.previous_status,
                to = %record.status,
                "Order status updated"
            ),
            Err(e) => error!(error = %e, "Order status update rolled back"),
        }
        result
    }

    /// Adds a comment and notifies the owner when someone else wrote it.
    pub fn add_comment(&self, order_id: i64, author_id: i64, text: &str) -> Result<CommentRecord> {
        let _span = info_span!("order.comment", order_id, author_id).entered();
        let now = self.clock.now();

        let result = self.db.with_tx(|conn| {
            let order = order_repo::find_by_id(conn, order_id)?
                .ok_or(PortalError::OrderNotFound(order_id))?;
            let comment_id = comment_repo::insert(conn, order_id, author_id, text, now)?;

            let notification_id = if order.user_id != author_id {
                let author = user_repo::find_by_id(conn, author_id)?
                    .map(|user| user.name)
                    .unwrap_or_else(|| "Someone".to_string());
                let title = format!("New comment on order #{}", order.reference_number);
                let message = format!(
                    "{} added a comment to your order #{}",
                    author, order.reference_number
                );
                Some(notification_repo::insert(
                    conn,
                    order.user_id,
                    &title,
                    &message,
                    "comment",
                    order_id,
                    now,
                )?)
            } else {
                None
            };

            Ok(CommentRecord {
                comment_id,
                notification_id,
            })
        });

        if let Err(e) = &result {
            error!(error = %e, "Comment rolled back");
        }
        result
    }
}

fn apply_transition(
    conn: &Connection,
    order_id: i64,
    new_status: OrderStatus,
    notes: Option<&str>,
    actor: Option<i64>,
    now: DateTime<Utc>,
) -> Result<TransitionRecord> {
    let order =
        order_repo::find_by_id(conn, order_id)?.ok_or(PortalError::OrderNotFound(order_id))?;

    let completion_date = (new_status == OrderStatus::Completed).then_some(now);
    order_repo::update_status(conn, order_id, new_status, completion_date, now)?;

    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    let history_id = history_repo::append(conn, order_id, new_status, notes, actor, now)?;

    let notification_id = if actor == Some(order.user_id) {
        None
    } else {
        let title = format!("Order #{} - Status updated", order.reference_number);
        let mut message = format!(
            "Your order #{} has been updated to: {}",
            order.reference_number,
            new_status.label()
        );
        if let Some(notes) = notes {
            message.push_str(". Notes: ");
            message.push_str(notes);
        }
        Some(notification_repo::insert(
            conn,
            order.user_id,
            &title,
            &message,
            "order",
            order_id,
            now,
        )?)
    };

    Ok(TransitionRecord {
        order_id,
        reference_number: order.reference_number,
        previous_status: order.status,
        status: new_status,
        history_id,
        notification_id,
    })
}
