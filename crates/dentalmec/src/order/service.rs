//! Order operations as seen by clients and staff.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::auth::Actor;
use crate::clock::Clock;
use crate::config::Config;
use crate::db::comment_repo::{self, CommentRow};
use crate::db::file_repo::{self, FileRow};
use crate::db::history_repo::{self, HistoryRow};
use crate::db::notification_repo::{self, NotificationRow};
use crate::db::order_repo::{self, NewOrder, OrderFilter, OrderPatch, OrderRow, OrderSummary};
use crate::db::stats_repo::{self, UserOrderStats};
use crate::db::Database;
use crate::error::{PortalError, Result, ValidationError};
use crate::order::lifecycle::{CommentRecord, LifecycleManager, TransitionRecord};
use crate::order::{reference, schedule, OrderStatus, ProcessType};
use crate::uploads::FileService;

/// Free-form fields entered by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub material: Option<String>,
    pub color: Option<String>,
    pub observations: Option<String>,
}

impl OrderDetails {
    /// Trims every field and drops the empty ones.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            material: clean(&self.material),
            color: clean(&self.color),
            observations: clean(&self.observations),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: i64,
    pub reference_number: String,
    pub estimated_completion_date: NaiveDate,
}

/// Everything shown on an order's detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub order: OrderRow,
    pub files: Vec<FileRow>,
    /// Oldest first.
    pub history: Vec<HistoryRow>,
    /// Newest first.
    pub comments: Vec<CommentRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: u64,
}

#[derive(Clone)]
pub struct OrderService {
    db: Database,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    lifecycle: LifecycleManager,
    files: FileService,
}

impl OrderService {
    pub fn new(
        db: Database,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        files: FileService,
    ) -> Self {
        let lifecycle = LifecycleManager::new(db.clone(), clock.clone());
        Self {
            db,
            config,
            clock,
            lifecycle,
            files,
        }
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn files(&self) -> &FileService {
        &self.files
    }

    /// Creates a draft (`new`) order for `owner_id`.
    ///
    /// The reference is allocated and the order row and its first history
    /// entry are written in one transaction.
    pub fn create_order(
        &self,
        owner_id: i64,
        process_type: ProcessType,
        details: &OrderDetails,
    ) -> Result<CreatedOrder> {
        let _span = info_span!("order.create", owner_id, process_type = %process_type).entered();

        let now = self.clock.now();
        let today = self.clock.today();
        let estimated_completion_date =
            schedule::estimate_completion(process_type, today, &self.config.processing_times)?;
        let details = details.normalized();
        let new_order = NewOrder {
            user_id: owner_id,
            process_type,
            status: OrderStatus::New,
            material: details.material,
            color: details.color,
            observations: details.observations,
            estimated_completion_date,
            created_at: now,
        };

        let (reference_number, id) = self.db.with_tx(|conn| {
            let (reference_number, id) = reference::allocate(
                conn,
                today,
                self.config.allocator.max_attempts,
                |conn, reference| order_repo::insert(conn, reference, &new_order),
            )?;
            history_repo::append(
                conn,
                id,
                OrderStatus::New,
                Some("Order created"),
                Some(owner_id),
                now,
            )?;
            Ok::<_, PortalError>((reference_number, id))
        })?;

        info!(order_id = id, reference = %reference_number, "Order created");
        Ok(CreatedOrder {
            id,
            reference_number,
            estimated_completion_date,
        })
    }

    pub fn order_details(&self, actor: &Actor, order_id: i64) -> Result<OrderView> {
        let view = self.db.with_conn(|conn| {
            let Some(order) = order_repo::find_by_id(conn, order_id)? else {
                return Ok(None);
            };
            Ok(Some(OrderView {
                files: file_repo::list_for_order(conn, order_id)?,
                history: history_repo::list_for_order(conn, order_id)?,
                comments: comment_repo::list_for_order(conn, order_id)?,
                order,
            }))
        })?;
        let view = view.ok_or(PortalError::OrderNotFound(order_id))?;
        actor.ensure_access(view.order.user_id)?;
        Ok(view)
    }

    pub fn find_by_reference(&self, actor: &Actor, reference_number: &str) -> Result<OrderRow> {
        let order = self
            .db
            .with_conn(|conn| order_repo::find_by_reference(conn, reference_number))?
            .ok_or_else(|| {
                PortalError::Validation(ValidationError::InvalidIdentifier(
                    reference_number.to_string(),
                ))
            })?;
        actor.ensure_access(order.user_id)?;
        Ok(order)
    }

    /// Clients only ever see their own orders. Staff see all and may search
    /// by reference, client name or e-mail.
    pub fn list_orders(&self, actor: &Actor, filter: &OrderFilter) -> Result<OrderPage> {
        let mut filter = filter.clone();
        if !actor.is_staff() {
            filter.user_id = Some(actor.user_id);
            filter.search = None;
        }
        let (orders, total) = self.db.with_conn(|conn| order_repo::query(conn, &filter))?;
        Ok(OrderPage { orders, total })
    }

    /// Staff status change.
    ///
    /// `new` is reserved for drafts, a status cannot be set to itself and a
    /// rejection must carry a reason. Everything else goes through the
    /// lifecycle manager.
    pub fn update_status(
        &self,
        actor: &Actor,
        order_id: i64,
        new_status: OrderStatus,
        notes: Option<&str>,
    ) -> Result<TransitionRecord> {
        actor.ensure_staff()?;

        if new_status == OrderStatus::New {
            return Err(ValidationError::StatusNotSettable(new_status).into());
        }
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        if new_status == OrderStatus::Rejected && notes.is_none() {
            return Err(ValidationError::MissingRejectionReason.into());
        }

        let current = self
            .db
            .with_conn(|conn| order_repo::find_by_id(conn, order_id))?
            .ok_or(PortalError::OrderNotFound(order_id))?;
        if current.status == new_status {
            return Err(ValidationError::UnchangedStatus(new_status).into());
        }

        self.lifecycle
            .transition(order_id, new_status, notes, Some(actor.user_id))
    }

    /// Partial update of the editable order fields. A changed process type
    /// without an explicit date also moves the estimated completion date.
    pub fn update_details(&self, actor: &Actor, order_id: i64, patch: &OrderPatch) -> Result<OrderRow> {
        let _span = info_span!("order.update_details", order_id).entered();
        let now = self.clock.now();
        let today = self.clock.today();

        self.db.with_tx(|conn| {
            let order = order_repo::find_by_id(conn, order_id)?
                .ok_or(PortalError::OrderNotFound(order_id))?;
            ensure_editable(actor, &order)?;
            if patch.total_price_cents.is_some() {
                actor.ensure_staff()?;
            }

            let mut patch = patch.clone();
            if let Some(process_type) = patch.process_type {
                if process_type != order.process_type && patch.estimated_completion_date.is_none() {
                    patch.estimated_completion_date = Some(schedule::estimate_completion(
                        process_type,
                        today,
                        &self.config.processing_times,
                    )?);
                }
            }
            order_repo::update_details(conn, order_id, &patch, now)?;
            order_repo::find_by_id(conn, order_id)?.ok_or(PortalError::OrderNotFound(order_id))
        })
    }

    /// Replaces material, color and observations. Blank fields are cleared.
    pub fn set_details(
        &self,
        actor: &Actor,
        order_id: i64,
        details: &OrderDetails,
    ) -> Result<OrderRow> {
        let _span = info_span!("order.set_details", order_id).entered();
        let now = self.clock.now();
        let details = details.normalized();

        self.db.with_tx(|conn| {
            let order = order_repo::find_by_id(conn, order_id)?
                .ok_or(PortalError::OrderNotFound(order_id))?;
            ensure_editable(actor, &order)?;
            order_repo::set_details(
                conn,
                order_id,
                details.material.as_deref(),
                details.color.as_deref(),
                details.observations.as_deref(),
                now,
            )?;
            order_repo::find_by_id(conn, order_id)?.ok_or(PortalError::OrderNotFound(order_id))
        })
    }

    /// Deletes an order together with its stored files.
    pub fn delete_order(&self, actor: &Actor, order_id: i64) -> Result<()> {
        let _span = info_span!("order.delete", order_id).entered();
        let order = self
            .db
            .with_conn(|conn| order_repo::find_by_id(conn, order_id))?
            .ok_or(PortalError::OrderNotFound(order_id))?;
        ensure_editable(actor, &order)?;
        self.remove_order(order_id)?;
        info!(reference = %order.reference_number, "Order deleted");
        Ok(())
    }

    /// Physical files first, then the row; files, history and comments rows
    /// go with it.
    pub(crate) fn remove_order(&self, order_id: i64) -> Result<()> {
        self.files.remove_stored_files(order_id)?;
        self.db.with_conn(|conn| order_repo::delete(conn, order_id))?;
        Ok(())
    }

    pub fn add_comment(&self, actor: &Actor, order_id: i64, text: &str) -> Result<CommentRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let order = self
            .db
            .with_conn(|conn| order_repo::find_by_id(conn, order_id))?
            .ok_or(PortalError::OrderNotFound(order_id))?;
        actor.ensure_access(order.user_id)?;

        self.lifecycle.add_comment(order_id, actor.user_id, text)
    }

    pub fn user_stats(&self, actor: &Actor, user_id: i64) -> Result<UserOrderStats> {
        actor.ensure_access(user_id)?;
        let now = self.clock.now();
        Ok(self
            .db
            .with_conn(|conn| stats_repo::user_order_stats(conn, user_id, now))?)
    }

    /// Deletes drafts older than `ttl`, with their files. Returns how many
    /// were removed.
    pub fn reap_stale_drafts(&self, ttl: Duration) -> Result<usize> {
        let _span = info_span!("order.reap_drafts", ttl_hours = ttl.num_hours()).entered();
        let cutoff = self.clock.now() - ttl;
        let ids = self
            .db
            .with_conn(|conn| order_repo::find_drafts_created_before(conn, cutoff))?;

        let mut removed = 0;
        for id in ids {
            match self.remove_order(id) {
                Ok(()) => removed += 1,
                Err(e) => warn!(order_id = id, error = %e, "Failed to remove stale draft"),
            }
        }
        info!(removed, "Stale drafts reaped");
        Ok(removed)
    }

    /// Orders per status across all clients. Staff only.
    pub fn status_counts(&self, actor: &Actor) -> Result<Vec<(OrderStatus, u64)>> {
        actor.ensure_staff()?;
        Ok(self.db.with_conn(stats_repo::count_by_status)?)
    }

    pub fn unread_notifications(&self, actor: &Actor) -> Result<u64> {
        Ok(self
            .db
            .with_conn(|conn| notification_repo::count_unread(conn, actor.user_id))?)
    }

    pub fn list_notifications(&self, actor: &Actor, unread_only: bool) -> Result<Vec<NotificationRow>> {
        Ok(self
            .db
            .with_conn(|conn| notification_repo::list_for_user(conn, actor.user_id, unread_only))?)
    }

    pub fn mark_notification_read(&self, actor: &Actor, notification_id: i64) -> Result<bool> {
        Ok(self
            .db
            .with_conn(|conn| notification_repo::mark_read(conn, actor.user_id, notification_id))?)
    }
}

/// Owners may change their orders only while they are drafts. Staff may
/// change any order.
pub(crate) fn ensure_editable(actor: &Actor, order: &OrderRow) -> Result<()> {
    actor.ensure_access(order.user_id)?;
    if !actor.is_staff() && order.status != OrderStatus::New {
        return Err(PortalError::Unauthorized(format!(
            "client cannot change order {} in status {}",
            order.reference_number, order.status
        )));
    }
    Ok(())
}
