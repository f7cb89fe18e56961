//! The order form as a state machine.
//!
//! Steps run strictly in order: process type, file upload, details,
//! confirmation. The first successful upload creates a draft order in status
//! `new`; confirming moves it to `pending` and ends the session. Cancelling
//! at any point deletes the draft and its files.

use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::auth::Actor;
use crate::db::order_repo::OrderPatch;
use crate::error::{PortalError, Result, ValidationError};
use crate::order::{OrderDetails, OrderService, OrderStatus, ProcessType};
use crate::uploads::UploadedFile;
use crate::wizard::session::{SessionKey, WizardSession, WizardStep};
use crate::wizard::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    /// Step 1. The raw value as submitted by the form.
    SelectProcess(String),
    /// Step 2.
    UploadFiles(Vec<UploadedFile>),
    /// Step 3.
    SubmitDetails(OrderDetails),
    /// Step 4.
    Confirm,
    Back,
    Cancel,
}

impl WizardAction {
    /// The step this action belongs to. Navigation works from any step.
    pub fn step(&self) -> Option<WizardStep> {
        match self {
            WizardAction::SelectProcess(_) => Some(WizardStep::ProcessType),
            WizardAction::UploadFiles(_) => Some(WizardStep::Files),
            WizardAction::SubmitDetails(_) => Some(WizardStep::Details),
            WizardAction::Confirm => Some(WizardStep::Confirmation),
            WizardAction::Back | WizardAction::Cancel => None,
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    /// The session after the action; `session.step` is the page to show.
    Continue(WizardSession),
    /// The action was refused. The session is what the page should show
    /// again, together with the reasons.
    Rejected {
        session: WizardSession,
        errors: Vec<PortalError>,
    },
    /// The draft was confirmed and the session ended.
    Submitted {
        order_id: i64,
        reference_number: String,
    },
    Cancelled,
}

pub struct OrderWizard {
    orders: OrderService,
    sessions: Arc<dyn SessionStore>,
}

impl OrderWizard {
    pub fn new(orders: OrderService, sessions: Arc<dyn SessionStore>) -> Self {
        Self { orders, sessions }
    }

    /// Current state, or a fresh session at step 1.
    pub fn session(&self, key: &SessionKey) -> WizardSession {
        self.sessions.load(key).unwrap_or_default()
    }

    /// Applies one action.
    ///
    /// Input problems come back as [`StepOutcome::Rejected`]. An `Err` means
    /// the store or the database failed.
    pub fn handle(
        &self,
        key: &SessionKey,
        actor: &Actor,
        action: WizardAction,
    ) -> Result<StepOutcome> {
        let session = self.session(key);
        let _span = info_span!(
            "wizard.step",
            user_id = actor.user_id,
            step = session.step.number()
        )
        .entered();

        if let Some(expected) = action.step() {
            if expected != session.step {
                warn!(expected = expected.number(), "Action for another step ignored");
                return Ok(reject(
                    session.clone(),
                    ValidationError::WrongStep {
                        expected,
                        actual: session.step,
                    },
                ));
            }
        }

        match action {
            WizardAction::SelectProcess(raw) => self.select_process(key, actor, session, &raw),
            WizardAction::UploadFiles(files) => self.upload_files(key, actor, session, &files),
            WizardAction::SubmitDetails(details) => {
                self.submit_details(key, actor, session, &details)
            }
            WizardAction::Confirm => self.confirm(key, actor, session),
            WizardAction::Back => {
                let mut session = session;
                session.step = session.step.previous();
                self.sessions.save(key, &session);
                Ok(StepOutcome::Continue(session))
            }
            WizardAction::Cancel => self.cancel(key, session),
        }
    }

    fn select_process(
        &self,
        key: &SessionKey,
        actor: &Actor,
        mut session: WizardSession,
        raw: &str,
    ) -> Result<StepOutcome> {
        let process_type = match raw.parse::<ProcessType>() {
            Ok(process_type) => process_type,
            Err(e) => return Ok(reject(session, e)),
        };

        // Backed up after the draft exists: keep the draft in line.
        if let Some(draft_id) = session.draft_order_id {
            let patch = OrderPatch {
                process_type: Some(process_type),
                ..Default::default()
            };
            match self.orders.update_details(actor, draft_id, &patch) {
                Ok(_) => {}
                Err(PortalError::OrderNotFound(_)) => return Ok(self.draft_lost(key)),
                Err(e) => return Err(e),
            }
        }

        session.process_type = Some(process_type);
        session.step = WizardStep::Files;
        self.sessions.save(key, &session);
        Ok(StepOutcome::Continue(session))
    }

    fn upload_files(
        &self,
        key: &SessionKey,
        actor: &Actor,
        mut session: WizardSession,
        files: &[UploadedFile],
    ) -> Result<StepOutcome> {
        if files.is_empty() {
            return Ok(reject(session, ValidationError::NoFiles));
        }
        let Some(process_type) = session.process_type else {
            return Ok(self.draft_lost(key));
        };

        // The whole batch is refused if any file is unacceptable.
        let invalid: Vec<PortalError> = files
            .iter()
            .filter_map(|file| self.orders.files().validate(file).err())
            .map(PortalError::from)
            .collect();
        if !invalid.is_empty() {
            return Ok(StepOutcome::Rejected {
                session,
                errors: invalid,
            });
        }

        let draft_id = match session.draft_order_id {
            Some(id) => id,
            None => {
                let created =
                    self.orders
                        .create_order(actor.user_id, process_type, &session.details)?;
                info!(reference = %created.reference_number, "Draft order created");
                session.draft_order_id = Some(created.id);
                self.sessions.save(key, &session);
                created.id
            }
        };

        let mut errors = Vec::new();
        for file in files {
            match self.orders.files().attach(draft_id, file) {
                Ok(row) => session.file_ids.push(row.id),
                Err(e) => {
                    warn!(file = %file.original_name, error = %e, "Upload failed");
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() {
            self.sessions.save(key, &session);
            return Ok(StepOutcome::Rejected { session, errors });
        }

        session.step = WizardStep::Details;
        self.sessions.save(key, &session);
        Ok(StepOutcome::Continue(session))
    }

    fn submit_details(
        &self,
        key: &SessionKey,
        actor: &Actor,
        mut session: WizardSession,
        details: &OrderDetails,
    ) -> Result<StepOutcome> {
        let Some(draft_id) = session.draft_order_id else {
            return Ok(self.draft_lost(key));
        };

        let details = details.normalized();
        match self.orders.set_details(actor, draft_id, &details) {
            Ok(_) => {}
            Err(PortalError::OrderNotFound(_)) => return Ok(self.draft_lost(key)),
            Err(e) => return Err(e),
        }

        session.details = details;
        session.step = WizardStep::Confirmation;
        self.sessions.save(key, &session);
        Ok(StepOutcome::Continue(session))
    }

    fn confirm(
        &self,
        key: &SessionKey,
        actor: &Actor,
        session: WizardSession,
    ) -> Result<StepOutcome> {
        let Some(draft_id) = session.draft_order_id else {
            return Ok(self.draft_lost(key));
        };

        let record = match self.orders.lifecycle().transition(
            draft_id,
            OrderStatus::Pending,
            Some("Order confirmed by client"),
            Some(actor.user_id),
        ) {
            Ok(record) => record,
            Err(PortalError::OrderNotFound(_)) => return Ok(self.draft_lost(key)),
            Err(e) => return Err(e),
        };

        self.sessions.remove(key);
        info!(reference = %record.reference_number, "Order submitted");
        Ok(StepOutcome::Submitted {
            order_id: record.order_id,
            reference_number: record.reference_number,
        })
    }

    fn cancel(&self, key: &SessionKey, session: WizardSession) -> Result<StepOutcome> {
        if let Some(draft_id) = session.draft_order_id {
            self.orders.remove_order(draft_id)?;
            info!(order_id = draft_id, "Draft order discarded");
        }
        self.sessions.remove(key);
        Ok(StepOutcome::Cancelled)
    }

    /// The draft disappeared (reaped or deleted by staff). Start over.
    fn draft_lost(&self, key: &SessionKey) -> StepOutcome {
        warn!("Draft order missing, restarting wizard");
        self.sessions.remove(key);
        reject(WizardSession::default(), ValidationError::MissingDraft)
    }
}

fn reject(session: WizardSession, error: impl Into<PortalError>) -> StepOutcome {
    StepOutcome::Rejected {
        session,
        errors: vec![error.into()],
    }
}
