//! The order form driven end to end: sessions, draft orders and stored files.

mod common;

use common::TestHarness;
use dentalmec::db::file_repo;
use dentalmec::order::OrderDetails;
use dentalmec::wizard::{SessionKey, StepOutcome, WizardAction, WizardSession, WizardStep};
use dentalmec::{OrderStatus, PortalError, ProcessType, ValidationError};

fn continued(outcome: StepOutcome) -> WizardSession {
    match outcome {
        StepOutcome::Continue(session) => session,
        other => panic!("expected Continue, got {:?}", other),
    }
}

fn rejected(outcome: StepOutcome) -> (WizardSession, Vec<PortalError>) {
    match outcome {
        StepOutcome::Rejected { session, errors } => (session, errors),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

/// Runs steps 1 and 2 and returns the draft id.
fn start_draft(h: &TestHarness, key: &SessionKey, names: &[&str]) -> i64 {
    continued(h.act(key, WizardAction::SelectProcess("milling".into())));
    let uploads = names.iter().map(|name| h.upload(name, b"solid")).collect();
    let session = continued(h.act(key, WizardAction::UploadFiles(uploads)));
    session.draft_order_id.expect("draft not created")
}

#[test]
fn test_wizard_submits_order_with_files() {
    let h = TestHarness::new();
    let key = SessionKey::new();

    let session = continued(h.act(&key, WizardAction::SelectProcess(" sintering ".into())));
    assert_eq!(session.process_type, Some(ProcessType::Sintering));
    assert_eq!(h.count("orders"), 0);

    let session = continued(h.act(
        &key,
        WizardAction::UploadFiles(vec![
            h.upload("upper.stl", b"solid upper"),
            h.upload("case.constructionInfo", b"<info/>"),
        ]),
    ));
    let draft_id = session.draft_order_id.unwrap();
    assert_eq!(h.order(draft_id).status, OrderStatus::New);

    continued(h.act(
        &key,
        WizardAction::SubmitDetails(OrderDetails {
            material: Some("Zirconia".into()),
            color: Some("A1".into()),
            observations: Some("Thin margins".into()),
        }),
    ));

    match h.act(&key, WizardAction::Confirm) {
        StepOutcome::Submitted {
            order_id,
            reference_number,
        } => {
            assert_eq!(order_id, draft_id);
            assert_eq!(reference_number, "20260312-0001");
        }
        other => panic!("expected Submitted, got {:?}", other),
    }

    let order = h.order(draft_id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.observations.as_deref(), Some("Thin margins"));

    let stored = h.stored_files();
    assert_eq!(stored.len(), 2);
    let order_dir = h
        .config
        .upload_directory
        .join("2026")
        .join("03")
        .join(draft_id.to_string());
    assert!(stored.iter().all(|path| path.starts_with(&order_dir)));
    assert!(h.sessions.is_empty());
}

#[test]
fn test_duplicate_names_are_numbered() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl", "crown.stl", "crown.stl"]);

    let files = h
        .db
        .with_conn(|conn| file_repo::list_for_order(conn, draft_id))
        .unwrap();
    let mut stored: Vec<&str> = files.iter().map(|f| f.stored_name.as_str()).collect();
    stored.sort();
    assert_eq!(stored, ["crown.stl", "crown_1.stl", "crown_2.stl"]);
    assert!(files.iter().all(|f| f.original_name == "crown.stl"));
}

#[test]
fn test_unknown_process_type_keeps_step_one() {
    let h = TestHarness::new();
    let key = SessionKey::new();

    let (session, errors) = rejected(h.act(&key, WizardAction::SelectProcess("casting".into())));
    assert_eq!(session.step, WizardStep::ProcessType);
    assert!(matches!(
        errors.as_slice(),
        [PortalError::Validation(ValidationError::InvalidProcessType(_))]
    ));
    assert_eq!(h.count("orders"), 0);
}

#[test]
fn test_oversized_file_rejects_batch_without_draft() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    continued(h.act(&key, WizardAction::SelectProcess("printing".into())));

    let mut big = h.upload("arch.stl", b"solid");
    big.size = h.config.uploads.max_file_size + 1;
    let (session, errors) = rejected(h.act(
        &key,
        WizardAction::UploadFiles(vec![h.upload("ok.stl", b"solid"), big]),
    ));

    assert_eq!(session.step, WizardStep::Files);
    assert!(matches!(
        errors.as_slice(),
        [PortalError::Validation(ValidationError::FileTooLarge { .. })]
    ));
    assert_eq!(h.count("orders"), 0);
    assert!(h.stored_files().is_empty());
}

#[test]
fn test_back_to_step_one_moves_draft_process_type() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl"]);
    let before = h.order(draft_id).estimated_completion_date;

    let session = continued(h.act(&key, WizardAction::Back));
    assert_eq!(session.step, WizardStep::Files);
    let session = continued(h.act(&key, WizardAction::Back));
    assert_eq!(session.step, WizardStep::ProcessType);

    continued(h.act(&key, WizardAction::SelectProcess("sintering".into())));
    let order = h.order(draft_id);
    assert_eq!(order.process_type, ProcessType::Sintering);
    assert!(order.estimated_completion_date > before);
    assert_eq!(h.count("orders"), 1);
}

#[test]
fn test_cleared_details_after_back_reach_the_draft() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl"]);

    continued(h.act(
        &key,
        WizardAction::SubmitDetails(OrderDetails {
            material: Some("Zirconia".into()),
            color: Some("A1".into()),
            observations: Some("old note".into()),
        }),
    ));
    let session = continued(h.act(&key, WizardAction::Back));
    assert_eq!(session.step, WizardStep::Details);

    let session = continued(h.act(
        &key,
        WizardAction::SubmitDetails(OrderDetails {
            material: Some("Zirconia".into()),
            color: None,
            observations: Some("".into()),
        }),
    ));
    assert_eq!(session.details.color, None);
    assert_eq!(session.details.observations, None);

    let order = h.order(draft_id);
    assert_eq!(order.material.as_deref(), Some("Zirconia"));
    assert_eq!(order.color, None);
    assert_eq!(order.observations, None);
}

#[test]
fn test_client_cannot_delete_files_after_confirmation() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl", "bridge.obj"]);

    let files = h.orders.files().list_for_order(&h.client, draft_id).unwrap();
    h.orders.files().delete_file(&h.client, files[0].id).unwrap();
    assert_eq!(h.stored_files().len(), 1);

    continued(h.act(&key, WizardAction::SubmitDetails(OrderDetails::default())));
    assert!(matches!(
        h.act(&key, WizardAction::Confirm),
        StepOutcome::Submitted { .. }
    ));

    assert!(matches!(
        h.orders.files().delete_file(&h.client, files[1].id),
        Err(PortalError::Unauthorized(_))
    ));
    assert_eq!(h.count("files"), 1);
    assert_eq!(h.stored_files().len(), 1);

    h.orders.files().delete_file(&h.technician, files[1].id).unwrap();
    assert_eq!(h.count("files"), 0);
    assert!(h.stored_files().is_empty());
}

#[test]
fn test_cancel_discards_draft_and_files() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl", "bridge.obj"]);
    assert_eq!(h.stored_files().len(), 2);

    assert!(matches!(h.act(&key, WizardAction::Cancel), StepOutcome::Cancelled));
    assert_eq!(h.count("orders"), 0);
    assert_eq!(h.count("files"), 0);
    assert_eq!(h.count("status_history"), 0);
    assert!(h.stored_files().is_empty());
    assert!(matches!(
        h.orders.order_details(&h.technician, draft_id),
        Err(PortalError::OrderNotFound(_))
    ));
    assert_eq!(h.wizard.session(&key), WizardSession::default());
}

#[test]
fn test_deleted_draft_restarts_wizard() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl"]);
    h.orders.delete_order(&h.technician, draft_id).unwrap();

    let (session, errors) = rejected(h.act(
        &key,
        WizardAction::SubmitDetails(OrderDetails::default()),
    ));
    assert_eq!(session, WizardSession::default());
    assert!(matches!(
        errors.as_slice(),
        [PortalError::Validation(ValidationError::MissingDraft)]
    ));
    assert!(h.sessions.is_empty());
}

#[test]
fn test_download_copy_uses_original_name() {
    let h = TestHarness::new();
    let key = SessionKey::new();
    let draft_id = start_draft(&h, &key, &["crown.stl", "crown.stl"]);

    let files = h.orders.files().list_for_order(&h.client, draft_id).unwrap();
    let copy = h
        .orders
        .files()
        .prepare_download(&h.client, files[1].id)
        .unwrap();
    assert!(copy.starts_with(&h.config.temp_directory));
    assert_eq!(copy.file_name().unwrap(), "crown.stl");
    assert_eq!(std::fs::read(&copy).unwrap(), b"solid");
}
