use std::sync::Arc;

use serde_json::json;

use super::common::{
    build_service, in_process_case, init_wizard, insert_raw_case, prepared_case, tenant,
    StaleStatusStore,
};
use crate::cases::procedure::BuiltinProcedures;
use crate::cases::service::{CaseService, CaseServiceError};
use crate::cases::status::CaseStatus;
use crate::config::LimitsConfig;

#[test]
fn new_cases_start_as_drafts_with_distinct_ids() {
    let (service, _store) = build_service();
    let owner = tenant("acme");

    let first = service.create_case(&owner, "First").expect("created");
    let second = service.create_case(&owner, "Second").expect("created");

    assert_eq!(first.status, CaseStatus::Draft);
    assert_eq!(first.version, 1);
    assert!(first.procedure.is_none());
    assert_ne!(first.id, second.id);
}

#[test]
fn submit_prepares_the_case_and_freezes_a_snapshot() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = in_process_case(&service, &owner);

    let snapshot = service.submit(&owner, &case_id).expect("submits");

    assert_eq!(snapshot.version, 1);
    assert!(snapshot.validation.valid);
    assert_eq!(snapshot.procedure.code, "import_declaration");

    let case = service.get_case(&owner, &case_id).expect("case");
    assert_eq!(case.status, CaseStatus::Prepared);
    assert!(case.prepared_at.is_some());
    assert_eq!(snapshot.fields, case.fields);
}

#[test]
fn repeated_submits_return_the_same_snapshot_without_new_rows() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = in_process_case(&service, &owner);

    let first = service.submit(&owner, &case_id).expect("submits");
    let second = service.submit(&owner, &case_id).expect("idempotent retry");

    assert_eq!(first.version, second.version);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.fields, second.fields);

    let snapshots = service.list_snapshots(&owner, &case_id).expect("listed");
    assert_eq!(snapshots.len(), 1);
}

#[test]
fn drafts_cannot_be_submitted() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case = service.create_case(&owner, "Draft").expect("created");

    let error = service.submit(&owner, &case.id).expect_err("draft submit");

    assert_eq!(error.code(), "CASE_NOT_IN_PROCESS");
}

#[test]
fn archived_cases_refuse_submission() {
    let (service, store) = build_service();
    let owner = tenant("acme");
    let case_id = insert_raw_case(
        &store,
        &owner,
        "raw-archived",
        CaseStatus::Archived,
        Some(("import_declaration", 1)),
    );

    let error = service.submit(&owner, &case_id).expect_err("archived");

    assert_eq!(error.code(), "CASE_ARCHIVED");
}

#[test]
fn submission_requires_a_bound_procedure() {
    let (service, store) = build_service();
    let owner = tenant("acme");
    let case_id = insert_raw_case(&store, &owner, "raw-unbound", CaseStatus::InProcess, None);

    let error = service.submit(&owner, &case_id).expect_err("no procedure");

    assert_eq!(error.code(), "NO_PROCEDURE_BOUND");
}

#[test]
fn submission_requires_wizard_progress_to_exist() {
    let (service, store) = build_service();
    let owner = tenant("acme");
    let case_id = insert_raw_case(
        &store,
        &owner,
        "raw-no-wizard",
        CaseStatus::InProcess,
        Some(("import_declaration", 1)),
    );

    let error = service.submit(&owner, &case_id).expect_err("no wizard row");
    assert_eq!(error.code(), "WIZARD_NOT_INITIALIZED");

    // Once the row exists the failure moves on to wizard completeness.
    init_wizard(&store, &case_id);
    let error = service.submit(&owner, &case_id).expect_err("empty wizard");
    assert_eq!(error.code(), "WIZARD_NOT_COMPLETED");
}

#[test]
fn invalid_cases_are_rejected_before_any_write() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = in_process_case(&service, &owner);
    service
        .upsert_field(&owner, &case_id, "declared_value", json!(0))
        .expect("field updated");

    let error = service.submit(&owner, &case_id).expect_err("invalid case");

    match &error {
        CaseServiceError::CaseInvalid { report } => {
            assert!(!report.valid);
            assert_eq!(report.errors.len(), 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(error.code(), "CASE_INVALID");

    let case = service.get_case(&owner, &case_id).expect("case");
    assert_eq!(case.status, CaseStatus::InProcess);
    assert!(service
        .list_snapshots(&owner, &case_id)
        .expect("listed")
        .is_empty());
}

#[test]
fn losing_the_status_race_surfaces_concurrent_modification() {
    let (service, store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    // A second worker still sees the case in process while the first has
    // already prepared it. Its conditional write must match zero rows.
    let stale = CaseService::new(
        Arc::new(StaleStatusStore {
            inner: store.clone(),
            stale_status: CaseStatus::InProcess,
        }),
        Arc::new(BuiltinProcedures::standard()),
        LimitsConfig::default(),
    );

    let error = stale.submit(&owner, &case_id).expect_err("lost the race");
    assert_eq!(error.code(), "CONCURRENT_MODIFICATION");

    // The winner's snapshot is untouched and no duplicate row appeared.
    let snapshots = service.list_snapshots(&owner, &case_id).expect("listed");
    assert_eq!(snapshots.len(), 1);
}

#[test]
fn losing_the_reopen_race_surfaces_concurrent_modification() {
    let (service, store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);
    service.complete(&owner, &case_id).expect("completed");

    let stale = CaseService::new(
        Arc::new(StaleStatusStore {
            inner: store.clone(),
            stale_status: CaseStatus::Prepared,
        }),
        Arc::new(BuiltinProcedures::standard()),
        LimitsConfig::default(),
    );

    let error = stale.reopen(&owner, &case_id).expect_err("lost the race");

    assert_eq!(error.code(), "CONCURRENT_MODIFICATION");
    let case = service.get_case(&owner, &case_id).expect("case");
    assert_eq!(case.status, CaseStatus::Completed);
}

#[test]
fn reopen_bumps_the_version_for_the_next_submission() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);
    let first = service.get_snapshot(&owner, &case_id, 1).expect("snapshot");

    let case = service.reopen(&owner, &case_id).expect("reopened");
    assert_eq!(case.status, CaseStatus::InProcess);
    assert_eq!(case.version, 2);

    service
        .upsert_field(&owner, &case_id, "package_count", json!(6))
        .expect("edit after reopen");
    service
        .complete_wizard_step(&owner, &case_id, "review")
        .expect("review re-marked");

    let second = service.submit(&owner, &case_id).expect("resubmits");
    assert_eq!(second.version, 2);
    assert_eq!(second.fields["package_count"], json!(6));

    // The first submission stays frozen under its own version.
    let replay = service.get_snapshot(&owner, &case_id, 1).expect("snapshot");
    assert_eq!(replay.fields, first.fields);
    assert_eq!(replay.fields["package_count"], json!(4));
    assert_eq!(
        service.list_snapshots(&owner, &case_id).expect("listed").len(),
        2
    );
}

#[test]
fn only_prepared_cases_can_reopen() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = in_process_case(&service, &owner);

    let error = service.reopen(&owner, &case_id).expect_err("not prepared");

    assert_eq!(error.code(), "CANNOT_REOPEN");
}

#[test]
fn completion_is_idempotent_and_keeps_the_first_timestamp() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    let first = service.complete(&owner, &case_id).expect("completed");
    let second = service.complete(&owner, &case_id).expect("retry");

    assert_eq!(first.status, CaseStatus::Completed);
    assert_eq!(first.completed_at, second.completed_at);
    assert!(first.completed_at.is_some());
}

#[test]
fn completion_requires_a_prepared_case() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = in_process_case(&service, &owner);

    let error = service.complete(&owner, &case_id).expect_err("not prepared");

    assert_eq!(error.code(), "CANNOT_COMPLETE");
}

#[test]
fn archival_requires_a_completed_case_and_is_terminal() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    let error = service.archive(&owner, &case_id).expect_err("not completed");
    assert_eq!(error.code(), "CANNOT_ARCHIVE");

    service.complete(&owner, &case_id).expect("completed");
    let case = service.archive(&owner, &case_id).expect("archived");
    assert_eq!(case.status, CaseStatus::Archived);
    assert!(case.archived_at.is_some());

    let error = service
        .upsert_field(&owner, &case_id, "remarks", json!("late edit"))
        .expect_err("archived cases are frozen");
    assert_eq!(error.code(), "CASE_NOT_EDITABLE");

    let error = service
        .bind_procedure(&owner, &case_id, "export_declaration", None)
        .expect_err("archived cases cannot rebind");
    assert_eq!(error.code(), "CASE_ARCHIVED");
}

#[test]
fn prepared_at_is_stamped_only_once() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);
    let first = service.get_case(&owner, &case_id).expect("case").prepared_at;

    service.reopen(&owner, &case_id).expect("reopened");
    service
        .complete_wizard_step(&owner, &case_id, "review")
        .expect("review re-marked");
    service.submit(&owner, &case_id).expect("resubmits");

    let second = service.get_case(&owner, &case_id).expect("case").prepared_at;
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn rebinding_preserves_the_field_set() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case = service.create_case(&owner, "Shipment").expect("created");
    service
        .bind_procedure(&owner, &case.id, "import_declaration", None)
        .expect("bound");
    service
        .upsert_field(&owner, &case.id, "goods_description", json!("Parts"))
        .expect("field set");

    let case = service
        .bind_procedure(&owner, &case.id, "export_declaration", None)
        .expect("rebound");

    assert_eq!(case.status, CaseStatus::InProcess);
    assert_eq!(case.fields["goods_description"], json!("Parts"));
    let reference = case.procedure.expect("procedure bound");
    assert_eq!(reference.code, "export_declaration");
}

#[test]
fn binding_after_submission_is_refused() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    let error = service
        .bind_procedure(&owner, &case_id, "export_declaration", None)
        .expect_err("already submitted");

    assert_eq!(error.code(), "CASE_ALREADY_SUBMITTED");
}

#[test]
fn unknown_procedure_codes_are_rejected() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case = service.create_case(&owner, "Shipment").expect("created");

    let error = service
        .bind_procedure(&owner, &case.id, "transit_declaration", None)
        .expect_err("unknown code");
    assert_eq!(error.code(), "PROCEDURE_NOT_FOUND");

    let error = service
        .bind_procedure(&owner, &case.id, "import_declaration", Some(99))
        .expect_err("unknown version");
    assert_eq!(error.code(), "PROCEDURE_NOT_FOUND");
}

#[test]
fn oversized_field_values_are_refused() {
    let store = Arc::new(crate::cases::store::InMemoryCaseStore::new());
    let registry = Arc::new(BuiltinProcedures::standard());
    let service = CaseService::new(
        store,
        registry,
        LimitsConfig {
            field_value_max_bytes: 16,
            ..LimitsConfig::default()
        },
    );
    let owner = tenant("acme");
    let case = service.create_case(&owner, "Shipment").expect("created");
    service
        .bind_procedure(&owner, &case.id, "import_declaration", None)
        .expect("bound");

    service
        .upsert_field(&owner, &case.id, "remarks", json!("short"))
        .expect("small value accepted");

    let error = service
        .upsert_field(
            &owner,
            &case.id,
            "remarks",
            json!("a value well past the configured byte limit"),
        )
        .expect_err("oversized value");

    match error {
        CaseServiceError::PayloadTooLarge { limit } => assert_eq!(limit, 16),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn field_edits_are_refused_once_prepared() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    let error = service
        .upsert_field(&owner, &case_id, "remarks", json!("late"))
        .expect_err("prepared cases are read-only");

    assert_eq!(error.code(), "CASE_NOT_EDITABLE");
}

#[test]
fn unknown_snapshot_versions_are_not_found() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let case_id = prepared_case(&service, &owner);

    let error = service
        .get_snapshot(&owner, &case_id, 7)
        .expect_err("no such version");

    assert_eq!(error.code(), "SNAPSHOT_NOT_FOUND");
}
