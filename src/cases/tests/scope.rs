use super::common::{build_service, prepared_case, tenant};
use crate::cases::domain::{Case, CaseId};
use crate::cases::scope::{require_tenant_scope, ScopeDenied};
use chrono::Utc;

fn owned_case(owner: &str) -> Case {
    Case::new(
        CaseId("case-scope".to_string()),
        tenant(owner),
        "Scoped".to_string(),
        Utc::now(),
    )
}

#[test]
fn matching_tenants_pass_through() {
    let case = require_tenant_scope(Some(owned_case("acme")), &tenant("acme"))
        .expect("owner sees the case");
    assert_eq!(case.tenant_id, tenant("acme"));
}

#[test]
fn missing_resources_are_denied() {
    let result = require_tenant_scope::<Case>(None, &tenant("acme"));
    assert_eq!(result, Err(ScopeDenied));
}

#[test]
fn foreign_resources_are_denied_identically_to_missing_ones() {
    let missing = require_tenant_scope::<Case>(None, &tenant("acme")).expect_err("absent");
    let foreign = require_tenant_scope(Some(owned_case("globex")), &tenant("acme"))
        .expect_err("foreign owner");
    assert_eq!(missing, foreign);
}

#[test]
fn the_service_reports_foreign_cases_as_not_found() {
    let (service, _store) = build_service();
    let owner = tenant("acme");
    let intruder = tenant("globex");
    let case_id = prepared_case(&service, &owner);

    assert_eq!(
        service.get_case(&intruder, &case_id).expect_err("hidden").code(),
        "CASE_NOT_FOUND"
    );
    assert_eq!(
        service.submit(&intruder, &case_id).expect_err("hidden").code(),
        "CASE_NOT_FOUND"
    );
    assert_eq!(
        service
            .list_snapshots(&intruder, &case_id)
            .expect_err("hidden")
            .code(),
        "CASE_NOT_FOUND"
    );
    assert_eq!(
        service
            .get_snapshot(&intruder, &case_id, 1)
            .expect_err("hidden")
            .code(),
        "CASE_NOT_FOUND"
    );

    // The owner still sees everything.
    assert!(service.get_case(&owner, &case_id).is_ok());
    assert!(service.get_snapshot(&owner, &case_id, 1).is_ok());
}
