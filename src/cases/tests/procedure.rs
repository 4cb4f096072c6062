use std::sync::Arc;

use super::common::two_field_procedure;
use crate::cases::procedure::{BuiltinProcedures, ProcedureDefinition, ProcedureRegistry};

fn published(code: &str, version: u32) -> Arc<ProcedureDefinition> {
    let mut procedure = two_field_procedure();
    procedure.code = code.to_string();
    procedure.version = version;
    Arc::new(procedure)
}

#[test]
fn resolving_without_a_version_picks_the_highest_published() {
    let registry = BuiltinProcedures::with_published(vec![
        published("unit_test", 1),
        published("unit_test", 3),
        published("unit_test", 2),
    ]);

    let resolved = registry.resolve("unit_test", None).expect("resolved");

    assert_eq!(resolved.version, 3);
}

#[test]
fn resolving_pins_an_exact_version() {
    let registry = BuiltinProcedures::with_published(vec![
        published("unit_test", 1),
        published("unit_test", 2),
    ]);

    let resolved = registry.resolve("unit_test", Some(1)).expect("resolved");
    assert_eq!(resolved.version, 1);

    let error = registry
        .resolve("unit_test", Some(9))
        .expect_err("unpublished version");
    assert_eq!(error.code(), "PROCEDURE_NOT_FOUND");
}

#[test]
fn the_standard_registry_publishes_the_declaration_procedures() {
    let registry = BuiltinProcedures::standard();

    assert_eq!(
        registry.codes(),
        vec!["import_declaration", "export_declaration"]
    );
    assert!(registry.resolve("import_declaration", None).is_ok());
    assert!(registry.resolve("export_declaration", Some(1)).is_ok());
}
