use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::cases::domain::{Case, CaseId, TenantId};
use crate::cases::procedure::{
    BuiltinProcedures, FieldConstraints, FieldDefinition, FieldType, ProcedureDefinition,
    ProcedureRegistry, StepDefinition,
};
use crate::cases::repository::{CaseStore, RepositoryError, StatusTransition};
use crate::cases::service::CaseService;
use crate::cases::status::CaseStatus;
use crate::cases::store::InMemoryCaseStore;
use crate::cases::wizard::WizardProgress;
use crate::config::LimitsConfig;
use chrono::Utc;

pub(super) fn tenant(name: &str) -> TenantId {
    TenantId(name.to_string())
}

pub(super) fn build_service() -> (
    CaseService<InMemoryCaseStore, BuiltinProcedures>,
    Arc<InMemoryCaseStore>,
) {
    let store = Arc::new(InMemoryCaseStore::new());
    let registry = Arc::new(BuiltinProcedures::standard());
    let service = CaseService::new(store.clone(), registry, LimitsConfig::default());
    (service, store)
}

pub(super) fn import_procedure() -> Arc<ProcedureDefinition> {
    BuiltinProcedures::standard()
        .resolve("import_declaration", Some(1))
        .expect("builtin import procedure")
}

pub(super) fn export_procedure() -> Arc<ProcedureDefinition> {
    BuiltinProcedures::standard()
        .resolve("export_declaration", Some(1))
        .expect("builtin export procedure")
}

/// Minimal two-field procedure with no business rules, for engine-level
/// tests: `alpha` required text, `beta` optional number.
pub(super) fn two_field_procedure() -> ProcedureDefinition {
    ProcedureDefinition {
        code: "unit_test".to_string(),
        version: 1,
        title: "Unit Test".to_string(),
        steps: vec![
            StepDefinition {
                key: "details".to_string(),
                title: "Details".to_string(),
                fields: vec![
                    FieldDefinition {
                        key: "alpha".to_string(),
                        field_type: FieldType::Text,
                        required: true,
                        constraints: FieldConstraints::length(10),
                    },
                    FieldDefinition {
                        key: "beta".to_string(),
                        field_type: FieldType::Number,
                        required: false,
                        constraints: FieldConstraints::range(Some(0.0), Some(100.0)),
                    },
                ],
            },
            StepDefinition {
                key: "review".to_string(),
                title: "Review".to_string(),
                fields: Vec::new(),
            },
        ],
    }
}

/// Field map that passes the import declaration end to end.
pub(super) fn valid_import_fields() -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("goods_description".to_string(), json!("Machine parts"));
    fields.insert("goods_category".to_string(), json!("MACHINERY"));
    fields.insert("declared_value".to_string(), json!(1250.0));
    fields.insert("declared_currency".to_string(), json!("EUR"));
    fields.insert("commercial_goods".to_string(), json!(false));
    fields.insert("sender_name".to_string(), json!("Example Sender GmbH"));
    fields.insert("recipient_name".to_string(), json!("Example Recipient AG"));
    fields.insert("origin_country".to_string(), json!("CH"));
    fields.insert("destination_country".to_string(), json!("DE"));
    fields.insert("transport_mode".to_string(), json!("ROAD"));
    fields.insert("package_count".to_string(), json!(4));
    fields
}

pub(super) fn apply_fields(
    service: &CaseService<InMemoryCaseStore, BuiltinProcedures>,
    tenant: &TenantId,
    case_id: &CaseId,
    fields: &BTreeMap<String, Value>,
) {
    for (key, value) in fields {
        service
            .upsert_field(tenant, case_id, key, value.clone())
            .expect("field upsert succeeds");
    }
}

pub(super) fn complete_all_steps(
    service: &CaseService<InMemoryCaseStore, BuiltinProcedures>,
    tenant: &TenantId,
    case_id: &CaseId,
) {
    for step in ["goods", "parties", "transport", "review"] {
        service
            .complete_wizard_step(tenant, case_id, step)
            .expect("wizard step completes");
    }
}

/// Case bound to the import procedure with valid fields and a finished
/// wizard, still in process.
pub(super) fn in_process_case(
    service: &CaseService<InMemoryCaseStore, BuiltinProcedures>,
    tenant: &TenantId,
) -> CaseId {
    let case = service
        .create_case(tenant, "Import shipment")
        .expect("case created");
    service
        .bind_procedure(tenant, &case.id, "import_declaration", None)
        .expect("procedure bound");
    apply_fields(service, tenant, &case.id, &valid_import_fields());
    complete_all_steps(service, tenant, &case.id);
    case.id
}

/// Case driven all the way to prepared.
pub(super) fn prepared_case(
    service: &CaseService<InMemoryCaseStore, BuiltinProcedures>,
    tenant: &TenantId,
) -> CaseId {
    let case_id = in_process_case(service, tenant);
    service.submit(tenant, &case_id).expect("case submits");
    case_id
}

/// Insert a raw case row directly, bypassing the service, to reach states
/// the public API cannot construct.
pub(super) fn insert_raw_case(
    store: &InMemoryCaseStore,
    tenant: &TenantId,
    id: &str,
    status: CaseStatus,
    procedure: Option<(&str, u32)>,
) -> CaseId {
    let mut case = Case::new(
        CaseId(id.to_string()),
        tenant.clone(),
        "Raw case".to_string(),
        Utc::now(),
    );
    case.status = status;
    case.procedure = procedure.map(|(code, version)| crate::cases::procedure::ProcedureRef {
        code: code.to_string(),
        version,
    });
    store.insert_case(case).expect("raw case inserted");
    CaseId(id.to_string())
}

pub(super) fn init_wizard(store: &InMemoryCaseStore, case_id: &CaseId) {
    store
        .upsert_wizard(WizardProgress::new(case_id.clone()))
        .expect("wizard initialized");
}

/// Store wrapper that serves a stale status from `fetch_case`, so the
/// conditional-write paths can be exercised deterministically: the service
/// reads the stale row, then the compare-and-swap hits the true row.
pub(super) struct StaleStatusStore {
    pub(super) inner: Arc<InMemoryCaseStore>,
    pub(super) stale_status: CaseStatus,
}

impl CaseStore for StaleStatusStore {
    fn insert_case(&self, case: Case) -> Result<Case, RepositoryError> {
        self.inner.insert_case(case)
    }

    fn fetch_case(&self, id: &CaseId) -> Result<Option<Case>, RepositoryError> {
        Ok(self.inner.fetch_case(id)?.map(|mut case| {
            case.status = self.stale_status;
            case
        }))
    }

    fn upsert_field(&self, id: &CaseId, key: &str, value: Value) -> Result<(), RepositoryError> {
        self.inner.upsert_field(id, key, value)
    }

    fn bind_procedure(
        &self,
        id: &CaseId,
        expected: CaseStatus,
        next: CaseStatus,
        procedure: crate::cases::procedure::ProcedureRef,
    ) -> Result<bool, RepositoryError> {
        self.inner.bind_procedure(id, expected, next, procedure)
    }

    fn cas_status(
        &self,
        id: &CaseId,
        transition: StatusTransition,
    ) -> Result<bool, RepositoryError> {
        self.inner.cas_status(id, transition)
    }

    fn create_snapshot(
        &self,
        snapshot: crate::cases::domain::CaseSnapshot,
    ) -> Result<crate::cases::domain::CaseSnapshot, RepositoryError> {
        self.inner.create_snapshot(snapshot)
    }

    fn fetch_snapshot(
        &self,
        id: &CaseId,
        version: u32,
    ) -> Result<Option<crate::cases::domain::CaseSnapshot>, RepositoryError> {
        self.inner.fetch_snapshot(id, version)
    }

    fn list_snapshots(
        &self,
        id: &CaseId,
    ) -> Result<Vec<crate::cases::domain::CaseSnapshot>, RepositoryError> {
        self.inner.list_snapshots(id)
    }

    fn fetch_wizard(&self, id: &CaseId) -> Result<Option<WizardProgress>, RepositoryError> {
        self.inner.fetch_wizard(id)
    }

    fn upsert_wizard(&self, progress: WizardProgress) -> Result<(), RepositoryError> {
        self.inner.upsert_wizard(progress)
    }
}
