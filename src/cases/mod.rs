//! Case lifecycle core: status machine, procedure-driven validation, wizard
//! gating, and the idempotent submission pipeline.

pub mod domain;
pub mod procedure;
pub mod repository;
pub mod router;
pub mod scope;
pub mod service;
pub mod status;
pub mod store;
pub(crate) mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{Case, CaseId, CaseSnapshot, CaseView, TenantId};
pub use procedure::{
    BuiltinProcedures, FieldConstraints, FieldDefinition, FieldType, ProcedureDefinition,
    ProcedureRef, ProcedureRegistry, RegistryError, StepDefinition,
};
pub use repository::{CaseStore, LifecycleStamp, RepositoryError, StatusTransition};
pub use router::case_router;
pub use scope::{require_tenant_scope, ScopeDenied, TenantScoped};
pub use service::{CaseService, CaseServiceError};
pub use status::{
    validate_transition, wizard_access, CaseStatus, InvalidStatus, NoProcedureSelected,
    TransitionDenied, WizardAccess,
};
pub use store::InMemoryCaseStore;
pub use validation::{BusinessRule, FieldIssue, RuleTable, ValidationEngine, ValidationReport};
pub use wizard::{step_plan, StepPlanEntry, WizardProgress};
