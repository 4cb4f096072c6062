use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::config::LimitsConfig;

use super::domain::{Case, CaseId, CaseSnapshot, TenantId};
use super::procedure::{ProcedureDefinition, ProcedureRegistry, RegistryError};
use super::repository::{CaseStore, LifecycleStamp, RepositoryError, StatusTransition};
use super::scope::require_tenant_scope;
use super::status::{wizard_access, CaseStatus, WizardAccess};
use super::validation::{ValidationEngine, ValidationReport};
use super::wizard::{step_plan, StepPlanEntry, WizardProgress};

/// Service composing the status machine, validation engine, wizard tracker,
/// and snapshot persistence into the submit/reopen/complete pipeline.
///
/// Correctness under concurrent calls on the same case relies entirely on
/// the store's conditional writes: every transition is expressed as "update
/// where status still equals the expected prior", and a zero-row match is
/// surfaced as `ConcurrentModification` rather than retried silently.
pub struct CaseService<S, P> {
    store: Arc<S>,
    registry: Arc<P>,
    engine: ValidationEngine,
    limits: LimitsConfig,
}

static CASE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_case_id() -> CaseId {
    let id = CASE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CaseId(format!("case-{id:06}"))
}

impl<S, P> CaseService<S, P>
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    pub fn new(store: Arc<S>, registry: Arc<P>, limits: LimitsConfig) -> Self {
        Self::with_engine(store, registry, ValidationEngine::standard(), limits)
    }

    pub fn with_engine(
        store: Arc<S>,
        registry: Arc<P>,
        engine: ValidationEngine,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            limits,
        }
    }

    /// Create a draft case owned by the caller's tenant.
    pub fn create_case(&self, tenant: &TenantId, title: &str) -> Result<Case, CaseServiceError> {
        let case = Case::new(
            next_case_id(),
            tenant.clone(),
            title.to_string(),
            Utc::now(),
        );
        let stored = self.store.insert_case(case)?;
        info!(case_id = %stored.id.0, tenant = %tenant.0, "case created");
        Ok(stored)
    }

    pub fn get_case(&self, tenant: &TenantId, case_id: &CaseId) -> Result<Case, CaseServiceError> {
        self.scoped_case(tenant, case_id)
    }

    /// Bind a procedure to a case.
    ///
    /// The first bind moves the draft into process; rebinding is permitted
    /// while the case is still in process and preserves the field set.
    pub fn bind_procedure(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
        code: &str,
        version: Option<u32>,
    ) -> Result<Case, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        let procedure = self.registry.resolve(code, version)?;

        let (expected, next) = match case.status {
            CaseStatus::Draft => (CaseStatus::Draft, CaseStatus::InProcess),
            CaseStatus::InProcess => (CaseStatus::InProcess, CaseStatus::InProcess),
            CaseStatus::Archived => return Err(CaseServiceError::CaseArchived),
            CaseStatus::Prepared | CaseStatus::Completed => {
                return Err(CaseServiceError::CaseAlreadySubmitted)
            }
        };

        let bound =
            self.store
                .bind_procedure(&case.id, expected, next, procedure.reference())?;
        if !bound {
            return Err(CaseServiceError::ConcurrentModification);
        }

        if self.store.fetch_wizard(&case.id)?.is_none() {
            self.store
                .upsert_wizard(WizardProgress::new(case.id.clone()))?;
        }

        info!(case_id = %case.id.0, procedure = code, "procedure bound");
        self.scoped_case(tenant, case_id)
    }

    /// Upsert one field value while the case is editable.
    pub fn upsert_field(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
        key: &str,
        value: Value,
    ) -> Result<(), CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        if !case.status.can_edit_fields() {
            return Err(CaseServiceError::CaseNotEditable {
                status: case.status,
            });
        }

        let serialized = value.to_string();
        if serialized.len() > self.limits.field_value_max_bytes {
            return Err(CaseServiceError::PayloadTooLarge {
                limit: self.limits.field_value_max_bytes,
            });
        }

        self.store.upsert_field(&case.id, key, value)?;
        Ok(())
    }

    /// Advisory wizard navigation plan plus the granted access mode.
    pub fn wizard_plan(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
    ) -> Result<(WizardAccess, Vec<StepPlanEntry>), CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        let access = wizard_access(case.status, case.has_procedure())
            .map_err(|_| CaseServiceError::NoProcedureSelected)?;
        let procedure = self.bound_procedure(&case)?;
        let progress = self
            .store
            .fetch_wizard(&case.id)?
            .ok_or(CaseServiceError::WizardNotInitialized)?;
        Ok((access, step_plan(&procedure, &progress)))
    }

    /// Mark one configured step complete.
    pub fn complete_wizard_step(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
        step_key: &str,
    ) -> Result<WizardProgress, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        let access = wizard_access(case.status, case.has_procedure())
            .map_err(|_| CaseServiceError::NoProcedureSelected)?;
        if access == WizardAccess::ReadOnly {
            return Err(CaseServiceError::CaseNotEditable {
                status: case.status,
            });
        }

        let procedure = self.bound_procedure(&case)?;
        if !procedure.steps.iter().any(|step| step.key == step_key) {
            return Err(CaseServiceError::UnknownStep {
                step_key: step_key.to_string(),
            });
        }

        let mut progress = self
            .store
            .fetch_wizard(&case.id)?
            .ok_or(CaseServiceError::WizardNotInitialized)?;
        progress.mark_step(step_key);
        progress.refresh_completion(&procedure);
        self.store.upsert_wizard(progress.clone())?;
        Ok(progress)
    }

    /// Read-only validation run against the bound procedure.
    pub fn validate_case(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
    ) -> Result<ValidationReport, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        let procedure = self.bound_procedure(&case)?;
        Ok(self.engine.validate(&procedure, &case.fields))
    }

    /// Submit an in-process case, producing the immutable snapshot that
    /// authorizes the transition. Retried calls are safe: a case that is
    /// already prepared returns its existing snapshot unchanged.
    pub fn submit(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
    ) -> Result<CaseSnapshot, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;

        // Idempotency short-circuit: no validation, no writes.
        if case.status == CaseStatus::Prepared {
            return self
                .store
                .fetch_snapshot(&case.id, case.version)?
                .ok_or(CaseServiceError::SnapshotNotFound);
        }

        match case.status {
            CaseStatus::InProcess => {}
            CaseStatus::Archived => return Err(CaseServiceError::CaseArchived),
            _ => return Err(CaseServiceError::CaseNotInProcess),
        }

        let reference = case
            .procedure
            .clone()
            .ok_or(CaseServiceError::NoProcedureBound)?;
        let wizard = self
            .store
            .fetch_wizard(&case.id)?
            .ok_or(CaseServiceError::WizardNotInitialized)?;
        let procedure = self
            .registry
            .resolve(&reference.code, Some(reference.version))?;

        if !wizard.satisfies(&procedure) {
            return Err(CaseServiceError::WizardNotCompleted {
                missing_steps: wizard.missing_steps(&procedure),
            });
        }

        let report = self.engine.validate(&procedure, &case.fields);
        if !report.valid {
            return Err(CaseServiceError::CaseInvalid { report });
        }

        let now = Utc::now();
        let snapshot = CaseSnapshot {
            case_id: case.id.clone(),
            version: case.version,
            procedure: reference,
            fields: case.fields.clone(),
            validation: report,
            created_at: now,
        };

        // A concurrent submit may have won the snapshot race; resolve by
        // re-reading instead of failing. Unexpected persistence failures are
        // still checked once for a race-created snapshot before giving up.
        let snapshot = match self.store.create_snapshot(snapshot) {
            Ok(created) => created,
            Err(RepositoryError::Conflict) => self
                .store
                .fetch_snapshot(&case.id, case.version)?
                .ok_or(CaseServiceError::ConcurrentModification)?,
            Err(other) => match self.store.fetch_snapshot(&case.id, case.version) {
                Ok(Some(existing)) => existing,
                _ => return Err(other.into()),
            },
        };

        let swapped = self.store.cas_status(
            &case.id,
            StatusTransition {
                expected: CaseStatus::InProcess,
                next: CaseStatus::Prepared,
                stamp: Some((LifecycleStamp::Prepared, now)),
                bump_version: false,
            },
        )?;
        if !swapped {
            // Another request transitioned the case first; the snapshot race
            // above already deduplicated, so no duplicate rows exist.
            return Err(CaseServiceError::ConcurrentModification);
        }

        let mut wizard = wizard;
        if !wizard.is_completed {
            wizard.is_completed = true;
            self.store.upsert_wizard(wizard)?;
        }

        info!(case_id = %case.id.0, version = snapshot.version, "case submitted");
        Ok(snapshot)
    }

    /// Move a prepared case back into process for further edits.
    ///
    /// Bumps the case version inside the same conditional write so the next
    /// submission snapshots under a fresh (case, version) key.
    pub fn reopen(&self, tenant: &TenantId, case_id: &CaseId) -> Result<Case, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        if !case.status.can_reopen() {
            return Err(CaseServiceError::CannotReopen {
                status: case.status,
            });
        }

        let swapped = self.store.cas_status(
            &case.id,
            StatusTransition {
                expected: CaseStatus::Prepared,
                next: CaseStatus::InProcess,
                stamp: None,
                bump_version: true,
            },
        )?;
        if !swapped {
            return Err(CaseServiceError::ConcurrentModification);
        }

        if let Some(mut wizard) = self.store.fetch_wizard(&case.id)? {
            wizard.reset_completion();
            self.store.upsert_wizard(wizard)?;
        }

        info!(case_id = %case.id.0, "case reopened");
        self.scoped_case(tenant, case_id)
    }

    /// Mark a prepared case completed. Idempotent on an already-completed
    /// case: the existing completion timestamp is returned unchanged.
    pub fn complete(&self, tenant: &TenantId, case_id: &CaseId) -> Result<Case, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        if case.status == CaseStatus::Completed {
            return Ok(case);
        }
        if !case.status.can_complete() {
            return Err(CaseServiceError::CannotComplete {
                status: case.status,
            });
        }

        let swapped = self.store.cas_status(
            &case.id,
            StatusTransition {
                expected: CaseStatus::Prepared,
                next: CaseStatus::Completed,
                stamp: Some((LifecycleStamp::Completed, Utc::now())),
                bump_version: false,
            },
        )?;
        if !swapped {
            return Err(CaseServiceError::ConcurrentModification);
        }

        info!(case_id = %case.id.0, "case completed");
        self.scoped_case(tenant, case_id)
    }

    /// Archive a completed case. Archival is terminal.
    pub fn archive(&self, tenant: &TenantId, case_id: &CaseId) -> Result<Case, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        if case.status != CaseStatus::Completed {
            return Err(CaseServiceError::CannotArchive {
                status: case.status,
            });
        }

        let swapped = self.store.cas_status(
            &case.id,
            StatusTransition {
                expected: CaseStatus::Completed,
                next: CaseStatus::Archived,
                stamp: Some((LifecycleStamp::Archived, Utc::now())),
                bump_version: false,
            },
        )?;
        if !swapped {
            return Err(CaseServiceError::ConcurrentModification);
        }

        info!(case_id = %case.id.0, "case archived");
        self.scoped_case(tenant, case_id)
    }

    pub fn list_snapshots(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
    ) -> Result<Vec<CaseSnapshot>, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        Ok(self.store.list_snapshots(&case.id)?)
    }

    pub fn get_snapshot(
        &self,
        tenant: &TenantId,
        case_id: &CaseId,
        version: u32,
    ) -> Result<CaseSnapshot, CaseServiceError> {
        let case = self.scoped_case(tenant, case_id)?;
        self.store
            .fetch_snapshot(&case.id, version)?
            .ok_or(CaseServiceError::SnapshotNotFound)
    }

    fn scoped_case(&self, tenant: &TenantId, case_id: &CaseId) -> Result<Case, CaseServiceError> {
        let case = self.store.fetch_case(case_id)?;
        require_tenant_scope(case, tenant).map_err(|_| CaseServiceError::CaseNotFound)
    }

    fn bound_procedure(
        &self,
        case: &Case,
    ) -> Result<Arc<ProcedureDefinition>, CaseServiceError> {
        let reference = case
            .procedure
            .as_ref()
            .ok_or(CaseServiceError::NoProcedureBound)?;
        Ok(self
            .registry
            .resolve(&reference.code, Some(reference.version))?)
    }
}

/// Error raised by the case service. `code()` yields the stable API string
/// the HTTP layer returns.
#[derive(Debug, thiserror::Error)]
pub enum CaseServiceError {
    #[error("case not found")]
    CaseNotFound,
    #[error("snapshot not found")]
    SnapshotNotFound,
    #[error("no procedure selected for this case")]
    NoProcedureSelected,
    #[error("no procedure bound to this case")]
    NoProcedureBound,
    #[error("case is not in process")]
    CaseNotInProcess,
    #[error("case fields are not editable while {status}")]
    CaseNotEditable { status: CaseStatus },
    #[error("case has already been submitted")]
    CaseAlreadySubmitted,
    #[error("case is archived")]
    CaseArchived,
    #[error("wizard progress has not been initialized")]
    WizardNotInitialized,
    #[error("wizard incomplete; unfinished steps: {}", missing_steps.join(", "))]
    WizardNotCompleted { missing_steps: Vec<String> },
    #[error("step '{step_key}' is not configured for the bound procedure")]
    UnknownStep { step_key: String },
    #[error("case failed validation with {} issue(s)", report.errors.len())]
    CaseInvalid { report: ValidationReport },
    #[error("case was modified concurrently; refresh and retry")]
    ConcurrentModification,
    #[error("case cannot be reopened while {status}")]
    CannotReopen { status: CaseStatus },
    #[error("case cannot be completed while {status}")]
    CannotComplete { status: CaseStatus },
    #[error("case cannot be archived while {status}")]
    CannotArchive { status: CaseStatus },
    #[error("field value exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error(transparent)]
    Procedure(#[from] RegistryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CaseServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CaseNotFound => "CASE_NOT_FOUND",
            Self::SnapshotNotFound => "SNAPSHOT_NOT_FOUND",
            Self::NoProcedureSelected => "NO_PROCEDURE_SELECTED",
            Self::NoProcedureBound => "NO_PROCEDURE_BOUND",
            Self::CaseNotInProcess => "CASE_NOT_IN_PROCESS",
            Self::CaseNotEditable { .. } => "CASE_NOT_EDITABLE",
            Self::CaseAlreadySubmitted => "CASE_ALREADY_SUBMITTED",
            Self::CaseArchived => "CASE_ARCHIVED",
            Self::WizardNotInitialized => "WIZARD_NOT_INITIALIZED",
            Self::WizardNotCompleted { .. } => "WIZARD_NOT_COMPLETED",
            Self::UnknownStep { .. } => "UNKNOWN_STEP",
            Self::CaseInvalid { .. } => "CASE_INVALID",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::CannotReopen { .. } => "CANNOT_REOPEN",
            Self::CannotComplete { .. } => "CANNOT_COMPLETE",
            Self::CannotArchive { .. } => "CANNOT_ARCHIVE",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Procedure(_) => "PROCEDURE_NOT_FOUND",
            Self::Repository(RepositoryError::Conflict) => "CONFLICT",
            Self::Repository(RepositoryError::NotFound) => "CASE_NOT_FOUND",
            Self::Repository(RepositoryError::Unavailable(_)) => "STORAGE_UNAVAILABLE",
        }
    }
}
