use chrono::{DateTime, Utc};
use serde_json::Value;

use super::domain::{Case, CaseId, CaseSnapshot};
use super::procedure::ProcedureRef;
use super::status::CaseStatus;
use super::wizard::WizardProgress;

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Which lifecycle timestamp a transition stamps. Each is set at most once
/// and never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStamp {
    Prepared,
    Completed,
    Archived,
}

/// A conditional status write: "update WHERE id = X AND status = expected".
///
/// A false result means zero rows matched; that is the sole concurrency
/// signal this model relies on.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub expected: CaseStatus,
    pub next: CaseStatus,
    pub stamp: Option<(LifecycleStamp, DateTime<Utc>)>,
    /// Reopen advances the version so the next submission snapshots under a
    /// fresh (case, version) key.
    pub bump_version: bool,
}

/// Storage abstraction for cases, snapshots, and wizard progress.
///
/// Field editability is enforced by the submission pipeline, not here; the
/// store only guarantees the conditional-write and uniqueness semantics the
/// concurrency model depends on.
pub trait CaseStore: Send + Sync {
    fn insert_case(&self, case: Case) -> Result<Case, RepositoryError>;
    fn fetch_case(&self, id: &CaseId) -> Result<Option<Case>, RepositoryError>;

    /// Upsert one field value on an editable case.
    fn upsert_field(&self, id: &CaseId, key: &str, value: Value) -> Result<(), RepositoryError>;

    /// Conditionally bind a procedure: only applied while the stored status
    /// still equals `expected`. Returns false when zero rows matched.
    fn bind_procedure(
        &self,
        id: &CaseId,
        expected: CaseStatus,
        next: CaseStatus,
        procedure: ProcedureRef,
    ) -> Result<bool, RepositoryError>;

    /// Compare-and-swap the status column. Returns false when zero rows
    /// matched the expected prior status.
    fn cas_status(&self, id: &CaseId, transition: StatusTransition)
        -> Result<bool, RepositoryError>;

    /// Append-only snapshot creation with a uniqueness constraint over
    /// (case_id, version); a concurrent duplicate surfaces as `Conflict`.
    fn create_snapshot(&self, snapshot: CaseSnapshot) -> Result<CaseSnapshot, RepositoryError>;
    fn fetch_snapshot(
        &self,
        id: &CaseId,
        version: u32,
    ) -> Result<Option<CaseSnapshot>, RepositoryError>;
    fn list_snapshots(&self, id: &CaseId) -> Result<Vec<CaseSnapshot>, RepositoryError>;

    fn fetch_wizard(&self, id: &CaseId) -> Result<Option<WizardProgress>, RepositoryError>;
    fn upsert_wizard(&self, progress: WizardProgress) -> Result<(), RepositoryError>;
}
