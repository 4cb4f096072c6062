use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::domain::{Case, CaseId, CaseSnapshot};
use super::procedure::ProcedureRef;
use super::repository::{CaseStore, LifecycleStamp, RepositoryError, StatusTransition};
use super::status::CaseStatus;
use super::wizard::WizardProgress;

/// In-memory store with real compare-and-swap semantics.
///
/// All conditional writes happen under one lock, which stands in for the
/// row-level atomicity a database provides. Storage itself is an external
/// collaborator to this service; this backend exists for the binary, the
/// tests, and any deployment that does not need durability.
#[derive(Default)]
pub struct InMemoryCaseStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    cases: HashMap<CaseId, Case>,
    snapshots: HashMap<(CaseId, u32), CaseSnapshot>,
    wizards: HashMap<CaseId, WizardProgress>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl CaseStore for InMemoryCaseStore {
    fn insert_case(&self, case: Case) -> Result<Case, RepositoryError> {
        let mut inner = self.lock()?;
        if inner.cases.contains_key(&case.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.cases.insert(case.id.clone(), case.clone());
        Ok(case)
    }

    fn fetch_case(&self, id: &CaseId) -> Result<Option<Case>, RepositoryError> {
        let inner = self.lock()?;
        Ok(inner.cases.get(id).cloned())
    }

    fn upsert_field(&self, id: &CaseId, key: &str, value: Value) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let case = inner.cases.get_mut(id).ok_or(RepositoryError::NotFound)?;
        case.fields.insert(key.to_string(), value);
        Ok(())
    }

    fn bind_procedure(
        &self,
        id: &CaseId,
        expected: CaseStatus,
        next: CaseStatus,
        procedure: ProcedureRef,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.lock()?;
        let case = inner.cases.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if case.status != expected {
            return Ok(false);
        }
        case.procedure = Some(procedure);
        case.status = next;
        Ok(true)
    }

    fn cas_status(
        &self,
        id: &CaseId,
        transition: StatusTransition,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.lock()?;
        let case = inner.cases.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if case.status != transition.expected {
            return Ok(false);
        }

        case.status = transition.next;
        if transition.bump_version {
            case.version += 1;
        }
        if let Some((stamp, at)) = transition.stamp {
            // Lifecycle timestamps are set at most once, never cleared.
            let slot = match stamp {
                LifecycleStamp::Prepared => &mut case.prepared_at,
                LifecycleStamp::Completed => &mut case.completed_at,
                LifecycleStamp::Archived => &mut case.archived_at,
            };
            if slot.is_none() {
                *slot = Some(at);
            }
        }
        Ok(true)
    }

    fn create_snapshot(&self, snapshot: CaseSnapshot) -> Result<CaseSnapshot, RepositoryError> {
        let mut inner = self.lock()?;
        let key = (snapshot.case_id.clone(), snapshot.version);
        if inner.snapshots.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        inner.snapshots.insert(key, snapshot.clone());
        Ok(snapshot)
    }

    fn fetch_snapshot(
        &self,
        id: &CaseId,
        version: u32,
    ) -> Result<Option<CaseSnapshot>, RepositoryError> {
        let inner = self.lock()?;
        Ok(inner.snapshots.get(&(id.clone(), version)).cloned())
    }

    fn list_snapshots(&self, id: &CaseId) -> Result<Vec<CaseSnapshot>, RepositoryError> {
        let inner = self.lock()?;
        let mut snapshots: Vec<CaseSnapshot> = inner
            .snapshots
            .values()
            .filter(|snapshot| &snapshot.case_id == id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.version);
        Ok(snapshots)
    }

    fn fetch_wizard(&self, id: &CaseId) -> Result<Option<WizardProgress>, RepositoryError> {
        let inner = self.lock()?;
        Ok(inner.wizards.get(id).cloned())
    }

    fn upsert_wizard(&self, progress: WizardProgress) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        inner.wizards.insert(progress.case_id.clone(), progress);
        Ok(())
    }
}
