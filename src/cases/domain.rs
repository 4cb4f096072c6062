use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::procedure::ProcedureRef;
use super::status::CaseStatus;
use super::validation::ValidationReport;

/// Identifier wrapper for owning tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identifier wrapper for cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub String);

/// A tenant-owned unit of work progressing through the lifecycle.
///
/// The owning tenant is immutable once set; the status only moves through
/// the state machine; the version only moves forward. Cases are never
/// hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub tenant_id: TenantId,
    pub title: String,
    pub status: CaseStatus,
    pub version: u32,
    pub procedure: Option<ProcedureRef>,
    pub fields: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Case {
    pub fn new(id: CaseId, tenant_id: TenantId, title: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            tenant_id,
            title,
            status: CaseStatus::Draft,
            version: 1,
            procedure: None,
            fields: BTreeMap::new(),
            created_at,
            prepared_at: None,
            completed_at: None,
            archived_at: None,
        }
    }

    pub fn has_procedure(&self) -> bool {
        self.procedure.is_some()
    }

    /// Sanitized representation for API responses.
    pub fn view(&self) -> CaseView {
        CaseView {
            case_id: self.id.clone(),
            title: self.title.clone(),
            status: self.status.label(),
            version: self.version,
            procedure: self.procedure.clone(),
            created_at: self.created_at,
            prepared_at: self.prepared_at,
            completed_at: self.completed_at,
            archived_at: self.archived_at,
        }
    }
}

/// Immutable capture of a case's fields and validation outcome at a specific
/// version, created at submission. At most one snapshot exists per
/// (case, version) pair and it is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_id: CaseId,
    pub version: u32,
    pub procedure: ProcedureRef,
    pub fields: BTreeMap<String, Value>,
    pub validation: ValidationReport,
    pub created_at: DateTime<Utc>,
}

/// Case details exposed to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    pub case_id: CaseId,
    pub title: String,
    pub status: &'static str,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<ProcedureRef>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}
