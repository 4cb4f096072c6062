use serde::{Deserialize, Serialize};

/// Canonical lifecycle states for a case.
///
/// The legacy wire value `SUBMITTED` is accepted as an alias for `Prepared`
/// during parsing and never emitted, so predicates only ever see one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Draft,
    InProcess,
    Prepared,
    Completed,
    Archived,
}

/// Raised when a raw status string matches neither the canonical values nor
/// the legacy alias.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a recognized case status")]
pub struct InvalidStatus(pub String);

impl InvalidStatus {
    pub const fn code(&self) -> &'static str {
        "INVALID_STATUS"
    }
}

impl CaseStatus {
    /// Parse a wire value, normalizing the legacy `SUBMITTED` alias.
    pub fn parse(raw: &str) -> Result<Self, InvalidStatus> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "IN_PROCESS" => Ok(Self::InProcess),
            "PREPARED" | "SUBMITTED" => Ok(Self::Prepared),
            "COMPLETED" => Ok(Self::Completed),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(InvalidStatus(raw.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InProcess => "IN_PROCESS",
            Self::Prepared => "PREPARED",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Position in the canonical forward order.
    const fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::InProcess => 1,
            Self::Prepared => 2,
            Self::Completed => 3,
            Self::Archived => 4,
        }
    }

    /// Sequential successor in the forward order; `None` once archived.
    pub const fn next_status(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::InProcess),
            Self::InProcess => Some(Self::Prepared),
            Self::Prepared => Some(Self::Completed),
            Self::Completed => Some(Self::Archived),
            Self::Archived => None,
        }
    }

    /// Field upserts are only accepted while drafting or in process.
    pub const fn can_edit_fields(self) -> bool {
        matches!(self, Self::Draft | Self::InProcess)
    }

    pub const fn is_readonly(self) -> bool {
        matches!(self, Self::Prepared | Self::Completed | Self::Archived)
    }

    pub const fn can_submit(self) -> bool {
        matches!(self, Self::InProcess)
    }

    pub const fn can_reopen(self) -> bool {
        matches!(self, Self::Prepared)
    }

    pub const fn can_complete(self) -> bool {
        matches!(self, Self::Prepared)
    }

    /// First bind is a draft-only action; rebinding while in process is
    /// handled by the submission pipeline, not by this machine.
    pub const fn can_bind_procedure(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = InvalidStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

/// Reasons a requested transition is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionDenied {
    #[error("case already holds the requested status")]
    StatusUnchanged,
    #[error("archived cases accept no further transitions")]
    CaseArchived,
    #[error("case status cannot move backwards")]
    RollbackNotAllowed,
    #[error("case status cannot skip intermediate states")]
    SkipNotAllowed,
}

impl TransitionDenied {
    pub const fn code(self) -> &'static str {
        match self {
            Self::StatusUnchanged => "STATUS_UNCHANGED",
            Self::CaseArchived => "CASE_ARCHIVED",
            Self::RollbackNotAllowed => "STATUS_ROLLBACK_NOT_ALLOWED",
            Self::SkipNotAllowed => "STATUS_SKIP_NOT_ALLOWED",
        }
    }
}

/// Pure transition check over the lifecycle graph.
///
/// Forward edges advance one position at a time; the single backward edge is
/// the prepared-to-in-process reopen.
pub fn validate_transition(current: CaseStatus, target: CaseStatus) -> Result<(), TransitionDenied> {
    if current == target {
        return Err(TransitionDenied::StatusUnchanged);
    }
    if current == CaseStatus::Archived {
        return Err(TransitionDenied::CaseArchived);
    }
    if current == CaseStatus::Prepared && target == CaseStatus::InProcess {
        return Ok(());
    }
    if target.ordinal() < current.ordinal() {
        return Err(TransitionDenied::RollbackNotAllowed);
    }
    if target.ordinal() > current.ordinal() + 1 {
        return Err(TransitionDenied::SkipNotAllowed);
    }
    Ok(())
}

/// Access level granted to the step wizard for a given case state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAccess {
    ReadWrite,
    ReadOnly,
}

/// Raised when the wizard is opened before any procedure is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no procedure selected for this case")]
pub struct NoProcedureSelected;

impl NoProcedureSelected {
    pub const fn code(self) -> &'static str {
        "NO_PROCEDURE_SELECTED"
    }
}

/// Whether the wizard may be opened, and in which mode.
pub fn wizard_access(
    status: CaseStatus,
    has_procedure: bool,
) -> Result<WizardAccess, NoProcedureSelected> {
    if !has_procedure {
        return Err(NoProcedureSelected);
    }
    if status.is_readonly() {
        Ok(WizardAccess::ReadOnly)
    } else {
        Ok(WizardAccess::ReadWrite)
    }
}
