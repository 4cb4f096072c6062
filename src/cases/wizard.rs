use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::CaseId;
use super::procedure::ProcedureDefinition;

/// Per-case record of wizard step completion.
///
/// One row per case. Reopening a case resets the derived completion flag but
/// keeps the completed-step set, so navigation history survives a reopen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardProgress {
    pub case_id: CaseId,
    pub completed_steps: BTreeSet<String>,
    pub is_completed: bool,
}

impl WizardProgress {
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            completed_steps: BTreeSet::new(),
            is_completed: false,
        }
    }

    pub fn mark_step(&mut self, step_key: &str) {
        self.completed_steps.insert(step_key.to_string());
    }

    /// Every configured non-review step is completed and the review step has
    /// been explicitly marked.
    pub fn satisfies(&self, procedure: &ProcedureDefinition) -> bool {
        let steps_done = procedure
            .non_review_steps()
            .all(|step| self.completed_steps.contains(&step.key));
        steps_done && self.completed_steps.contains(procedure.review_step_key())
    }

    /// Configured non-review steps absent from the completed set, in
    /// configured order.
    pub fn missing_steps(&self, procedure: &ProcedureDefinition) -> Vec<String> {
        procedure
            .non_review_steps()
            .filter(|step| !self.completed_steps.contains(&step.key))
            .map(|step| step.key.clone())
            .collect()
    }

    /// Recompute the derived flag from the configured steps.
    pub fn refresh_completion(&mut self, procedure: &ProcedureDefinition) {
        self.is_completed = self.satisfies(procedure);
    }

    /// Clear the derived flag without touching the completed-step set.
    pub fn reset_completion(&mut self) {
        self.is_completed = false;
    }
}

/// Advisory navigation entry for one configured step. The authoritative
/// required-field source of truth stays with the validation engine.
#[derive(Debug, Clone, Serialize)]
pub struct StepPlanEntry {
    pub key: String,
    pub title: String,
    pub required_field_keys: Vec<String>,
    pub completed: bool,
    pub review: bool,
}

/// Navigation plan for the wizard UI, derived from the procedure
/// configuration and the case's progress.
pub fn step_plan(procedure: &ProcedureDefinition, progress: &WizardProgress) -> Vec<StepPlanEntry> {
    let review_key = procedure.review_step_key().to_string();
    procedure
        .steps
        .iter()
        .map(|step| StepPlanEntry {
            key: step.key.clone(),
            title: step.title.clone(),
            required_field_keys: step
                .fields
                .iter()
                .filter(|field| field.required)
                .map(|field| field.key.clone())
                .collect(),
            completed: progress.completed_steps.contains(&step.key),
            review: step.key == review_key,
        })
        .collect()
}
