//! Procedure-driven field validation.
//!
//! The engine checks every configured field against the case's field map and
//! accumulates all findings; it never fails fast, so a single round-trip can
//! report every problem. Cross-field business rules run after the per-field
//! pass and are selected purely by procedure code.

pub(crate) mod rules;

pub use rules::{builtin_rules, BusinessRule, RuleTable};

use std::collections::BTreeMap;

use serde_json::Value;

use super::procedure::{FieldDefinition, FieldType, ProcedureDefinition};
use serde::{Deserialize, Serialize};

/// One validation finding, addressed to a step/field pair so the caller can
/// render a precise message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub step_key: String,
    pub field_key: String,
    pub message: String,
}

/// Outcome of a full validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldIssue>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<FieldIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Stateless validator over a resolved procedure definition.
pub struct ValidationEngine {
    rules: RuleTable,
}

impl ValidationEngine {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    /// Engine carrying the builtin per-procedure rule sets.
    pub fn standard() -> Self {
        Self::new(builtin_rules())
    }

    /// Validate a field map against the procedure. Callers must have
    /// resolved the procedure already; a missing procedure is not this
    /// component's concern.
    pub fn validate(
        &self,
        procedure: &ProcedureDefinition,
        fields: &BTreeMap<String, Value>,
    ) -> ValidationReport {
        let mut errors = Vec::new();

        for step in &procedure.steps {
            for field in &step.fields {
                check_field(step.key.as_str(), field, fields.get(&field.key), &mut errors);
            }
        }

        for rule in self.rules.rules_for(&procedure.code) {
            rule(procedure, fields, &mut errors);
        }

        ValidationReport::from_errors(errors)
    }
}

/// A value counts as present unless it is absent, JSON null, or the empty
/// string.
pub(crate) fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

fn check_field(
    step_key: &str,
    field: &FieldDefinition,
    value: Option<&Value>,
    errors: &mut Vec<FieldIssue>,
) {
    if !is_present(value) {
        if field.required {
            errors.push(FieldIssue {
                step_key: step_key.to_string(),
                field_key: field.key.clone(),
                message: format!("'{}' is required", field.key),
            });
        }
        // No type checks against an absent value.
        return;
    }
    let Some(value) = value else {
        return;
    };
    let mut push = |message: String| {
        errors.push(FieldIssue {
            step_key: step_key.to_string(),
            field_key: field.key.clone(),
            message,
        });
    };

    match field.field_type {
        FieldType::Text => match value.as_str() {
            Some(text) => {
                if let Some(max_length) = field.constraints.max_length {
                    if text.chars().count() > max_length {
                        push(format!(
                            "'{}' exceeds the maximum length of {max_length}",
                            field.key
                        ));
                    }
                }
            }
            None => push(format!("'{}' must be text", field.key)),
        },
        FieldType::Number => {
            if value.is_boolean() {
                // Booleans are rejected outright even where a host type
                // system would treat them as integers.
                push(format!("'{}' must be a number, not a boolean", field.key));
            } else {
                match value.as_f64() {
                    Some(number) => {
                        if let Some(min) = field.constraints.min {
                            if number < min {
                                push(format!("'{}' must be at least {min}", field.key));
                            }
                        }
                        if let Some(max) = field.constraints.max {
                            if number > max {
                                push(format!("'{}' must be at most {max}", field.key));
                            }
                        }
                    }
                    None => push(format!("'{}' must be a number", field.key)),
                }
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                push(format!("'{}' must be a boolean", field.key));
            }
        }
        FieldType::Select => {
            // Membership is only enforced when an option set is configured.
            if let Some(options) = &field.constraints.options {
                let selected = value.as_str().unwrap_or_default();
                if !options.iter().any(|option| option == selected) {
                    push(format!(
                        "'{}' must be one of: {}",
                        field.key,
                        options.join(", ")
                    ));
                }
            }
        }
        FieldType::Country => {
            let code = value.as_str().unwrap_or_default();
            if code.chars().count() != 2 {
                push(format!(
                    "'{}' must be a 2-letter country code",
                    field.key
                ));
            }
        }
        FieldType::Currency => {
            let code = value.as_str().unwrap_or_default();
            if code.chars().count() != 3 {
                push(format!(
                    "'{}' must be a 3-letter currency code",
                    field.key
                ));
            }
        }
    }
}
