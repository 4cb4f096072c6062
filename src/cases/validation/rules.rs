//! Cross-field business rules, dispatched by procedure code.
//!
//! New procedures register a rule set without touching the generic engine:
//! the table is data, not a branching chain.

use std::collections::BTreeMap;

use serde_json::Value;

use super::super::procedure::ProcedureDefinition;
use super::{is_present, FieldIssue};

/// A rule inspects the whole field map and appends findings.
pub type BusinessRule = fn(&ProcedureDefinition, &BTreeMap<String, Value>, &mut Vec<FieldIssue>);

/// Dispatch table keyed by procedure code.
#[derive(Default)]
pub struct RuleTable {
    entries: BTreeMap<String, Vec<BusinessRule>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: &str, rule: BusinessRule) {
        self.entries.entry(code.to_string()).or_default().push(rule);
    }

    /// Rules for a code; unknown codes simply have no rule set.
    pub fn rules_for(&self, code: &str) -> &[BusinessRule] {
        self.entries
            .get(code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// The jurisdiction declarations are filed in. Import procedures require the
/// origin outside and the destination inside; export procedures the reverse.
pub(crate) const DECLARING_JURISDICTION: &str = "DE";

pub(crate) const ALLOWED_GOODS_CATEGORIES: [&str; 6] = [
    "AGRICULTURE",
    "CHEMICALS",
    "ELECTRONICS",
    "MACHINERY",
    "TEXTILES",
    "OTHER",
];

/// Rule sets for the builtin declaration procedures.
pub fn builtin_rules() -> RuleTable {
    let mut table = RuleTable::new();

    table.register("import_declaration", positive_declared_value);
    table.register("import_declaration", import_direction);
    table.register("import_declaration", commercial_requires_remarks);
    table.register("import_declaration", allowed_goods_category);

    table.register("export_declaration", positive_declared_value);
    table.register("export_declaration", export_direction);
    table.register("export_declaration", commercial_requires_remarks);
    table.register("export_declaration", allowed_goods_category);

    table
}

fn issue(
    procedure: &ProcedureDefinition,
    field_key: &str,
    message: String,
    errors: &mut Vec<FieldIssue>,
) {
    let step_key = procedure
        .step_for_field(field_key)
        .map(|step| step.key.clone())
        .unwrap_or_default();
    errors.push(FieldIssue {
        step_key,
        field_key: field_key.to_string(),
        message,
    });
}

fn country_value<'a>(fields: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
}

/// Monetary amounts must be strictly positive once supplied.
fn positive_declared_value(
    procedure: &ProcedureDefinition,
    fields: &BTreeMap<String, Value>,
    errors: &mut Vec<FieldIssue>,
) {
    if let Some(amount) = fields.get("declared_value").and_then(Value::as_f64) {
        if amount <= 0.0 {
            issue(
                procedure,
                "declared_value",
                "'declared_value' must be greater than zero".to_string(),
                errors,
            );
        }
    }
}

fn import_direction(
    procedure: &ProcedureDefinition,
    fields: &BTreeMap<String, Value>,
    errors: &mut Vec<FieldIssue>,
) {
    if let Some(origin) = country_value(fields, "origin_country") {
        if origin.eq_ignore_ascii_case(DECLARING_JURISDICTION) {
            issue(
                procedure,
                "origin_country",
                format!(
                    "'origin_country' must lie outside the import jurisdiction {DECLARING_JURISDICTION}"
                ),
                errors,
            );
        }
    }
    if let Some(destination) = country_value(fields, "destination_country") {
        if !destination.eq_ignore_ascii_case(DECLARING_JURISDICTION) {
            issue(
                procedure,
                "destination_country",
                format!(
                    "'destination_country' must equal the import jurisdiction {DECLARING_JURISDICTION}"
                ),
                errors,
            );
        }
    }
}

fn export_direction(
    procedure: &ProcedureDefinition,
    fields: &BTreeMap<String, Value>,
    errors: &mut Vec<FieldIssue>,
) {
    if let Some(origin) = country_value(fields, "origin_country") {
        if !origin.eq_ignore_ascii_case(DECLARING_JURISDICTION) {
            issue(
                procedure,
                "origin_country",
                format!(
                    "'origin_country' must equal the export jurisdiction {DECLARING_JURISDICTION}"
                ),
                errors,
            );
        }
    }
    if let Some(destination) = country_value(fields, "destination_country") {
        if destination.eq_ignore_ascii_case(DECLARING_JURISDICTION) {
            issue(
                procedure,
                "destination_country",
                format!(
                    "'destination_country' must lie outside the export jurisdiction {DECLARING_JURISDICTION}"
                ),
                errors,
            );
        }
    }
}

/// A commercial shipment makes the otherwise-optional remarks mandatory.
fn commercial_requires_remarks(
    procedure: &ProcedureDefinition,
    fields: &BTreeMap<String, Value>,
    errors: &mut Vec<FieldIssue>,
) {
    let commercial = matches!(fields.get("commercial_goods"), Some(Value::Bool(true)));
    if commercial && !is_present(fields.get("remarks")) {
        issue(
            procedure,
            "remarks",
            "'remarks' are required for commercial shipments".to_string(),
            errors,
        );
    }
}

fn allowed_goods_category(
    procedure: &ProcedureDefinition,
    fields: &BTreeMap<String, Value>,
    errors: &mut Vec<FieldIssue>,
) {
    if let Some(category) = fields.get("goods_category").and_then(Value::as_str) {
        if !category.is_empty()
            && !ALLOWED_GOODS_CATEGORIES
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(category))
        {
            issue(
                procedure,
                "goods_category",
                format!(
                    "'goods_category' must be one of: {}",
                    ALLOWED_GOODS_CATEGORIES.join(", ")
                ),
                errors,
            );
        }
    }
}
