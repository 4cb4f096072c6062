use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Value type a configured field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Select,
    Country,
    Currency,
}

/// Constraint bag attached to a field definition. All knobs are optional;
/// absent knobs are simply not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    pub options: Option<Vec<String>>,
}

impl FieldConstraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::default()
        }
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    pub fn options<I: IntoIterator<Item = &'static str>>(options: I) -> Self {
        Self {
            options: Some(options.into_iter().map(str::to_string).collect()),
            ..Self::default()
        }
    }
}

/// A single configured field within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub field_type: FieldType,
    pub required: bool,
    pub constraints: FieldConstraints,
}

impl FieldDefinition {
    fn new(key: &str, field_type: FieldType, required: bool, constraints: FieldConstraints) -> Self {
        Self {
            key: key.to_string(),
            field_type,
            required,
            constraints,
        }
    }
}

/// Ordered group of fields presented as one wizard step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub key: String,
    pub title: String,
    pub fields: Vec<FieldDefinition>,
}

impl StepDefinition {
    fn new(key: &str, title: &str, fields: Vec<FieldDefinition>) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            fields,
        }
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.key.as_str())
    }
}

/// Identity of a published procedure a case can bind to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcedureRef {
    pub code: String,
    pub version: u32,
}

/// Versioned, immutable-once-published schema of steps and fields.
///
/// The terminal step is by convention the review step: it carries no fields
/// and must be explicitly confirmed before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    pub code: String,
    pub version: u32,
    pub title: String,
    pub steps: Vec<StepDefinition>,
}

impl ProcedureDefinition {
    pub fn reference(&self) -> ProcedureRef {
        ProcedureRef {
            code: self.code.clone(),
            version: self.version,
        }
    }

    /// All fields across all steps, in configured order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.steps.iter().flat_map(|step| step.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields().find(|field| field.key == key)
    }

    /// Step that owns the given field key.
    pub fn step_for_field(&self, key: &str) -> Option<&StepDefinition> {
        self.steps
            .iter()
            .find(|step| step.fields.iter().any(|field| field.key == key))
    }

    /// The terminal review step key.
    pub fn review_step_key(&self) -> &str {
        self.steps
            .last()
            .map(|step| step.key.as_str())
            .unwrap_or_default()
    }

    /// Configured steps excluding the terminal review step, in order.
    pub fn non_review_steps(&self) -> impl Iterator<Item = &StepDefinition> {
        let count = self.steps.len().saturating_sub(1);
        self.steps.iter().take(count)
    }
}

/// Lookup failure for a procedure code/version pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("procedure '{code}' (version {version:?}) is not published")]
    ProcedureNotFound { code: String, version: Option<u32> },
}

impl RegistryError {
    pub const fn code(&self) -> &'static str {
        "PROCEDURE_NOT_FOUND"
    }
}

/// Resolves published procedure definitions.
///
/// Injected into the case service so the validation path carries no global
/// loader state.
pub trait ProcedureRegistry: Send + Sync {
    /// Resolve by code; `None` selects the active (highest published) version.
    fn resolve(
        &self,
        code: &str,
        version: Option<u32>,
    ) -> Result<Arc<ProcedureDefinition>, RegistryError>;
}

/// In-memory registry over a fixed set of published definitions.
#[derive(Debug, Default)]
pub struct BuiltinProcedures {
    published: Vec<Arc<ProcedureDefinition>>,
}

impl BuiltinProcedures {
    /// Registry holding the standard import/export declaration procedures.
    pub fn standard() -> Self {
        Self {
            published: vec![
                Arc::new(import_declaration_v1()),
                Arc::new(export_declaration_v1()),
            ],
        }
    }

    pub fn with_published(published: Vec<Arc<ProcedureDefinition>>) -> Self {
        Self { published }
    }

    pub fn codes(&self) -> Vec<&str> {
        self.published
            .iter()
            .map(|definition| definition.code.as_str())
            .collect()
    }
}

impl ProcedureRegistry for BuiltinProcedures {
    fn resolve(
        &self,
        code: &str,
        version: Option<u32>,
    ) -> Result<Arc<ProcedureDefinition>, RegistryError> {
        let mut candidates: Vec<&Arc<ProcedureDefinition>> = self
            .published
            .iter()
            .filter(|definition| definition.code == code)
            .collect();
        candidates.sort_by_key(|definition| definition.version);

        let found = match version {
            Some(version) => candidates
                .into_iter()
                .find(|definition| definition.version == version),
            None => candidates.into_iter().last(),
        };

        found
            .cloned()
            .ok_or_else(|| RegistryError::ProcedureNotFound {
                code: code.to_string(),
                version,
            })
    }
}

fn declaration_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(
            "goods",
            "Goods",
            vec![
                FieldDefinition::new(
                    "goods_description",
                    FieldType::Text,
                    true,
                    FieldConstraints::length(500),
                ),
                FieldDefinition::new(
                    "goods_category",
                    FieldType::Select,
                    true,
                    FieldConstraints::none(),
                ),
                FieldDefinition::new(
                    "declared_value",
                    FieldType::Number,
                    true,
                    FieldConstraints::range(None, Some(1_000_000_000.0)),
                ),
                FieldDefinition::new(
                    "declared_currency",
                    FieldType::Currency,
                    true,
                    FieldConstraints::none(),
                ),
                FieldDefinition::new(
                    "commercial_goods",
                    FieldType::Boolean,
                    true,
                    FieldConstraints::none(),
                ),
                FieldDefinition::new(
                    "remarks",
                    FieldType::Text,
                    false,
                    FieldConstraints::length(1000),
                ),
            ],
        ),
        StepDefinition::new(
            "parties",
            "Parties",
            vec![
                FieldDefinition::new(
                    "sender_name",
                    FieldType::Text,
                    true,
                    FieldConstraints::length(200),
                ),
                FieldDefinition::new(
                    "recipient_name",
                    FieldType::Text,
                    true,
                    FieldConstraints::length(200),
                ),
                FieldDefinition::new(
                    "origin_country",
                    FieldType::Country,
                    true,
                    FieldConstraints::none(),
                ),
                FieldDefinition::new(
                    "destination_country",
                    FieldType::Country,
                    true,
                    FieldConstraints::none(),
                ),
            ],
        ),
        StepDefinition::new(
            "transport",
            "Transport",
            vec![
                FieldDefinition::new(
                    "transport_mode",
                    FieldType::Select,
                    true,
                    FieldConstraints::options(["AIR", "SEA", "ROAD", "RAIL"]),
                ),
                FieldDefinition::new(
                    "package_count",
                    FieldType::Number,
                    true,
                    FieldConstraints::range(Some(1.0), Some(10_000.0)),
                ),
            ],
        ),
        StepDefinition::new("review", "Review & Submit", Vec::new()),
    ]
}

fn import_declaration_v1() -> ProcedureDefinition {
    ProcedureDefinition {
        code: "import_declaration".to_string(),
        version: 1,
        title: "Import Declaration".to_string(),
        steps: declaration_steps(),
    }
}

fn export_declaration_v1() -> ProcedureDefinition {
    ProcedureDefinition {
        code: "export_declaration".to_string(),
        version: 1,
        title: "Export Declaration".to_string(),
        steps: declaration_steps(),
    }
}
