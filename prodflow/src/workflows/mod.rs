//! Built-in workflow catalog
//!
//! Each workflow is configuration data: an `Inputs` struct describing the
//! invocation surface, and a plan of steps (prompt + output schema), quality
//! gates, and breakpoints consumed by the generic runner. No workflow carries
//! control flow of its own.

use crate::runner::WorkflowPlan;
use crate::schema::Schema;
use anyhow::{bail, Result};
use prodflow_sdk::{FieldSchema, FieldType, FullWorkflowMetadata, WorkflowDefinition};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod governance;
pub mod pmf;
pub mod prd;
pub mod retention;
pub mod roadmap;
pub mod story_map;

/// All built-in workflow plans.
pub fn catalog() -> Vec<WorkflowPlan> {
    vec![
        prd::plan(),
        roadmap::plan(),
        retention::plan(),
        story_map::plan(),
        pmf::plan(),
        governance::plan(),
    ]
}

pub fn find(id: &str) -> Option<WorkflowPlan> {
    catalog().into_iter().find(|p| p.id == id)
}

/// Input field schemas for a workflow id.
pub fn fields(id: &str) -> Option<Vec<FieldSchema>> {
    match id {
        "prd" => Some(prd::Inputs::fields()),
        "roadmap" => Some(roadmap::Inputs::fields()),
        "retention" => Some(retention::Inputs::fields()),
        "story-map" => Some(story_map::Inputs::fields()),
        "pmf" => Some(pmf::Inputs::fields()),
        "governance" => Some(governance::Inputs::fields()),
        _ => None,
    }
}

pub fn metadata(id: &str) -> Option<FullWorkflowMetadata> {
    let metadata = match id {
        "prd" => prd::Inputs::metadata(),
        "roadmap" => roadmap::Inputs::metadata(),
        "retention" => retention::Inputs::metadata(),
        "story-map" => story_map::Inputs::metadata(),
        "pmf" => pmf::Inputs::metadata(),
        "governance" => governance::Inputs::metadata(),
        _ => return None,
    };
    Some(FullWorkflowMetadata {
        metadata,
        fields: fields(id)?,
    })
}

/// Validate raw `--set key=value` inputs against a workflow's field schemas
/// and convert them to typed values. Applies declared defaults, rejects
/// unknown keys, and reports every problem found.
pub fn validate_inputs(
    id: &str,
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Value>> {
    let Some(field_schemas) = fields(id) else {
        bail!("unknown workflow '{}'", id);
    };

    let mut problems = Vec::new();
    let mut inputs = BTreeMap::new();

    for key in raw.keys() {
        if !field_schemas.iter().any(|f| &f.name == key) {
            problems.push(format!("unknown input '{}'", key));
        }
    }

    for field in &field_schemas {
        let value = raw
            .get(&field.name)
            .cloned()
            .or_else(|| field.default.clone());

        let Some(value) = value else {
            if field.required {
                problems.push(format!("missing required input '{}'", field.name));
            }
            continue;
        };

        match &field.field_type {
            FieldType::Number { min, max } => match value.parse::<f64>() {
                Ok(n) => {
                    if let Some(min) = min {
                        if n < *min as f64 {
                            problems.push(format!(
                                "'{}' must be at least {}, got {}",
                                field.name, min, n
                            ));
                            continue;
                        }
                    }
                    if let Some(max) = max {
                        if n > *max as f64 {
                            problems.push(format!(
                                "'{}' must be at most {}, got {}",
                                field.name, max, n
                            ));
                            continue;
                        }
                    }
                    inputs.insert(field.name.clone(), Value::from(n));
                }
                Err(_) => problems.push(format!(
                    "'{}' must be a number, got '{}'",
                    field.name, value
                )),
            },
            FieldType::Select { options } => {
                if options.iter().any(|o| o == &value) {
                    inputs.insert(field.name.clone(), Value::String(value));
                } else {
                    problems.push(format!(
                        "'{}' must be one of [{}], got '{}'",
                        field.name,
                        options.join(", "),
                        value
                    ));
                }
            }
            FieldType::Text | FieldType::FilePath { .. } => {
                inputs.insert(field.name.clone(), Value::String(value));
            }
        }
    }

    if !problems.is_empty() {
        bail!("invalid inputs for '{}': {}", id, problems.join("; "));
    }
    Ok(inputs)
}

/// Schema fragment for the optional `artifacts` array steps use to declare
/// produced documents.
pub(crate) fn artifacts_schema() -> Schema {
    Schema::array(Schema::Object {
        properties: [
            ("path".to_string(), Schema::string()),
            ("format".to_string(), Schema::string()),
            ("label".to_string(), Schema::string()),
            ("language".to_string(), Schema::string()),
        ]
        .into_iter()
        .collect(),
        required: vec!["path".to_string(), "format".to_string()],
        additional: None,
    })
}

/// Schema fragment for assembled documents: a list of named sections.
pub(crate) fn sections_schema(min_sections: usize) -> Schema {
    Schema::array_min(
        Schema::object(
            [("heading", Schema::string()), ("content", Schema::string())],
            &["heading", "content"],
        ),
        min_sections,
    )
}
