#![allow(clippy::result_large_err)]

use super::document::{DslDocument, Variable, VariableType};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workspace::AppWorkspace;
use crate::utils::serialization::{FileSerializer, FileUtils, JsonSerializer};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;

/// Default value per required start variable, in declaration order.
pub fn default_inputs<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> IndexMap<String, Value> {
    variables
        .into_iter()
        .map(|variable| {
            let value = match &variable.kind {
                Some(VariableType::Number) => Value::from(0),
                Some(VariableType::TextInput) => Value::from(""),
                _ => Value::Null,
            };
            (variable.name.clone(), value)
        })
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputScaffold {
    pub inputs: IndexMap<String, Value>,
    /// Placeholder files created by this run; existing ones are never touched.
    pub created: Vec<PathBuf>,
}

/// Rewrite `test/inputs.json` and create missing `test/inputs/1/<variable>.txt` placeholders.
pub fn write_input_scaffold(
    document: &DslDocument,
    workspace: &AppWorkspace,
) -> Result<InputScaffold, AppError> {
    let required: Vec<&Variable> = document
        .start_node()
        .map(|start| start.required_variables().collect())
        .unwrap_or_default();
    let inputs = default_inputs(required.iter().copied());

    let inputs_file = workspace.inputs_file();
    FileUtils
        .save_to_file(&inputs_file, &inputs, &JsonSerializer)
        .map_err(|e| io_error(format!("Failed to write {}: {}", inputs_file.display(), e)))?;
    tracing::debug!("Wrote {} default inputs to {}", inputs.len(), inputs_file.display());

    let set_dir = workspace.input_set_dir();
    let mut created = Vec::new();
    for variable in &required {
        let placeholder = set_dir.join(format!("{}.txt", variable.name));
        let fresh = FileUtils::touch_if_absent(&placeholder)
            .map_err(|e| io_error(format!("Failed to create {}: {}", placeholder.display(), e)))?;
        if fresh {
            created.push(placeholder);
        }
    }

    Ok(InputScaffold { inputs, created })
}

fn io_error(message: String) -> AppError {
    AppError::new(ErrorCategory::IoError, message)
}
