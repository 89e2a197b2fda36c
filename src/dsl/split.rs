#![allow(clippy::result_large_err)]

use super::document::DslDocument;
use super::inputs::{write_input_scaffold, InputScaffold};
use super::layout::{safe_name, sidecar_file, turn_file, ArtifactLayout};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workspace::AppWorkspace;
use crate::utils::serialization::{FileSerializer, FileUtils, JsonSerializer};
use std::collections::HashSet;
use std::path::PathBuf;

/// What a split wrote to disk.
#[derive(Debug, Default)]
pub struct SplitReport {
    pub prompt_nodes: usize,
    pub turn_files: Vec<PathBuf>,
    pub sidecars: Vec<PathBuf>,
    pub inputs: InputScaffold,
    /// `(node id, role)` pairs that appeared more than once; the last turn won.
    pub duplicate_roles: Vec<(String, String)>,
}

/// Explode `document` into prompt turn files, per-node sidecars and test input scaffolding.
pub fn split(document: &DslDocument, workspace: &AppWorkspace) -> Result<SplitReport, AppError> {
    let mut report = SplitReport {
        inputs: write_input_scaffold(document, workspace)?,
        ..SplitReport::default()
    };

    let layout = ArtifactLayout::for_document(document);
    let prompts_dir = workspace.prompts_dir();

    for (node_id, llm) in document.prompt_nodes() {
        let Some(name) = layout.name_for(node_id) else {
            continue;
        };
        report.prompt_nodes += 1;

        let mut seen = HashSet::new();
        for turn in llm.turns() {
            let role = safe_name(&turn.role);
            if !seen.insert(role.clone()) {
                tracing::warn!(
                    "Prompt node {} has several '{}' turns, only the last one is kept",
                    node_id,
                    turn.role
                );
                report
                    .duplicate_roles
                    .push((node_id.to_string(), turn.role.clone()));
            }
            let path = turn_file(&prompts_dir, name, &role);
            FileUtils::write_text(&path, &turn.text).map_err(|e| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("Failed to write prompt turn {}: {}", path.display(), e),
                )
            })?;
            if !report.turn_files.contains(&path) {
                report.turn_files.push(path);
            }
        }

        let sidecar = sidecar_file(&prompts_dir, name);
        FileUtils
            .save_to_file(&sidecar, &llm.params, &JsonSerializer)
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::SerializationError,
                    format!("Failed to write node sidecar {}: {}", sidecar.display(), e),
                )
            })?;
        tracing::debug!(
            "Split prompt node {} into '{}' ({} turns)",
            node_id,
            name,
            llm.turns().len()
        );
        report.sidecars.push(sidecar);
    }

    tracing::info!(
        "Split {} prompt nodes into {}",
        report.prompt_nodes,
        prompts_dir.display()
    );
    Ok(report)
}
