#![allow(clippy::result_large_err)]

use super::document::{DslDocument, LlmData, Mapping, NodeData, PromptTurn};
use super::layout::{role_from_file_name, safe_name, sidecar_file, ArtifactLayout};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workspace::AppWorkspace;
use crate::utils::serialization::{FileSerializer, FileUtils, JsonSerializer};
use std::fs;
use std::path::Path;

/// Outcome of folding artifacts back into a document.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Ids of prompt nodes rebuilt from their artifacts.
    pub merged: Vec<String>,
    /// Recovered per-node problems; the affected nodes were left unchanged.
    pub warnings: Vec<AppError>,
}

impl MergeReport {
    pub fn skipped(&self) -> usize {
        self.warnings.len()
    }
}

/// Canonical rank of a turn role: system, user, assistant, then everything else.
fn role_rank(role: &str) -> u8 {
    match role {
        "system" => 0,
        "user" => 1,
        "assistant" => 2,
        _ => 3,
    }
}

/// Rebuild every prompt node of `document` from `prompts/`.
pub fn merge(
    mut document: DslDocument,
    workspace: &AppWorkspace,
) -> Result<(DslDocument, MergeReport), AppError> {
    let layout = ArtifactLayout::for_document(&document);
    let prompts_dir = workspace.prompts_dir();
    let file_names = list_file_names(&prompts_dir)?;
    let mut report = MergeReport::default();

    for node in document.nodes_mut() {
        let Some(NodeData::Llm(llm)) = node.data.as_mut() else {
            continue;
        };
        let Some(name) = layout.name_for(&node.id) else {
            continue;
        };

        let sidecar = sidecar_file(&prompts_dir, name);
        if !sidecar.is_file() {
            let mut warning = AppError::new(
                ErrorCategory::ArtifactError,
                format!(
                    "No sidecar {} for prompt node {}, node left unchanged",
                    sidecar.display(),
                    node.id
                ),
            )
            .with_suggestion("Run `dslsync export` to regenerate the prompt artifacts");
            warning.add_context("node_id", &node.id);
            tracing::warn!("{}", warning.message);
            report.warnings.push(warning);
            continue;
        }

        let params: Mapping = FileUtils
            .load_from_file(&sidecar, &JsonSerializer)
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::SerializationError,
                    format!("Failed to read node sidecar {}: {}", sidecar.display(), e),
                )
            })?;

        let turns = rebuild_turns(&prompts_dir, name, &file_names, llm.turns())?;
        *llm = assemble(params, turns, llm.prompt_template.is_some());
        tracing::debug!(
            "Merged prompt node {} from '{}' ({} turns)",
            node.id,
            name,
            llm.turns().len()
        );
        report.merged.push(node.id.clone());
    }

    tracing::info!(
        "Merged {} prompt nodes, skipped {}",
        report.merged.len(),
        report.skipped()
    );
    Ok((document, report))
}

fn assemble(mut params: Mapping, turns: Vec<PromptTurn>, had_turns: bool) -> LlmData {
    if turns.is_empty() && (params.contains_key("prompt_template") || !had_turns) {
        // Completion-style template lives in the sidecar, or there never were turns.
        return LlmData {
            params,
            prompt_template: None,
        };
    }
    params.shift_remove("prompt_template");
    LlmData {
        params,
        prompt_template: Some(turns),
    }
}

/// Turns read from `<name>.<role>.md` files in canonical role order. Ties keep
/// the role's position in `existing`, then fall back to file name order.
fn rebuild_turns(
    prompts_dir: &Path,
    name: &str,
    file_names: &[String],
    existing: &[PromptTurn],
) -> Result<Vec<PromptTurn>, AppError> {
    let mut found: Vec<(u8, usize, &str, &str)> = file_names
        .iter()
        .filter_map(|file_name| {
            let role = role_from_file_name(name, file_name)?;
            let position = existing
                .iter()
                .position(|turn| safe_name(&turn.role) == role)
                .unwrap_or(usize::MAX);
            Some((role_rank(role), position, file_name.as_str(), role))
        })
        .collect();
    found.sort();

    let mut turns = Vec::with_capacity(found.len());
    for (_, _, file_name, role) in found {
        let path = prompts_dir.join(file_name);
        let text = fs::read_to_string(&path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read prompt turn {}: {}", path.display(), e),
            )
        })?;

        let turn = match existing.iter().rev().find(|turn| safe_name(&turn.role) == role) {
            Some(previous) => PromptTurn {
                role: previous.role.clone(),
                text,
                extra: previous.extra.clone(),
            },
            None => PromptTurn::new(role, text),
        };
        turns.push(turn);
    }
    Ok(turns)
}

fn list_file_names(dir: &Path) -> Result<Vec<String>, AppError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
