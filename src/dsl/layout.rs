use super::document::{DslDocument, LlmData};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static UNSAFE_RUN: OnceLock<Regex> = OnceLock::new();

/// Filesystem-safe form of a node title: every run of characters other than
/// ASCII alphanumerics, `_`, `-` and CJK ideographs collapses to one `_`.
pub fn safe_name(raw: &str) -> String {
    let pattern = UNSAFE_RUN.get_or_init(|| {
        Regex::new(r"[^0-9A-Za-z_\x{4E00}-\x{9FA5}\-]+").expect("safe-name pattern is valid")
    });
    pattern.replace_all(raw, "_").into_owned()
}

/// Base artifact name for a prompt node: its title, or `llm_<id>` when untitled.
pub fn base_name(node_id: &str, llm: &LlmData) -> String {
    match llm.title().map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => safe_name(title),
        None => safe_name(&format!("llm_{}", node_id)),
    }
}

/// Maps prompt node ids to the artifact names used under `prompts/`.
///
/// Names are derived from the document alone, so split and merge always agree.
/// Nodes whose base names collide all get `_<id>` appended, repeated until
/// every name is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactLayout {
    names: IndexMap<String, String>,
}

impl ArtifactLayout {
    pub fn for_document(document: &DslDocument) -> Self {
        let bases: Vec<(String, String)> = document
            .prompt_nodes()
            .map(|(id, llm)| (id.to_string(), base_name(id, llm)))
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, base) in &bases {
            *counts.entry(base.as_str()).or_default() += 1;
        }

        let mut names = IndexMap::new();
        let mut taken: HashSet<String> = HashSet::new();
        for (id, base) in &bases {
            let mut name = if counts[base.as_str()] > 1 {
                format!("{}_{}", base, safe_name(id))
            } else {
                base.clone()
            };
            // A suffixed name can still match another node's plain title.
            while taken.contains(&name) {
                name = format!("{}_{}", name, safe_name(id));
            }
            if name != *base {
                tracing::warn!(
                    "Prompt node title '{}' is shared by several nodes, node {} uses '{}'",
                    base,
                    id,
                    name
                );
            }
            taken.insert(name.clone());
            names.insert(id.clone(), name);
        }
        ArtifactLayout { names }
    }

    pub fn name_for(&self, node_id: &str) -> Option<&str> {
        self.names.get(node_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// `prompts/<name>.<role>.md`
pub fn turn_file(prompts_dir: &Path, name: &str, role: &str) -> PathBuf {
    prompts_dir.join(format!("{}.{}.md", name, role))
}

/// `prompts/<name>.json`
pub fn sidecar_file(prompts_dir: &Path, name: &str) -> PathBuf {
    prompts_dir.join(format!("{}.json", name))
}

/// Role segment of a turn file belonging to `name`, if `file_name` is one.
pub fn role_from_file_name<'a>(name: &str, file_name: &'a str) -> Option<&'a str> {
    let role = file_name
        .strip_prefix(name)?
        .strip_prefix('.')?
        .strip_suffix(".md")?;
    if role.is_empty() || role.contains('.') {
        return None;
    }
    Some(role)
}
