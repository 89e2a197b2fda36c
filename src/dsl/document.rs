use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// Field bag for keys this tool does not interpret. Insertion order is kept.
pub type Mapping = IndexMap<String, Value>;

const PROMPT_TEMPLATE_KEY: &str = "prompt_template";
const VARIABLES_KEY: &str = "variables";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to parse DSL document: {0}")]
    Decode(#[source] serde_yaml::Error),
    #[error("failed to serialize DSL document: {0}")]
    Encode(#[source] serde_yaml::Error),
}

impl From<CodecError> for AppError {
    fn from(error: CodecError) -> Self {
        let message = error.to_string();
        AppError::with_source(ErrorCategory::SerializationError, message, Box::new(error))
    }
}

pub fn decode(text: &str) -> Result<DslDocument, CodecError> {
    serde_yaml::from_str(text).map_err(CodecError::Decode)
}

pub fn encode(document: &DslDocument) -> Result<String, CodecError> {
    serde_yaml::to_string(document).map_err(CodecError::Encode)
}

/// Root of an exported application definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppDescriptor>,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
}

impl DslDocument {
    pub fn app_name(&self) -> Option<&str> {
        self.app.as_ref().and_then(|app| app.name.as_deref())
    }

    pub fn nodes(&self) -> &[Node] {
        self.workflow
            .as_ref()
            .map(|workflow| workflow.graph.nodes.as_slice())
            .unwrap_or_default()
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        match self.workflow.as_mut() {
            Some(workflow) => workflow.graph.nodes.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn start_node(&self) -> Option<&StartData> {
        self.nodes().iter().find_map(|node| match &node.data {
            Some(NodeData::Start(start)) => Some(start),
            _ => None,
        })
    }

    /// Prompt nodes in document order, paired with their ids.
    pub fn prompt_nodes(&self) -> impl Iterator<Item = (&str, &LlmData)> {
        self.nodes().iter().filter_map(|node| match &node.data {
            Some(NodeData::Llm(llm)) => Some((node.id.as_str(), llm)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub graph: Graph,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Node {
    pub fn kind(&self) -> Option<&str> {
        self.data.as_ref().and_then(NodeData::kind)
    }
}

/// Node payload, classified by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Mapping", into = "Mapping")]
pub enum NodeData {
    Llm(LlmData),
    Start(StartData),
    Other(Mapping),
}

impl NodeData {
    pub fn params(&self) -> &Mapping {
        match self {
            NodeData::Llm(llm) => &llm.params,
            NodeData::Start(start) => &start.params,
            NodeData::Other(params) => params,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.params().get("type").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.params().get("title").and_then(Value::as_str)
    }
}

impl TryFrom<Mapping> for NodeData {
    type Error = serde_yaml::Error;

    fn try_from(mut params: Mapping) -> Result<Self, Self::Error> {
        let kind = params.get("type").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("llm") => {
                // Completion-style templates are plain strings and stay with the params.
                let prompt_template = match params.get(PROMPT_TEMPLATE_KEY) {
                    Some(Value::Sequence(_)) => params
                        .shift_remove(PROMPT_TEMPLATE_KEY)
                        .map(serde_yaml::from_value)
                        .transpose()?,
                    _ => None,
                };
                Ok(NodeData::Llm(LlmData {
                    params,
                    prompt_template,
                }))
            }
            Some("start") => {
                let variables = match params.get(VARIABLES_KEY) {
                    Some(Value::Sequence(_)) => params
                        .shift_remove(VARIABLES_KEY)
                        .map(serde_yaml::from_value)
                        .transpose()?,
                    _ => None,
                };
                Ok(NodeData::Start(StartData { variables, params }))
            }
            _ => Ok(NodeData::Other(params)),
        }
    }
}

impl From<NodeData> for Mapping {
    fn from(data: NodeData) -> Self {
        match data {
            NodeData::Llm(LlmData {
                mut params,
                prompt_template,
            }) => {
                if let Some(turns) = prompt_template {
                    params.insert(PROMPT_TEMPLATE_KEY.to_string(), to_value(&turns));
                }
                params
            }
            NodeData::Start(StartData {
                variables,
                mut params,
            }) => {
                if let Some(variables) = variables {
                    params.insert(VARIABLES_KEY.to_string(), to_value(&variables));
                }
                params
            }
            NodeData::Other(params) => params,
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    // Model types only contain strings, bools and YAML values, which always serialize.
    serde_yaml::to_value(value).unwrap_or(Value::Null)
}

/// Prompt node payload. `params` holds every key except a sequence-valued
/// `prompt_template`, including `type` and `title`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmData {
    pub params: Mapping,
    pub prompt_template: Option<Vec<PromptTurn>>,
}

impl LlmData {
    pub fn title(&self) -> Option<&str> {
        self.params.get("title").and_then(Value::as_str)
    }

    pub fn turns(&self) -> &[PromptTurn] {
        self.prompt_template.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl PromptTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        PromptTurn {
            role: role.into(),
            text: text.into(),
            extra: Mapping::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartData {
    pub variables: Option<Vec<Variable>>,
    pub params: Mapping,
}

impl StartData {
    pub fn required_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|variable| variable.required == Some(true))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "variable")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VariableType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VariableType {
    TextInput,
    Number,
    Other(String),
}

impl From<String> for VariableType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text-input" => VariableType::TextInput,
            "number" => VariableType::Number,
            _ => VariableType::Other(value),
        }
    }
}

impl From<VariableType> for String {
    fn from(value: VariableType) -> Self {
        match value {
            VariableType::TextInput => "text-input".to_string(),
            VariableType::Number => "number".to_string(),
            VariableType::Other(other) => other,
        }
    }
}
