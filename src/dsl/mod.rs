//! DSL document model and the split/merge transform between a document and
//! its editable artifact set.

pub mod document;
pub mod inputs;
pub mod layout;
pub mod merge;
pub mod split;

pub use document::{
    decode, encode, CodecError, DslDocument, LlmData, Node, NodeData, PromptTurn, StartData,
    Variable, VariableType,
};
pub use inputs::{default_inputs, write_input_scaffold, InputScaffold};
pub use layout::{safe_name, ArtifactLayout};
pub use merge::{merge, MergeReport};
pub use split::{split, SplitReport};
