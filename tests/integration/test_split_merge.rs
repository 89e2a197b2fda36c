use dslsync::core::{AppWorkspace, ErrorCategory};
use dslsync::dsl::{self, DslDocument, NodeData};
use std::fs;
use tempfile::TempDir;

const SUPPORT_BOT: &str = r#"
app:
  description: Answers product questions
  mode: advanced-chat
  name: support-bot
kind: app
version: 0.1.5
workflow:
  conversation_variables: []
  graph:
    edges:
    - id: 1-2
      source: '1'
      target: '2'
    nodes:
    - id: '1'
      type: custom
      data:
        type: start
        title: Start
        variables:
        - variable: q
          label: Question
          type: text-input
          required: true
        - variable: n
          label: Count
          type: number
          required: true
        - variable: lang
          type: select
          required: false
          options: [en, zh]
    - id: '2'
      type: custom
      data:
        type: llm
        title: Draft answer
        model:
          provider: openai
          name: gpt-4o
          completion_params:
            temperature: 0.2
        context:
          enabled: false
        prompt_template:
        - id: sys-1
          role: system
          text: |
            You answer questions about the product.
            Keep answers under {{#1.n#}} sentences.
        - id: usr-1
          role: user
          text: '{{#1.q#}}'
        - id: ast-1
          role: assistant
          text: Understood.
    - id: '3'
      type: custom
      data:
        type: llm
        title: 翻译 结果
        prompt_template:
        - role: system
          text: 翻译成中文
    - id: '4'
      type: custom
      data:
        type: answer
        title: Answer
        answer: '{{#2.text#}}'
"#;

fn prompt_turns(document: &DslDocument, node_id: &str) -> Vec<(String, String)> {
    document
        .prompt_nodes()
        .find(|(id, _)| *id == node_id)
        .map(|(_, llm)| {
            llm.turns()
                .iter()
                .map(|turn| (turn.role.clone(), turn.text.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_split_then_merge_reproduces_document() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(SUPPORT_BOT).unwrap();

    let report = dsl::split(&document, &workspace).unwrap();
    assert_eq!(report.prompt_nodes, 2);
    assert_eq!(report.turn_files.len(), 4);

    let (merged, merge_report) = dsl::merge(document.clone(), &workspace).unwrap();
    assert!(merge_report.warnings.is_empty());
    assert_eq!(merged, document);

    // Also holds after a trip through the serialized form.
    let reparsed = dsl::decode(&dsl::encode(&merged).unwrap()).unwrap();
    assert_eq!(reparsed, document);
}

#[test]
fn test_artifact_set_layout() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(SUPPORT_BOT).unwrap();
    dsl::split(&document, &workspace).unwrap();

    let prompts = workspace.prompts_dir();
    for file in [
        "Draft_answer.system.md",
        "Draft_answer.user.md",
        "Draft_answer.assistant.md",
        "Draft_answer.json",
        "翻译_结果.system.md",
        "翻译_结果.json",
    ] {
        assert!(prompts.join(file).is_file(), "missing {}", file);
    }
    assert_eq!(
        fs::read_to_string(prompts.join("Draft_answer.system.md")).unwrap(),
        "You answer questions about the product.\nKeep answers under {{#1.n#}} sentences.\n"
    );
}

#[test]
fn test_default_inputs_and_placeholders() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let existing = workspace.input_set_dir().join("q.txt");
    fs::create_dir_all(workspace.input_set_dir()).unwrap();
    fs::write(&existing, "How do I reset my password?").unwrap();

    let document = dsl::decode(SUPPORT_BOT).unwrap();
    dsl::split(&document, &workspace).unwrap();

    let raw = fs::read_to_string(workspace.inputs_file()).unwrap();
    assert_eq!(raw, "{\n  \"q\": \"\",\n  \"n\": 0\n}");
    let inputs: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(inputs, serde_json::json!({"q": "", "n": 0}));

    assert_eq!(
        fs::read_to_string(&existing).unwrap(),
        "How do I reset my password?"
    );
    assert_eq!(
        fs::read_to_string(workspace.input_set_dir().join("n.txt")).unwrap(),
        ""
    );
    assert!(!workspace.input_set_dir().join("lang.txt").exists());
}

#[test]
fn test_merge_orders_turns_canonically() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(SUPPORT_BOT).unwrap();
    dsl::split(&document, &workspace).unwrap();

    let prompts = workspace.prompts_dir();
    fs::write(prompts.join("Draft_answer.tool.md"), "lookup()").unwrap();
    fs::write(prompts.join("Draft_answer.assistant.md"), "Sure thing.").unwrap();

    let (merged, _) = dsl::merge(document, &workspace).unwrap();
    let turns = prompt_turns(&merged, "2");
    let roles: Vec<_> = turns.iter().map(|(role, _)| role.as_str()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
    assert_eq!(turns[2].1, "Sure thing.");
}

#[test]
fn test_merge_reorders_out_of_order_document() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(
        r#"
workflow:
  graph:
    nodes:
    - id: '7'
      data:
        type: llm
        title: Reversed
        prompt_template:
        - {role: user, text: question}
        - {role: system, text: rules}
"#,
    )
    .unwrap();
    dsl::split(&document, &workspace).unwrap();

    let (merged, _) = dsl::merge(document, &workspace).unwrap();
    let turns = prompt_turns(&merged, "7");
    assert_eq!(
        turns,
        vec![
            ("system".to_string(), "rules".to_string()),
            ("user".to_string(), "question".to_string()),
        ]
    );
}

#[test]
fn test_sidecar_edits_are_applied() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(SUPPORT_BOT).unwrap();
    dsl::split(&document, &workspace).unwrap();

    let sidecar_path = workspace.prompts_dir().join("Draft_answer.json");
    let mut sidecar: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&sidecar_path).unwrap()).unwrap();
    sidecar["model"]["name"] = serde_json::json!("gpt-4o-mini");
    fs::write(&sidecar_path, serde_json::to_string_pretty(&sidecar).unwrap()).unwrap();

    let (merged, _) = dsl::merge(document, &workspace).unwrap();
    let node = merged.nodes().iter().find(|node| node.id == "2").unwrap();
    let Some(NodeData::Llm(llm)) = &node.data else {
        panic!("node 2 should stay a prompt node");
    };
    let model = llm.params.get("model").unwrap();
    assert_eq!(model.get("name").and_then(|v| v.as_str()), Some("gpt-4o-mini"));
    assert_eq!(llm.turns().len(), 3);
}

#[test]
fn test_missing_sidecar_is_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(SUPPORT_BOT).unwrap();
    dsl::split(&document, &workspace).unwrap();
    fs::remove_file(workspace.prompts_dir().join("翻译_结果.json")).unwrap();
    fs::write(workspace.prompts_dir().join("Draft_answer.user.md"), "edited").unwrap();

    let (merged, report) = dsl::merge(document.clone(), &workspace).unwrap();
    assert_eq!(report.merged, vec!["2"]);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.warnings[0].category, ErrorCategory::ArtifactError);

    assert_eq!(prompt_turns(&merged, "3"), prompt_turns(&document, "3"));
    assert_eq!(prompt_turns(&merged, "2")[1].1, "edited");
}

#[test]
fn test_duplicate_titles_get_distinct_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = AppWorkspace::new(temp_dir.path());
    let document = dsl::decode(
        r#"
workflow:
  graph:
    nodes:
    - id: 'a'
      data:
        type: llm
        title: Summarize
        prompt_template: [{role: system, text: first}]
    - id: 'b'
      data:
        type: llm
        title: Summarize
        prompt_template: [{role: system, text: second}]
"#,
    )
    .unwrap();

    dsl::split(&document, &workspace).unwrap();
    let prompts = workspace.prompts_dir();
    assert_eq!(
        fs::read_to_string(prompts.join("Summarize_a.system.md")).unwrap(),
        "first"
    );
    assert_eq!(
        fs::read_to_string(prompts.join("Summarize_b.system.md")).unwrap(),
        "second"
    );

    let (merged, _) = dsl::merge(document.clone(), &workspace).unwrap();
    assert_eq!(merged, document);
}
