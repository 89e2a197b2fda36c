use dslsync::console::ConsoleClient;
use dslsync::core::config::{AppConfig, GuardConfig};
use dslsync::core::{AppWorkspace, ErrorCategory, SyncStage};
use dslsync::credentials::{Credential, CredentialManager, CredentialSource};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use dslsync::sync::SyncDriver;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPORTED: &str = r#"app:
  name: support-bot
  mode: advanced-chat
kind: app
version: 0.1.5
workflow:
  graph:
    edges: []
    nodes:
    - id: '1'
      data:
        type: start
        title: Start
        variables:
        - variable: q
          type: text-input
          required: true
    - id: '2'
      data:
        type: llm
        title: Answer
        model:
          provider: openai
          name: gpt-4o
        prompt_template:
        - id: s1
          role: system
          text: Be helpful.
        - id: u1
          role: user
          text: '{{#1.q#}}'
"#;

/// Browser with a fixed logged-in session.
struct LoggedInBrowser {
    extractions: Arc<AtomicUsize>,
}

impl CredentialSource for LoggedInBrowser {
    fn extract(&self) -> Option<Credential> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        Credential::new("session-1", "refresh-1")
    }
}

fn driver(server: &MockServer, workspace_root: &Path) -> (SyncDriver, Arc<AtomicUsize>) {
    let extractions = Arc::new(AtomicUsize::new(0));
    let browser = LoggedInBrowser {
        extractions: extractions.clone(),
    };
    let manager = CredentialManager::new(
        Box::new(browser),
        workspace_root.join(".token_cache.json"),
    );
    let client = ConsoleClient::new(server.uri(), manager);
    (SyncDriver::new(client, GuardConfig::default()), extractions)
}

fn app_dir(root: &Path, folder: &str, app_config: &str) -> AppWorkspace {
    let dir = root.join(folder);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.json"), app_config).unwrap();
    AppWorkspace::new(dir)
}

async fn mount_export(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/apps/app-1/export"))
        .and(query_param("include_secret", "false"))
        .and(header("authorization", "Bearer session-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": EXPORTED })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_update_of_protected_app_makes_no_requests() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(temp_dir.path(), "bot-PRODUCTION-42", r#"{"app_id": "app-1"}"#);
    let (mut driver, extractions) = driver(&server, temp_dir.path());

    let error = driver.update(&app).await.unwrap_err();

    assert_eq!(error.category, ErrorCategory::GuardError);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(extractions.load(Ordering::SeqCst), 0);
    assert_eq!(driver.stage(), SyncStage::Idle);
}

#[tokio::test]
async fn test_protected_app_reached_through_parent_component_is_refused() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let protected = app_dir(temp_dir.path(), "bot-PRODUCTION-42", r#"{"app_id": "app-1"}"#);
    fs::create_dir_all(protected.root().join("prompts")).unwrap();
    let app = AppWorkspace::new(protected.root().join("prompts").join(".."));
    let (mut driver, extractions) = driver(&server, temp_dir.path());

    let error = driver.update(&app).await.unwrap_err();

    assert_eq!(error.category, ErrorCategory::GuardError);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(extractions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_export_writes_artifact_set() {
    let server = MockServer::start().await;
    mount_export(&server).await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1/api-keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "k1", "token": "app-key-1"}, {"id": "k2", "token": "app-key-2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(temp_dir.path(), "support-bot-TEST-app-1", r#"{"app_id": "app-1"}"#);
    let (mut driver, _) = driver(&server, temp_dir.path());

    let summary = driver.export(&app).await.unwrap();

    assert_eq!(summary.app_id, "app-1");
    assert_eq!(summary.app_name.as_deref(), Some("support-bot"));
    assert!(summary.api_key_saved);
    assert_eq!(driver.stage(), SyncStage::Idle);

    assert_eq!(fs::read_to_string(app.dsl_file()).unwrap(), EXPORTED);
    assert_eq!(
        fs::read_to_string(app.prompts_dir().join("Answer.system.md")).unwrap(),
        "Be helpful."
    );
    assert!(app.prompts_dir().join("Answer.json").is_file());
    assert!(app.input_set_dir().join("q.txt").is_file());

    let config = AppConfig::load(app.config_file()).unwrap();
    assert_eq!(config.test_api_key, "app-key-1");
}

#[tokio::test]
async fn test_export_fills_api_key_in_legacy_config() {
    let server = MockServer::start().await;
    mount_export(&server).await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1/api-keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "k1", "token": "app-key-1"}]
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(
        temp_dir.path(),
        "support-bot-TEST-app-1",
        r#"{"APP_ID": "app-1", "TEST_API_KEY": "", "NOTE": "owned by the QA team"}"#,
    );
    let (mut driver, _) = driver(&server, temp_dir.path());

    assert!(driver.export(&app).await.unwrap().api_key_saved);

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(app.config_file()).unwrap()).unwrap();
    assert_eq!(
        saved,
        serde_json::json!({
            "APP_ID": "app-1",
            "TEST_API_KEY": "app-key-1",
            "NOTE": "owned by the QA team"
        })
    );
}

#[tokio::test]
async fn test_export_keeps_existing_api_key() {
    let server = MockServer::start().await;
    mount_export(&server).await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1/api-keys"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(
        temp_dir.path(),
        "support-bot-TEST-app-1",
        r#"{"app_id": "app-1", "test_api_key": "app-existing"}"#,
    );
    let (mut driver, _) = driver(&server, temp_dir.path());

    let summary = driver.export(&app).await.unwrap();
    assert!(!summary.api_key_saved);
}

#[tokio::test]
async fn test_export_failure_marks_stage_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1/export"))
        .respond_with(ResponseTemplate::new(404).set_body_string("app not found"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(temp_dir.path(), "support-bot-TEST-app-1", r#"{"app_id": "app-1"}"#);
    let (mut driver, _) = driver(&server, temp_dir.path());

    let error = driver.export(&app).await.unwrap_err();
    assert_eq!(error.category, ErrorCategory::RemoteError);
    assert!(error.message.contains("app not found"));
    assert_eq!(error.context.get("stage").map(String::as_str), Some("fetching"));
    assert_eq!(driver.stage(), SyncStage::Failed);
    assert!(!app.dsl_file().exists());
}

#[tokio::test]
async fn test_missing_app_id_fails_before_network() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(temp_dir.path(), "support-bot-TEST", r#"{"test_api_key": "k"}"#);
    let (mut driver, extractions) = driver(&server, temp_dir.path());

    let error = driver.export(&app).await.unwrap_err();
    assert_eq!(error.category, ErrorCategory::ConfigurationError);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(extractions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_update_merges_uploads_and_publishes() {
    let server = MockServer::start().await;
    mount_export(&server).await;
    Mock::given(method("POST"))
        .and(path("/apps/imports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "import-1",
            "status": "completed",
            "app_id": "app-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apps/app-1/workflows/publish"))
        .and(body_json(serde_json::json!({"marked_name": "", "marked_comment": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(
        temp_dir.path(),
        "support-bot-TEST-app-1",
        r#"{"app_id": "app-1", "test_api_key": "app-key-1"}"#,
    );
    let (mut driver, extractions) = driver(&server, temp_dir.path());

    driver.export(&app).await.unwrap();
    fs::write(app.prompts_dir().join("Answer.system.md"), "Be concise.").unwrap();

    let summary = driver.update(&app).await.unwrap();
    assert_eq!(summary.merge.merged, vec!["2"]);
    assert_eq!(summary.publish_result["result"], "success");
    assert_eq!(driver.stage(), SyncStage::Idle);
    assert_eq!(extractions.load(Ordering::SeqCst), 1);

    let requests = server.received_requests().await.unwrap();
    let import = requests
        .iter()
        .find(|request| request.url.path() == "/apps/imports")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&import.body).unwrap();
    assert_eq!(body["mode"], "yaml-content");
    assert_eq!(body["app_id"], "app-1");
    let yaml = body["yaml_content"].as_str().unwrap();
    assert!(yaml.contains("Be concise."));
    assert!(!yaml.contains("Be helpful."));

    let saved = fs::read_to_string(app.dsl_file()).unwrap();
    assert_eq!(saved, yaml);
}

#[tokio::test]
async fn test_failed_import_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps/imports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed",
            "error": "unsupported DSL version"
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let app = app_dir(temp_dir.path(), "support-bot-TEST-app-1", r#"{"app_id": "app-1"}"#);
    fs::create_dir_all(app.dsl_file().parent().unwrap()).unwrap();
    fs::write(app.dsl_file(), EXPORTED).unwrap();
    let (mut driver, _) = driver(&server, temp_dir.path());

    let error = driver.update(&app).await.unwrap_err();
    assert_eq!(error.category, ErrorCategory::RemoteError);
    assert!(error.message.contains("unsupported DSL version"));
    assert_eq!(driver.stage(), SyncStage::Failed);
}
