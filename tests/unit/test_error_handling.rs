use dslsync::core::{AppError, DefaultErrorReporter, ErrorCategory, ErrorReporter, ErrorSeverity};
use dslsync::dsl;

#[test]
fn test_error_creation_assigns_code_and_timestamp() {
    let before = chrono::Utc::now();
    let error = AppError::new(ErrorCategory::RemoteError, "export failed");

    assert_eq!(error.category, ErrorCategory::RemoteError);
    assert_eq!(error.message, "export failed");
    assert!(error.code.starts_with("ERR-"));
    assert!(error.occurred_at >= before);
    assert!(error.source.is_none());
    assert!(error.context.is_empty());
}

#[test]
fn test_error_codes_are_unique() {
    let first = AppError::new(ErrorCategory::IoError, "a");
    let second = AppError::new(ErrorCategory::IoError, "a");
    assert_ne!(first.code, second.code);
}

#[test]
fn test_severity_by_category() {
    for category in [
        ErrorCategory::ConfigurationError,
        ErrorCategory::CredentialError,
        ErrorCategory::RemoteError,
        ErrorCategory::GuardError,
        ErrorCategory::SerializationError,
        ErrorCategory::IoError,
        ErrorCategory::InternalError,
    ] {
        let error = AppError::new(category, "boom");
        assert_eq!(error.severity(), ErrorSeverity::Error, "{}", category);
        assert!(error.is_fatal(), "{}", category);
    }

    let artifact = AppError::new(ErrorCategory::ArtifactError, "sidecar missing");
    assert_eq!(artifact.severity(), ErrorSeverity::Warning);
    assert!(!artifact.is_fatal());
}

#[test]
fn test_builders_accumulate() {
    let mut error = AppError::new(ErrorCategory::GuardError, "protected app")
        .with_code("GUARD")
        .with_context("update")
        .with_suggestion("Use the console")
        .with_suggestion("Rename the folder only if the app is not production");
    error.add_context("app_dir", "/apps/bot-PRODUCTION-1");

    assert_eq!(error.code, "GUARD");
    assert_eq!(error.context.get("context").map(String::as_str), Some("update"));
    assert_eq!(
        error.context.get("app_dir").map(String::as_str),
        Some("/apps/bot-PRODUCTION-1")
    );
    assert_eq!(error.recovery_suggestions.len(), 2);
}

#[test]
fn test_display_includes_category_and_cause() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "main.yml missing");
    let error = AppError::with_source(ErrorCategory::IoError, "Failed to read DSL", Box::new(io))
        .with_code("READ");

    let rendered = error.to_string();
    assert!(rendered.starts_with("[READ] IoError: Failed to read DSL"));
    assert!(rendered.contains("Caused by: main.yml missing"));
}

#[test]
fn test_conversions() {
    let io: AppError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert_eq!(io.category, ErrorCategory::IoError);
    assert_eq!(io.code, "IO_ERROR");

    let json: AppError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert_eq!(json.category, ErrorCategory::SerializationError);
    assert_eq!(json.code, "JSON_ERROR");

    let any: AppError = anyhow::anyhow!("unexpected").into();
    assert_eq!(any.category, ErrorCategory::InternalError);
    assert_eq!(any.code, "ANYHOW_ERROR");
    assert_eq!(any.message, "unexpected");
}

#[test]
fn test_codec_error_becomes_serialization_error() {
    let codec = dsl::decode("workflow: [unclosed").unwrap_err();
    let error: AppError = codec.into();
    assert_eq!(error.category, ErrorCategory::SerializationError);
    assert!(error.message.starts_with("failed to parse DSL document"));
    assert!(error.source.is_some());
}

#[test]
fn test_app_error_survives_anyhow_round_trip() {
    let original = AppError::new(ErrorCategory::CredentialError, "please log in again");
    let wrapped: anyhow::Error = original.into();
    let recovered = wrapped.downcast::<AppError>().unwrap();
    assert_eq!(recovered.category, ErrorCategory::CredentialError);
}

#[test]
fn test_reporter_accepts_every_kind() {
    let reporter = DefaultErrorReporter::new();
    let mut error = AppError::new(ErrorCategory::RemoteError, "HTTP 500");
    error.add_context("status", "500");
    reporter.report_error(&error);
    reporter.report_warning("sidecar missing", Some("node 2".to_string()));
    reporter.report_info("done");
}
