use clap::Parser;
use dslsync::cli::{self, Args};
use dslsync::core::{AppError, DefaultErrorReporter, ErrorReporter};
use dslsync::logging;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _logging_guard = match logging::init(&args.command) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("[WARNING] logging disabled: {:#}", err);
            None
        }
    };

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let app_error = err.downcast::<AppError>().unwrap_or_else(AppError::from);
            DefaultErrorReporter::new().report_error(&app_error);
            ExitCode::FAILURE
        }
    }
}
