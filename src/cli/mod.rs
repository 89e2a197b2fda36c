pub mod args;
pub mod commands;

pub use args::{SyncArgs, TokensArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
SYNC COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "dslsync")]
#[command(version = crate::VERSION)]
#[command(about = "Sync console workflow DSL documents with editable local prompt files")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: export an app, edit prompts/*.md, then update to upload and publish."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Download an app's DSL and split its prompts into files",
        long_about = "Export authenticates with the browser session, fetches DSL/main.yml, fills in the test API key and writes prompts/ plus test input scaffolding.",
        after_help = "Example:\n    dslsync export ./apps/support-bot-TEST-42"
    )]
    Export(SyncArgs),
    #[command(
        about = "Merge prompt files back, upload and publish",
        long_about = "Update folds prompts/ into DSL/main.yml, imports the document into the console and publishes the workflow. Apps tagged as protected are refused.",
        after_help = "Example:\n    dslsync update ./apps/support-bot-TEST-42 --config config.staging.json"
    )]
    Update(SyncArgs),
    #[command(
        about = "Show or clear the cached console credential",
        long_about = "Tokens resolves the current credential (cache first, then the browser store) and prints it masked; --clear deletes the cache record.",
        after_help = "Example:\n    dslsync tokens --clear"
    )]
    Tokens(TokensArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Export(sync_args) => commands::export(sync_args).await,
        Command::Update(sync_args) => commands::update(sync_args).await,
        Command::Tokens(tokens_args) => commands::tokens(tokens_args).await,
    }
}
