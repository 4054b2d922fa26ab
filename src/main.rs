mod chat;
mod config;
mod error;
mod model;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use tokio::io::BufReader;

use chat::session::Session;
use config::Config;
use error::{CompletionError, SessionError};
use model::CompletionClient;

/// Interact with ChatGPT via CLI
#[derive(Parser)]
#[command(name = "gpt-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default is ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize environment
    dotenv().ok();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let client = CompletionClient::new(&config).context("Failed to build HTTP client")?;

    info!("Starting chat session");

    let mut session = Session::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        config.on_input_error,
    );

    match session.run(&client).await {
        Err(SessionError::Completion(e @ CompletionError::UnexpectedStatus { .. }))
            if e.status() == Some(401) =>
        {
            Err(e).context("Completion endpoint rejected the API key")
        }
        result => result.context("Chat session ended with an error"),
    }
}
