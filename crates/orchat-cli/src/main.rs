//! orchat - chat with LLMs through OpenRouter

mod commands;
mod config;
mod ui;

use clap::{Parser, Subcommand};
use config::Config;

/// Chat with LLMs through OpenRouter: streaming replies, token and cost
/// tracking, and resumable sessions.
#[derive(Parser, Debug)]
#[command(name = "orchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a single question
    Ask(commands::ask::AskArgs),
    /// Start an interactive chat session
    Chat(commands::chat::ChatArgs),
    /// Explore available models
    #[command(subcommand)]
    Models(commands::models::ModelsCommand),
    /// Manage saved sessions
    #[command(subcommand)]
    Sessions(commands::sessions::SessionsCommand),
    /// Write an example config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "orchat=debug,orchat_core=debug,orchat_api=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    match cli.command {
        Command::Ask(args) => commands::ask::run(args, &config).await,
        Command::Chat(args) => commands::chat::run(args, &config).await,
        Command::Models(cmd) => commands::models::run(cmd, &config).await,
        Command::Sessions(cmd) => commands::sessions::run(cmd, &config).await,
        Command::InitConfig => {
            let path = Config::config_path();
            if path.exists() {
                println!("config already exists at {}", path.display());
            } else {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                std::fs::write(&path, config::example_config())?;
                println!("wrote {}", path.display());
            }
            Ok(())
        }
    }
}
