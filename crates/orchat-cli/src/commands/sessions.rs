//! `orchat sessions`: inspect and resume saved sessions

use std::path::PathBuf;

use clap::Subcommand;
use colored::Colorize;

use orchat_api::Role;
use orchat_core::{session_cost, storage, Session};

use crate::commands::chat::{self, ChatArgs};
use crate::config::Config;
use crate::ui;

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List saved sessions, newest first
    List {
        /// Directory to scan (default: the configured runs dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print a session transcript with stats
    Show {
        /// Path to a session file
        path: PathBuf,
    },
    /// Continue a saved session interactively
    Resume {
        /// Path to a session file
        path: PathBuf,
    },
}

pub async fn run(cmd: SessionsCommand, config: &Config) -> anyhow::Result<()> {
    match cmd {
        SessionsCommand::List { dir } => {
            let dir = dir.unwrap_or_else(|| config.runs_dir());
            let files = storage::list_session_files(&dir)?;
            if files.is_empty() {
                println!("no sessions in {}", dir.display());
                return Ok(());
            }
            for path in files {
                match storage::load_session(&path) {
                    Ok(session) => println!("{}", summary_line(&path, &session)),
                    Err(e) => {
                        eprintln!(
                            "{}",
                            format!("skipping {}: {e}", path.display()).yellow()
                        );
                    }
                }
            }
        }
        SessionsCommand::Show { path } => {
            let session = storage::load_session(&path)?;
            show_session(&session, config).await;
        }
        SessionsCommand::Resume { path } => {
            let args = ChatArgs {
                resume: Some(path),
                ..Default::default()
            };
            chat::run(args, config).await?;
        }
    }
    Ok(())
}

fn summary_line(path: &std::path::Path, session: &Session) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut parts = vec![
        name,
        session.model.clone(),
        format!("{} turns", session.turns.len()),
        session.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    ];
    if let Some(cost) = session.stored_cost() {
        parts.push(format!("~{}", ui::format_cost(cost)));
    }
    parts.join("  ")
}

async fn show_session(session: &Session, config: &Config) {
    println!("{}", session.model.bold());
    println!(
        "{}",
        format!(
            "created {} | {} turns",
            session.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.turns.len()
        )
        .dimmed()
    );
    if let Some(system) = &session.system {
        println!("{} {system}", "system:".dimmed());
    }
    println!();

    for turn in &session.turns {
        for message in &turn.messages {
            let label = match message.role {
                Role::User => "you".cyan().bold(),
                Role::Assistant => "assistant".green().bold(),
                Role::System => "system".dimmed(),
            };
            println!("{label}: {}", message.content);
        }
        let mut meta = Vec::new();
        if let Some(usage) = &turn.usage {
            meta.push(format!("tokens: {}", ui::format_tokens(usage)));
        }
        if let Some(latency) = turn.latency_ms {
            meta.push(ui::format_duration(latency));
        }
        if let Some(cost) = turn.cost_estimate {
            meta.push(format!("~{}", ui::format_cost(cost)));
        }
        if !meta.is_empty() {
            println!("{}", meta.join(" | ").dimmed());
        }
        println!();
    }

    if let Some(totals) = &session.usage_totals {
        println!("total tokens: {}", ui::format_tokens(totals));
    }

    // Stored costs win; otherwise try a retrospective estimate against the
    // current catalog.
    let cost = match session.stored_cost() {
        Some(cost) => Some(cost),
        None => match super::client(config) {
            Ok(client) => match client.list_models().await {
                Ok(catalog) => session_cost(session, &catalog),
                Err(_) => None,
            },
            Err(_) => None,
        },
    };
    match cost {
        Some(cost) => println!("estimated cost: ~{}", ui::format_cost(cost)),
        None => println!("estimated cost: unknown"),
    }
}
