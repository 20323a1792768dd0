//! `orchat chat`: interactive REPL with budget tracking

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;

use orchat_api::{ModelInfo, OpenRouter};
use orchat_core::{
    consume_stream, lookup_pricing, storage, token_cost, ConsumeError, Conversation,
};

use crate::config::Config;
use crate::ui;

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Maximum session spend in USD
    #[arg(short, long)]
    pub budget: Option<f64>,

    /// Resume a saved session file
    #[arg(short, long)]
    pub resume: Option<PathBuf>,

    /// Directory for saved sessions
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub async fn run(args: ChatArgs, config: &Config) -> anyhow::Result<()> {
    let client = super::client(config)?;
    let runs_dir = args.dir.clone().unwrap_or_else(|| config.runs_dir());

    let mut conversation = match &args.resume {
        Some(path) => {
            let session = storage::load_session(path)?;
            let conversation = Conversation::restore(session)?;
            println!(
                "resumed {} ({} turns, {} tokens so far)",
                path.display(),
                conversation.turns().len(),
                conversation.usage_totals().total_tokens
            );
            conversation
        }
        None => Conversation::new(
            config.resolve_model(args.model.clone()),
            args.system.clone().or_else(|| config.system.clone()),
            args.budget.or(config.budget_max),
        )?,
    };

    // One catalog fetch up front for live per-turn cost estimates
    let catalog: Vec<ModelInfo> = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            eprintln!(
                "{}",
                format!("warning: could not fetch model catalog ({e}); costs unavailable").yellow()
            );
            Vec::new()
        }
    };

    println!(
        "{} {}",
        "chatting with".dimmed(),
        conversation.model().bold()
    );
    println!("{}", "type :help for commands, :exit to quit".dimmed());

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "(use :exit to quit)".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        if let Some(command) = input.strip_prefix(':') {
            if handle_command(command, &mut conversation, &runs_dir) {
                break;
            }
            continue;
        }

        run_turn(&client, &mut conversation, &catalog, input).await;
    }

    offer_save(&mut editor, &conversation, &runs_dir);
    Ok(())
}

/// Execute one exchange; failures never disturb committed turns.
async fn run_turn(
    client: &OpenRouter,
    conversation: &mut Conversation,
    catalog: &[ModelInfo],
    input: &str,
) {
    if let Err(e) = conversation.append_user(input) {
        eprintln!("{}", e.to_string().red());
        return;
    }

    let stream = match client
        .stream_completion(&conversation.request_messages(), conversation.model())
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            conversation.abort_pending();
            let hint = if e.is_retryable() { "; try again" } else { "" };
            eprintln!("{}", format!("request failed: {e}{hint}").red());
            return;
        }
    };

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = consume_stream(conversation, stream, &cancel, |delta| {
        print!("{delta}");
        let _ = std::io::stdout().flush();
    })
    .await;
    watcher.abort();
    println!();

    let report = match result {
        Ok(report) => report,
        Err(ConsumeError::Cancelled) => {
            println!("{}", "(cancelled)".dimmed());
            return;
        }
        Err(e) => {
            eprintln!("{}", format!("request failed: {e}").red());
            return;
        }
    };

    if let Some(e) = &report.transport_error {
        eprintln!("{}", format!("(response truncated: {e})").yellow());
    }

    // Attribute cost to the turn when both usage and pricing are known
    let turn_cost = report.usage.as_ref().and_then(|usage| {
        let (prompt, completion) = lookup_pricing(conversation.model(), catalog)?;
        token_cost(usage, prompt, completion).ok()
    });
    if let Some(cost) = turn_cost {
        conversation.note_turn_cost(cost);
    }

    let mut footer = vec![conversation.model().to_string()];
    if let Some(usage) = &report.usage {
        footer.push(format!("tokens: {}", ui::format_tokens(usage)));
    }
    footer.push(ui::format_duration(report.latency_ms));
    if let Some(cost) = turn_cost {
        footer.push(format!("~{}", ui::format_cost(cost)));
    }
    footer.push(ui::budget_line(
        conversation.cost_total(),
        conversation.budget_max(),
    ));
    println!("{}", footer.join(" | ").dimmed());

    if let Some(warning) = conversation.check_budget() {
        eprintln!("{}", format!("\u{26a0} {warning}").red().bold());
    }
}

/// Handle a colon command; returns true when the REPL should exit
fn handle_command(
    command: &str,
    conversation: &mut Conversation,
    runs_dir: &std::path::Path,
) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or("") {
        "help" => {
            println!(":help          show this help");
            println!(":reset         clear history, keep model/system/budget");
            println!(":save [path]   save the session (default: {})", runs_dir.display());
            println!(":budget        show budget status");
            println!(":exit          quit");
        }
        "reset" => {
            conversation.reset();
            println!("conversation cleared");
        }
        "save" => {
            let target = parts
                .next()
                .map(PathBuf::from)
                .unwrap_or_else(|| runs_dir.to_path_buf());
            match conversation
                .snapshot()
                .map_err(anyhow::Error::from)
                .and_then(|s| storage::save_session(&s, &target).map_err(Into::into))
            {
                Ok(path) => println!("saved to {}", path.display()),
                Err(e) => eprintln!("{}", format!("save failed: {e}").red()),
            }
        }
        "budget" => {
            println!(
                "{}",
                ui::budget_line(conversation.cost_total(), conversation.budget_max())
            );
        }
        "exit" | "quit" => return true,
        other => {
            eprintln!("unknown command :{other} (try :help)");
        }
    }
    false
}

/// Ask whether to keep the conversation before quitting
fn offer_save(editor: &mut DefaultEditor, conversation: &Conversation, runs_dir: &std::path::Path) {
    if conversation.turns().is_empty() {
        return;
    }
    let answer = match editor.readline("save session? [y/N] ") {
        Ok(line) => line,
        Err(_) => return,
    };
    if !answer.trim().eq_ignore_ascii_case("y") {
        return;
    }
    match conversation
        .snapshot()
        .map_err(anyhow::Error::from)
        .and_then(|s| storage::save_session(&s, runs_dir).map_err(Into::into))
    {
        Ok(path) => println!("saved to {}", path.display()),
        Err(e) => eprintln!("{}", format!("save failed: {e}").red()),
    }
}
