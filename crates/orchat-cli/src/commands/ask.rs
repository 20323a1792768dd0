//! `orchat ask`: one-shot question with streamed output

use std::io::Write;
use std::time::Instant;

use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use orchat_core::{consume_stream, session_cost, ConsumeError, Conversation};

use crate::config::Config;
use crate::ui;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub question: String,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Wait for the full answer instead of streaming tokens
    #[arg(long)]
    pub no_stream: bool,

    /// Emit a JSON object with the answer and metrics
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AskArgs, config: &Config) -> anyhow::Result<()> {
    let client = super::client(config)?;
    let model = config.resolve_model(args.model.clone());
    let system = args.system.clone().or_else(|| config.system.clone());

    let mut conversation = Conversation::new(&model, system, None)?;
    conversation.append_user(&args.question)?;

    let streamed_to_stdout = !args.no_stream && !args.json;

    let (content, usage, latency_ms) = if streamed_to_stdout {
        let stream = match client
            .stream_completion(&conversation.request_messages(), &model)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                conversation.abort_pending();
                return Err(e.into());
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

        let result = consume_stream(&mut conversation, stream, &cancel, |delta| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        })
        .await;
        watcher.abort();
        println!();

        match result {
            Ok(report) => {
                if let Some(e) = &report.transport_error {
                    eprintln!("{}", format!("(response truncated: {e})").yellow());
                }
                (report.content, report.usage, Some(report.latency_ms))
            }
            Err(ConsumeError::Cancelled) => {
                eprintln!("{}", "(cancelled)".dimmed());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        let started = Instant::now();
        let completion = match client
            .complete(&conversation.request_messages(), &model)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                conversation.abort_pending();
                return Err(e.into());
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        conversation.append_assistant(&completion.text, completion.usage, Some(latency_ms))?;
        (completion.text, completion.usage, Some(latency_ms))
    };

    // Pricing lookup is best-effort; a failed catalog fetch just means no
    // cost figure in the output.
    let cost = match client.list_models().await {
        Ok(catalog) => {
            let session = conversation.snapshot()?;
            session_cost(&session, &catalog)
        }
        Err(e) => {
            tracing::debug!(error = %e, "catalog fetch failed, skipping cost");
            None
        }
    };

    if args.json {
        let output = serde_json::json!({
            "answer": content,
            "model": model,
            "usage": usage,
            "latency_ms": latency_ms,
            "cost_estimate": cost,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if !streamed_to_stdout {
        println!("{content}");
    }

    let mut footer = vec![model];
    if let Some(usage) = &usage {
        footer.push(format!("tokens: {}", ui::format_tokens(usage)));
    }
    if let Some(latency) = latency_ms {
        footer.push(ui::format_duration(latency));
    }
    if let Some(cost) = cost {
        footer.push(format!("~{}", ui::format_cost(cost)));
    }
    eprintln!("{}", footer.join(" | ").dimmed());

    Ok(())
}
