//! `orchat models`: browse the model catalog

use clap::Subcommand;
use colored::Colorize;

use crate::config::Config;
use crate::ui;

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List available models
    List {
        /// Only show models whose id contains this substring
        #[arg(short, long)]
        filter: Option<String>,

        /// Include pricing and context length columns
        #[arg(short, long)]
        details: bool,
    },
    /// Show details for one model
    Info {
        /// Exact model id, e.g. "openai/gpt-4o-mini"
        id: String,
    },
}

pub async fn run(cmd: ModelsCommand, config: &Config) -> anyhow::Result<()> {
    let client = super::client(config)?;
    let mut catalog = client.list_models().await?;
    catalog.sort_by(|a, b| a.id.cmp(&b.id));

    match cmd {
        ModelsCommand::List { filter, details } => {
            let needle = filter.as_deref().map(str::to_lowercase);
            let matching: Vec<_> = catalog
                .iter()
                .filter(|m| match &needle {
                    Some(needle) => m.id.to_lowercase().contains(needle),
                    None => true,
                })
                .collect();

            if matching.is_empty() {
                println!("no models match");
                return Ok(());
            }

            if details {
                println!(
                    "{:<44} {:>8} {:>12} {:>12}",
                    "MODEL".bold(),
                    "CTX".bold(),
                    "PROMPT".bold(),
                    "COMPLETION".bold()
                );
                for model in &matching {
                    println!(
                        "{:<44} {:>8} {:>12} {:>12}",
                        ui::truncate(&model.id, 44),
                        ui::format_context_length(model.context_length),
                        ui::format_price_per_m(model.pricing_prompt),
                        ui::format_price_per_m(model.pricing_completion),
                    );
                }
            } else {
                for model in &matching {
                    println!("{}", model.id);
                }
            }
            eprintln!("{}", format!("{} models", matching.len()).dimmed());
        }
        ModelsCommand::Info { id } => {
            let Some(model) = catalog.iter().find(|m| m.id == id) else {
                anyhow::bail!("model not found: {id}");
            };
            println!("{}", model.id.bold());
            if let Some(description) = &model.description {
                println!("{description}");
            }
            println!(
                "context length: {}",
                ui::format_context_length(model.context_length)
            );
            println!(
                "pricing: {} prompt, {} completion",
                ui::format_price_per_m(model.pricing_prompt),
                ui::format_price_per_m(model.pricing_completion),
            );
        }
    }
    Ok(())
}
