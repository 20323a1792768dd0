//! CLI subcommand implementations

pub mod ask;
pub mod chat;
pub mod models;
pub mod sessions;

use crate::config::Config;
use anyhow::Context;
use orchat_api::OpenRouter;

/// Build an API client from config or environment
pub fn client(config: &Config) -> anyhow::Result<OpenRouter> {
    let key = config
        .api_key()
        .context("no API key: set OPENROUTER_API_KEY or add api_key to the config file")?;
    Ok(OpenRouter::new(key))
}
