//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Fallback model when neither the CLI nor the config names one
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Configuration for orchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Default system prompt
    pub system: Option<String>,
    /// Default session budget in USD
    pub budget_max: Option<f64>,
    /// Directory for saved sessions (default: ./runs)
    pub runs_dir: Option<String>,
    /// API key (environment variable is preferred)
    pub api_key: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("orchat")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ORCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults on any problem
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: failed to parse config file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Resolve the API key: config first, then OPENROUTER_API_KEY
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Resolve the model to use for a command
    pub fn resolve_model(&self, override_model: Option<String>) -> String {
        override_model
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Directory where sessions are saved
    pub fn runs_dir(&self) -> PathBuf {
        self.runs_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./runs"))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# orchat configuration file
# Place at ~/.config/orchat/config.toml

# Default model to use
# model = "anthropic/claude-3.5-sonnet"

# Default system prompt
# system = "You are a concise assistant."

# Default session budget in USD
# budget_max = 2.0

# Directory for saved sessions
# runs_dir = "./runs"

# API key (prefer the OPENROUTER_API_KEY environment variable)
# api_key = "sk-or-..."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            model: Some("openai/gpt-4".to_string()),
            system: None,
            budget_max: Some(1.5),
            runs_dir: Some("./sessions".to_string()),
            api_key: None,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.model.as_deref(), Some("openai/gpt-4"));
        assert_eq!(back.budget_max, Some(1.5));
        assert_eq!(back.runs_dir.as_deref(), Some("./sessions"));
    }

    #[test]
    fn test_partial_config_parses() {
        let config: Config = toml::from_str("model = \"m\"").unwrap();
        assert_eq!(config.model.as_deref(), Some("m"));
        assert_eq!(config.budget_max, None);
    }

    #[test]
    fn test_resolve_model_priority() {
        let config = Config {
            model: Some("from-config".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_model(Some("from-flag".to_string())),
            "from-flag"
        );
        assert_eq!(config.resolve_model(None), "from-config");
        assert_eq!(Config::default().resolve_model(None), DEFAULT_MODEL);
    }
}
