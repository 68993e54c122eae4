use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub history_path: Option<String>,
    pub default_model: Option<String>,
    pub default_temperature: Option<f64>,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    /// Named prompt templates: `--prompt NAME` expands to the stored text.
    #[serde(default)]
    pub prompts: HashMap<String, String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("could not parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Where session files and the line history live. Configurable;
    /// defaults next to the platform data directory.
    pub fn history_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.history_path {
            return Ok(PathBuf::from(path));
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("charla").join("history"))
    }

    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| self.api_key.clone())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("charla").join("config.json"))
    }
}
