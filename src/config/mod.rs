pub mod custom_commands;

pub use custom_commands::CustomCommand;

use crate::core::error::PluginError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    OpenRouter,
    DeepSeek,
}

impl ProviderKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAI),
            "openrouter" => Some(ProviderKind::OpenRouter),
            "deepseek" => Some(ProviderKind::DeepSeek),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
        }
    }
}

/// Flat plugin settings. Stored keys are merged over the defaults at load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Preamble added to the system message of conversation-view requests
    pub persona: Option<String>,
    /// Vault folder conversation notes are created in
    pub conversation_folder: Option<String>,
    pub save_conversations: bool,
    pub custom_commands: Vec<CustomCommand>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            persona: None,
            conversation_folder: None,
            save_conversations: true,
            custom_commands: Vec::new(),
        }
    }
}

impl Settings {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vaultchat")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, PluginError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yml::from_str::<Settings>(&contents)
            .map_err(|e| PluginError::Config(format!("Parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), PluginError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    /// API key, if one is configured and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}
