use std::io;
use thiserror::Error;

/// Unified error type for the vaultchat core
#[derive(Error, Debug)]
pub enum PluginError {
    /// No API key configured
    #[error("No API key configured. Add one in the settings before running a command.")]
    MissingCredential,

    /// Invocation references a feature id absent from the registry
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Feature writes into a document but no editor is active
    #[error("Open a note before running this command.")]
    NoActiveEditor,

    #[error("Nothing to send. Type a message or select some text first.")]
    EmptyPrompt,

    /// Template note of a custom command could not be read
    #[error("Could not read template {path}: {reason}")]
    TemplateRead { path: String, reason: String },

    /// Vault read failures
    #[error("Could not read {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Malformed stream framing or JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Non-success status from the completion endpoint
    #[error("API returned status {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Conversation buffer invariant violations
    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl PluginError {
    /// Text shown through the notification channel.
    pub fn user_message(&self) -> String {
        match self {
            PluginError::Decode(_) => "An error occurred while reading the response.".to_string(),
            PluginError::Http { status, .. } => {
                format!("The API request failed with status {}.", status)
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            PluginError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_timeout() {
            PluginError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            PluginError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            PluginError::Decode(format!("Response body: {}", err))
        } else {
            PluginError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for PluginError {
    fn from(err: serde_yml::Error) -> Self {
        PluginError::Serialization(format!("YAML error: {}", err))
    }
}
