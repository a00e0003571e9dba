use super::Settings;
use crate::core::error::PluginError;
use crate::features::Destination;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const CUSTOM_COMMAND_PREFIX: &str = "custom-command-";

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// User-authored command backed by a template note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCommand {
    pub name: String,
    /// Vault path of the note holding the instruction text
    pub template_filename: String,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default = "default_true")]
    pub send_selected_text: bool,
    #[serde(default)]
    pub prompt_before_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl CustomCommand {
    pub fn new(name: &str, template_filename: &str, destination: Destination) -> Self {
        Self {
            name: name.to_string(),
            template_filename: template_filename.to_string(),
            destination,
            send_selected_text: true,
            prompt_before_run: false,
            model_id: None,
        }
    }

    /// Id the command is registered under in the feature registry.
    pub fn feature_id(&self) -> String {
        format!("{}{}", CUSTOM_COMMAND_PREFIX, slugify(&self.name))
    }

    /// Vault path of the template, with the `.md` extension added if missing.
    pub fn template_path(&self) -> String {
        if self.template_filename.ends_with(".md") {
            self.template_filename.clone()
        } else {
            format!("{}.md", self.template_filename)
        }
    }
}

pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.trim().to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

impl Settings {
    pub fn custom_command(&self, name: &str) -> Option<&CustomCommand> {
        let slug = slugify(name);
        self.custom_commands.iter().find(|c| slugify(&c.name) == slug)
    }

    /// Add a command, or replace the one with the same name.
    pub fn upsert_custom_command(&mut self, command: CustomCommand) -> Result<(), PluginError> {
        let slug = slugify(&command.name);
        if slug.is_empty() {
            return Err(PluginError::Config(
                "Custom command name must contain letters or digits".to_string(),
            ));
        }
        if command.template_filename.trim().is_empty() {
            return Err(PluginError::Config(format!(
                "Custom command '{}' needs a template note",
                command.name
            )));
        }

        match self
            .custom_commands
            .iter_mut()
            .find(|c| slugify(&c.name) == slug)
        {
            Some(existing) => *existing = command,
            None => self.custom_commands.push(command),
        }
        Ok(())
    }

    pub fn remove_custom_command(&mut self, name: &str) -> Result<CustomCommand, PluginError> {
        let slug = slugify(name);
        let idx = self
            .custom_commands
            .iter()
            .position(|c| slugify(&c.name) == slug)
            .ok_or_else(|| PluginError::Config(format!("No custom command named '{}'", name)))?;
        Ok(self.custom_commands.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_ids_are_slugged() {
        let cmd = CustomCommand::new("  Translate to French! ", "Templates/fr", Destination::DocumentEditor);
        assert_eq!(cmd.feature_id(), "custom-command-translate-to-french");
        assert_eq!(cmd.template_path(), "Templates/fr.md");
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut settings = Settings::default();
        settings
            .upsert_custom_command(CustomCommand::new("Summarize", "a.md", Destination::ConversationView))
            .unwrap();
        settings
            .upsert_custom_command(CustomCommand::new("summarize", "b.md", Destination::DocumentEditor))
            .unwrap();

        assert_eq!(settings.custom_commands.len(), 1);
        assert_eq!(settings.custom_command("SUMMARIZE").unwrap().template_filename, "b.md");
    }

    #[test]
    fn rejects_unnamed_or_templateless_commands() {
        let mut settings = Settings::default();
        assert!(settings
            .upsert_custom_command(CustomCommand::new("!!!", "a.md", Destination::ConversationView))
            .is_err());
        assert!(settings
            .upsert_custom_command(CustomCommand::new("ok", " ", Destination::ConversationView))
            .is_err());
    }

    #[test]
    fn remove_unknown_command_fails() {
        let mut settings = Settings::default();
        settings
            .upsert_custom_command(CustomCommand::new("Keep", "k.md", Destination::ConversationView))
            .unwrap();

        assert!(settings.remove_custom_command("gone").is_err());
        assert_eq!(settings.remove_custom_command("keep").unwrap().name, "Keep");
        assert!(settings.custom_commands.is_empty());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let cmd: CustomCommand =
            serde_yml::from_str("name: Tidy\ntemplate_filename: Templates/tidy\n").unwrap();
        assert!(cmd.send_selected_text);
        assert!(!cmd.prompt_before_run);
        assert_eq!(cmd.destination, Destination::ConversationView);
    }
}
