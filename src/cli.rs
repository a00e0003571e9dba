use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vaultchat::features::Destination;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat with language models about the notes in a vault", long_about = None)]
pub struct Args {
    /// Root directory of the vault
    #[arg(long, global = true, default_value = ".")]
    pub vault: PathBuf,

    /// Settings file [default: ~/.vaultchat/config.yaml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the registered features
    Features,

    /// Run a feature once and print the answer
    Ask {
        /// Feature id, e.g. `chat` or `custom-command-summarize`
        feature: String,

        /// Text typed by the user
        #[arg(short, long)]
        input: Option<String>,

        /// Text selected in the editor
        #[arg(short, long)]
        selection: Option<String>,
    },

    /// Interactive conversation. Ctrl+C stops the current answer
    Chat,

    /// Run a feature that writes into a note at a cursor position
    Write {
        feature: String,

        /// Vault path of the note to edit
        #[arg(long)]
        note: String,

        /// Zero-based cursor line
        #[arg(long, default_value_t = 0)]
        line: usize,

        /// Zero-based cursor column, in characters
        #[arg(long, default_value_t = 0)]
        ch: usize,

        #[arg(short, long)]
        input: Option<String>,

        #[arg(short, long)]
        selection: Option<String>,
    },

    /// Manage custom commands
    Commands {
        #[command(subcommand)]
        action: CommandsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommandsAction {
    List,

    /// Add a command, or replace the one with the same name
    Add {
        name: String,

        /// Vault path of the template note
        #[arg(long)]
        template: String,

        #[arg(long, value_enum, default_value_t = DestinationArg::View)]
        destination: DestinationArg,

        /// Do not send the selected text with the request
        #[arg(long)]
        no_selection: bool,

        /// Ask for input before running
        #[arg(long)]
        prompt: bool,

        /// Model to use instead of the configured one
        #[arg(long)]
        model: Option<String>,
    },

    Remove {
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationArg {
    View,
    Document,
}

impl From<DestinationArg> for Destination {
    fn from(arg: DestinationArg) -> Self {
        match arg {
            DestinationArg::View => Destination::ConversationView,
            DestinationArg::Document => Destination::DocumentEditor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_with_cursor() {
        let args = Args::parse_from([
            "vaultchat", "--vault", "/tmp/notes", "write", "continue-writing", "--note",
            "Daily/today.md", "--line", "3", "--ch", "7",
        ]);

        assert_eq!(args.vault, PathBuf::from("/tmp/notes"));
        match args.command {
            Command::Write { feature, note, line, ch, .. } => {
                assert_eq!(feature, "continue-writing");
                assert_eq!(note, "Daily/today.md");
                assert_eq!((line, ch), (3, 7));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn custom_command_destination_defaults_to_view() {
        let args = Args::parse_from(["vaultchat", "commands", "add", "Tidy", "--template", "Templates/tidy"]);
        match args.command {
            Command::Commands {
                action: CommandsAction::Add { destination, no_selection, .. },
            } => {
                assert_eq!(destination, DestinationArg::View);
                assert!(!no_selection);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
