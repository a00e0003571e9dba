//! Interfaces of the host application consumed by the core.
//!
//! The note-taking application owns the documents, the vault and all UI.
//! The core only talks to it through these traits.

pub mod document;
pub mod fs_vault;

pub use document::TextDocument;
pub use fs_vault::FsVault;

use crate::core::error::PluginError;
use async_trait::async_trait;

/// Cursor position in a document. `ch` counts characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }

    /// Position right after `text` once it is inserted here.
    pub fn advance(&self, text: &str) -> Position {
        match text.rfind('\n') {
            Some(last) => Position {
                line: self.line + text.matches('\n').count(),
                ch: text[last + 1..].chars().count(),
            },
            None => Position {
                line: self.line,
                ch: self.ch + text.chars().count(),
            },
        }
    }
}

/// Text editing surface of the active document.
pub trait DocumentEditor: Send {
    fn cursor(&self) -> Position;
    fn set_cursor(&mut self, pos: Position);
    fn insert(&mut self, at: Position, text: &str);
}

/// File storage of the user's notes. Paths are vault-relative.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn read(&self, path: &str) -> Result<String, PluginError>;
    async fn create(&self, path: &str, content: &str) -> Result<(), PluginError>;
    async fn append(&self, path: &str, text: &str) -> Result<(), PluginError>;
    async fn exists(&self, path: &str) -> bool;
    async fn list_folders(&self) -> Result<Vec<String>, PluginError>;
}

/// User-facing notification channel (toasts).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Dialogs the core may ask the UI layer to show.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask the user to pick one of `folders`. `None` when dismissed.
    async fn prompt_for_folder(&self, folders: &[String]) -> Option<String>;

    /// Ask for free text before running a command. `None` when dismissed.
    async fn prompt_for_input(&self, title: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_across_newline_follows_last_line() {
        let next = Position::new(2, 5).advance("line1\nline2");
        assert_eq!(next, Position::new(3, 5));
    }

    #[test]
    fn advance_without_newline_moves_column() {
        let next = Position::new(4, 3).advance("abc");
        assert_eq!(next, Position::new(4, 6));
    }

    #[test]
    fn advance_counts_characters() {
        let next = Position::new(0, 0).advance("\n\nh\u{e9}llo \u{1F600}");
        assert_eq!(next, Position::new(2, 7));
    }

    #[test]
    fn trailing_newline_resets_column() {
        let next = Position::new(1, 9).advance("para\n");
        assert_eq!(next, Position::new(2, 0));
    }
}
