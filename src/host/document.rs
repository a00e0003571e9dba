use super::{DocumentEditor, Position};

/// In-memory text document with a cursor.
///
/// Used by the terminal host to edit a note before writing it back, and
/// by tests to observe insertions.
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    text: String,
    cursor: Position,
    insertions: Vec<String>,
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every inserted chunk, in insertion order.
    pub fn insertions(&self) -> &[String] {
        &self.insertions
    }

    /// Byte offset of `pos`, clamped to the end of its line and of the text.
    fn offset(&self, pos: Position) -> usize {
        let mut line_start = 0;
        for _ in 0..pos.line {
            match self.text[line_start..].find('\n') {
                Some(i) => line_start += i + 1,
                None => return self.text.len(),
            }
        }

        let line = &self.text[line_start..];
        let line_end = line.find('\n').unwrap_or(line.len());
        let col = line[..line_end]
            .char_indices()
            .nth(pos.ch)
            .map(|(i, _)| i)
            .unwrap_or(line_end);
        line_start + col
    }
}

impl DocumentEditor for TextDocument {
    fn cursor(&self) -> Position {
        self.cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = pos;
    }

    fn insert(&mut self, at: Position, text: &str) {
        let offset = self.offset(at);
        self.text.insert_str(offset, text);
        self.insertions.push(text.to_string());
    }
}
