//! Destinations streamed text is written to.

use crate::conversation::ConversationBuffer;
use crate::features::{ChatEvent, EventSender};
use crate::host::{DocumentEditor, Position};
use uuid::Uuid;

/// Characters buffered before a flush into the document editor.
pub const BUFFER_LIMIT: usize = 300;

/// Coalesces deltas into fewer, larger insertions into a document.
pub struct DocumentSink<'a> {
    editor: &'a mut dyn DocumentEditor,
    limit: usize,
    buffer: String,
    buffered_chars: usize,
    position: Option<Position>,
}

impl<'a> DocumentSink<'a> {
    pub fn new(editor: &'a mut dyn DocumentEditor, limit: usize) -> Self {
        Self {
            editor,
            limit: limit.max(1),
            buffer: String::new(),
            buffered_chars: 0,
            position: None,
        }
    }

    pub fn push(&mut self, delta: &str) {
        if self.position.is_none() {
            self.position = Some(self.editor.cursor());
        }
        self.buffer.push_str(delta);
        self.buffered_chars += delta.chars().count();

        if self.buffered_chars >= self.limit {
            self.flush();
        }
    }

    /// Insert the buffered text at the tracked position. No-op when empty.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let at = self.position.unwrap_or_else(|| self.editor.cursor());
        let text = std::mem::take(&mut self.buffer);
        self.buffered_chars = 0;

        self.editor.insert(at, &text);
        let next = at.advance(&text);
        self.editor.set_cursor(next);
        self.position = Some(next);
        tracing::trace!(chars = text.chars().count(), line = next.line, ch = next.ch, "flushed into document");
    }
}

/// Writes deltas straight into the open assistant message of a
/// conversation and tells the UI about each one.
pub struct ViewSink<'a> {
    buffer: &'a mut ConversationBuffer,
    message_id: Uuid,
    events: &'a EventSender,
}

impl<'a> ViewSink<'a> {
    pub fn new(buffer: &'a mut ConversationBuffer, message_id: Uuid, events: &'a EventSender) -> Self {
        Self {
            buffer,
            message_id,
            events,
        }
    }

    pub fn push(&mut self, delta: &str) {
        self.buffer.push_delta(delta);
        let _ = self.events.send(ChatEvent::Delta {
            message_id: self.message_id,
            text: delta.to_string(),
        });
    }
}

pub enum OutputSink<'a> {
    View(ViewSink<'a>),
    Document(DocumentSink<'a>),
}

impl OutputSink<'_> {
    pub fn on_delta(&mut self, delta: &str) {
        match self {
            OutputSink::View(sink) => sink.push(delta),
            OutputSink::Document(sink) => sink.push(delta),
        }
    }

    /// Flush anything still buffered. Called once when the stream ends for
    /// any reason.
    pub fn on_stream_end(&mut self) {
        if let OutputSink::Document(sink) = self {
            sink.flush();
        }
    }
}
