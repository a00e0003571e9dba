use super::{Message, Role};
use crate::core::error::PluginError;
use crate::providers::ChatMessage;
use uuid::Uuid;

/// Ordered messages of one conversation, in the order they were sent.
///
/// Messages are frozen once appended. The single exception is the open
/// assistant message, which receives streamed text until [`seal`] is called.
///
/// [`seal`]: ConversationBuffer::seal
#[derive(Debug, Default)]
pub struct ConversationBuffer {
    messages: Vec<Message>,
    open: Option<usize>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of the whole sequence.
    pub fn append(&mut self, message: Message) -> Result<Vec<Message>, PluginError> {
        if message.role == Role::System && !self.messages.is_empty() {
            return Err(PluginError::InvalidConversation(
                "a system message is only allowed as the first message".to_string(),
            ));
        }
        if self.open.is_some() {
            return Err(PluginError::InvalidConversation(
                "cannot append while an assistant message is streaming".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(self.messages.clone())
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn all(&self, include_system: bool) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| include_system || m.role != Role::System)
            .cloned()
            .collect()
    }

    pub fn has_system(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.open = None;
    }

    /// Start the assistant message that streamed text will be written into.
    pub fn open_assistant(&mut self, model: &str) -> Result<Uuid, PluginError> {
        let message = Message::assistant(String::new(), model);
        let id = message.id;
        self.append(message)?;
        self.open = Some(self.messages.len() - 1);
        Ok(id)
    }

    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// Append text to the open assistant message. No-op when none is open.
    pub fn push_delta(&mut self, delta: &str) {
        if let Some(idx) = self.open {
            self.messages[idx].content.push_str(delta);
        }
    }

    /// Mark the open assistant message as failed.
    pub fn fail_open(&mut self, error: &str) {
        if let Some(idx) = self.open {
            self.messages[idx].error = Some(error.to_string());
        }
    }

    /// Freeze the open assistant message and return a copy of it.
    pub fn seal(&mut self) -> Option<Message> {
        self.open.take().map(|idx| self.messages[idx].clone())
    }

    /// Messages as sent to the completion API.
    ///
    /// The open message and failed placeholders are left out, so no partial
    /// deltas reach an outgoing request.
    pub fn payload(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(idx, m)| Some(*idx) != self.open && m.error.is_none())
            .map(|(_, m)| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ConversationBuffer {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Message::system("preamble")).unwrap();
        buffer.append(Message::user("first", None)).unwrap();
        buffer.append(Message::assistant("reply", "gpt-4o-mini")).unwrap();
        buffer.append(Message::user("second", None)).unwrap();
        buffer
    }

    #[test]
    fn all_filters_system_messages_on_request() {
        let buffer = filled();

        let visible = buffer.all(false);
        let contents: Vec<&str> = visible.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "reply", "second"]);

        let everything = buffer.all(true);
        assert_eq!(everything.len(), 4);
        assert_eq!(everything[0].role, Role::System);
    }

    #[test]
    fn append_returns_a_copy_of_the_sequence() {
        let mut buffer = ConversationBuffer::new();
        let mut snapshot = buffer.append(Message::user("hello", None)).unwrap();
        snapshot[0].content.push_str(" tampered");

        assert_eq!(buffer.latest().unwrap().content, "hello");
    }

    #[test]
    fn system_message_only_allowed_first() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Message::user("hi", None)).unwrap();

        let err = buffer.append(Message::system("late")).unwrap_err();
        assert!(matches!(err, PluginError::InvalidConversation(_)));
        assert!(!buffer.has_system());
    }

    #[test]
    fn latest_and_clear() {
        let mut buffer = filled();
        assert_eq!(buffer.latest().unwrap().content, "second");

        buffer.clear();
        assert!(buffer.latest().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn open_message_is_kept_out_of_the_payload() {
        let mut buffer = filled();
        buffer.open_assistant("gpt-4o-mini").unwrap();
        buffer.push_delta("partial");

        let payload = buffer.payload();
        assert_eq!(payload.len(), 4);
        assert!(payload.iter().all(|m| m.content != "partial"));

        let sealed = buffer.seal().unwrap();
        assert_eq!(sealed.content, "partial");
        assert_eq!(buffer.payload().len(), 5);
    }

    #[test]
    fn sealed_message_no_longer_accepts_deltas() {
        let mut buffer = ConversationBuffer::new();
        buffer.open_assistant("m").unwrap();
        buffer.push_delta("done");
        buffer.seal();
        buffer.push_delta(" more");

        assert_eq!(buffer.latest().unwrap().content, "done");
    }

    #[test]
    fn failed_placeholder_is_not_sent() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Message::user("q", None)).unwrap();
        buffer.open_assistant("m").unwrap();
        buffer.fail_open("boom");
        buffer.seal();

        assert_eq!(buffer.latest().unwrap().error.as_deref(), Some("boom"));
        assert_eq!(buffer.payload().len(), 1);
    }

    #[test]
    fn cannot_append_while_streaming() {
        let mut buffer = ConversationBuffer::new();
        buffer.open_assistant("m").unwrap();
        assert!(buffer.append(Message::user("too soon", None)).is_err());
    }
}
