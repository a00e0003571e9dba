use super::ConversationBuffer;
use crate::features::persist::PersistTicket;
use crate::stream::StreamController;
use chrono::{DateTime, Local};
use uuid::Uuid;

/// State of one conversation view: its messages, its in-flight request
/// and the note it is saved to.
pub struct Conversation {
    id: Uuid,
    created: DateTime<Local>,
    pub(crate) buffer: ConversationBuffer,
    controller: StreamController,
    pub(crate) note_path: Option<String>,
    pub(crate) pending_persist: Option<PersistTicket>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created: Local::now(),
            buffer: ConversationBuffer::new(),
            controller: StreamController::new(),
            note_path: None,
            pending_persist: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }

    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    /// Handle the UI keeps to cancel the in-flight request.
    pub fn controller(&self) -> StreamController {
        self.controller.clone()
    }

    pub fn note_path(&self) -> Option<&str> {
        self.note_path.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.controller.is_active()
    }

    /// Cancel the in-flight request, if any. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// Start a new conversation in this view.
    ///
    /// The in-flight request is cancelled and the messages are dropped. A
    /// save still pending for the old conversation is kept and awaited
    /// before the next request.
    pub fn reset(&mut self) {
        self.controller.cancel();
        self.buffer.clear();
        self.id = Uuid::new_v4();
        self.created = Local::now();
        self.note_path = None;
        tracing::debug!(conversation = %self.id, "started new conversation");
    }

    /// Wait for the previous turn's save to finish.
    pub async fn settle(&mut self) {
        if let Some(ticket) = self.pending_persist.take() {
            ticket.wait().await;
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    #[test]
    fn reset_clears_messages_and_cancels() {
        let mut conversation = Conversation::new();
        let old_id = conversation.id();
        conversation.buffer.append(Message::user("hi", None)).unwrap();
        conversation.note_path = Some("Chats/a.md".to_string());

        let request = conversation.controller().begin();
        conversation.reset();

        assert!(request.token().is_cancelled());
        assert!(conversation.buffer().is_empty());
        assert!(conversation.note_path().is_none());
        assert_ne!(conversation.id(), old_id);
    }

    #[test]
    fn cancel_without_request_is_a_no_op() {
        let conversation = Conversation::new();
        conversation.cancel();
        conversation.cancel();
        assert!(!conversation.is_streaming());
    }
}
