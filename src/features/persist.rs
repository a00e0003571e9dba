//! Saving conversations as notes in the vault.

use crate::conversation::Message;
use crate::core::error::PluginError;
use crate::host::{Notifier, Vault};
use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Delay before a scheduled write runs, so UI updates settle first.
pub const PERSIST_DELAY: Duration = Duration::from_millis(50);

static ILLEGAL_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|#^\[\]]"#).unwrap());

/// One append to a conversation note.
#[derive(Debug, Clone)]
pub struct PersistJob {
    pub note_path: String,
    /// Content the note is created with when it does not exist yet
    pub header: String,
    pub section: String,
}

struct QueuedJob {
    job: PersistJob,
    done: oneshot::Sender<()>,
}

type Workers = Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<QueuedJob>>>>;

/// Completion signal of a scheduled write.
pub struct PersistTicket(oneshot::Receiver<()>);

impl PersistTicket {
    /// Wait until the write has run, successfully or not.
    pub async fn wait(self) {
        let _ = self.0.await;
    }
}

/// Runs vault writes in the background, strictly in order per conversation.
#[derive(Clone)]
pub struct PersistQueue {
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    workers: Workers,
    delay: Duration,
}

impl PersistQueue {
    pub fn new(vault: Arc<dyn Vault>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            vault,
            notifier,
            workers: Arc::new(Mutex::new(HashMap::new())),
            delay: PERSIST_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue `job` behind earlier writes of the same conversation.
    pub fn schedule(&self, conversation_id: Uuid, job: PersistJob) -> PersistTicket {
        let (done, ticket) = oneshot::channel();
        let mut queued = QueuedJob { job, done };

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = workers.get(&conversation_id) {
            match tx.send(queued) {
                Ok(()) => return PersistTicket(ticket),
                // Worker gone, start a new one below
                Err(mpsc::error::SendError(returned)) => queued = returned,
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(queued);
        workers.insert(conversation_id, tx.clone());
        tokio::spawn(run_worker(
            Worker {
                conversation_id,
                rx,
                own: tx,
                workers: self.workers.clone(),
            },
            self.vault.clone(),
            self.notifier.clone(),
            self.delay,
        ));
        PersistTicket(ticket)
    }

    /// Number of conversations with writes still queued or running.
    pub fn busy_conversations(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting writes for a conversation. Queued writes still run.
    pub fn forget(&self, conversation_id: Uuid) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.remove(&conversation_id);
    }
}

struct Worker {
    conversation_id: Uuid,
    rx: mpsc::UnboundedReceiver<QueuedJob>,
    own: mpsc::UnboundedSender<QueuedJob>,
    workers: Workers,
}

impl Worker {
    /// Next queued job. When the queue is empty the worker unregisters
    /// itself under the map lock, so no job can slip in after it is gone.
    fn next_job(&mut self) -> Option<QueuedJob> {
        if let Ok(queued) = self.rx.try_recv() {
            return Some(queued);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(queued) = self.rx.try_recv() {
            return Some(queued);
        }
        if workers
            .get(&self.conversation_id)
            .is_some_and(|tx| tx.same_channel(&self.own))
        {
            workers.remove(&self.conversation_id);
        }
        None
    }
}

async fn run_worker(
    mut worker: Worker,
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    delay: Duration,
) {
    let conversation_id = worker.conversation_id;
    while let Some(QueuedJob { job, done }) = worker.next_job() {
        tokio::time::sleep(delay).await;
        match write_job(vault.as_ref(), &job).await {
            Ok(()) => {
                tracing::debug!(conversation = %conversation_id, path = %job.note_path, "conversation saved");
            }
            Err(e) => {
                tracing::error!(conversation = %conversation_id, path = %job.note_path, "failed to save conversation: {}", e);
                notifier.notify(&format!("Could not save conversation: {}", e.user_message()));
            }
        }
        let _ = done.send(());
    }
    tracing::trace!(conversation = %conversation_id, "save queue drained");
}

async fn write_job(vault: &dyn Vault, job: &PersistJob) -> Result<(), PluginError> {
    if !vault.exists(&job.note_path).await {
        vault.create(&job.note_path, &job.header).await?;
    }
    vault.append(&job.note_path, &job.section).await
}

pub fn sanitize_file_name(name: &str) -> String {
    ILLEGAL_FILE_CHARS.replace_all(name.trim(), "-").into_owned()
}

pub fn note_title(created: DateTime<Local>) -> String {
    format!("Chat {}", created.format("%Y-%m-%d %H-%M-%S"))
}

/// Vault path of a new conversation note inside `folder`.
pub fn note_path(folder: &str, title: &str) -> String {
    let file = format!("{}.md", sanitize_file_name(title));
    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        file
    } else {
        format!("{}/{}", folder, file)
    }
}

pub fn note_header(conversation_id: Uuid, created: DateTime<Local>, model: &str) -> String {
    format!(
        "---\nconversation: {}\ncreated: {}\nmodel: {}\n---\n",
        conversation_id,
        created.to_rfc3339(),
        model
    )
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {}", line).trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Markdown section appended for one exchange.
pub fn format_turn(user: &Message, assistant: &Message) -> String {
    let mut section = format!("\n## User\n\n{}\n", user.content.trim_end());
    if let Some(selected) = user.selected_text.as_deref().filter(|s| !s.trim().is_empty()) {
        section.push_str(&format!("\n> [!quote] Selected text\n{}\n", quote(selected)));
    }

    let model = assistant.model.as_deref().unwrap_or("assistant");
    section.push_str(&format!(
        "\n## Assistant ({})\n\n{}\n",
        model,
        assistant.content.trim_end()
    ));
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FsVault;
    use chrono::TimeZone;

    struct SilentNotifier(Mutex<Vec<String>>);

    impl Notifier for SilentNotifier {
        fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn job(path: &str, section: &str) -> PersistJob {
        PersistJob {
            note_path: path.to_string(),
            header: "# header\n".to_string(),
            section: section.to_string(),
        }
    }

    #[tokio::test]
    async fn writes_for_one_conversation_keep_their_order() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(FsVault::new(tmp.path()));
        let notifier = Arc::new(SilentNotifier(Mutex::new(Vec::new())));
        let queue = PersistQueue::new(vault.clone(), notifier.clone()).with_delay(Duration::from_millis(1));
        let id = Uuid::new_v4();

        let tickets: Vec<PersistTicket> = (0..20)
            .map(|i| queue.schedule(id, job("chat.md", &format!("{}\n", i))))
            .collect();
        for ticket in tickets {
            ticket.wait().await;
        }

        let expected: String = (0..20).map(|i| format!("{}\n", i)).collect();
        assert_eq!(
            vault.read("chat.md").await.unwrap(),
            format!("# header\n{}", expected)
        );
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_reported_and_do_not_stop_the_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(FsVault::new(tmp.path()));
        let notifier = Arc::new(SilentNotifier(Mutex::new(Vec::new())));
        let queue = PersistQueue::new(vault.clone(), notifier.clone()).with_delay(Duration::ZERO);
        let id = Uuid::new_v4();

        queue.schedule(id, job("Missing/chat.md", "lost")).wait().await;
        queue.schedule(id, job("chat.md", "kept")).wait().await;

        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        assert!(notifier.0.lock().unwrap()[0].contains("Missing"));
        assert_eq!(vault.read("chat.md").await.unwrap(), "# header\nkept");
    }

    #[tokio::test]
    async fn forgotten_conversation_gets_a_fresh_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(FsVault::new(tmp.path()));
        let notifier = Arc::new(SilentNotifier(Mutex::new(Vec::new())));
        let queue = PersistQueue::new(vault.clone(), notifier).with_delay(Duration::ZERO);
        let id = Uuid::new_v4();

        let first = queue.schedule(id, job("a.md", "1"));
        queue.forget(id);
        first.wait().await;
        queue.schedule(id, job("a.md", "2")).wait().await;

        assert_eq!(vault.read("a.md").await.unwrap(), "# header\n12");
    }

    #[tokio::test]
    async fn drained_workers_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(FsVault::new(tmp.path()));
        let notifier = Arc::new(SilentNotifier(Mutex::new(Vec::new())));
        let queue = PersistQueue::new(vault.clone(), notifier).with_delay(Duration::ZERO);

        for name in ["a.md", "b.md", "c.md"] {
            queue.schedule(Uuid::new_v4(), job(name, "x")).wait().await;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while queue.busy_conversations() > 0 {
            assert!(tokio::time::Instant::now() < deadline, "workers still registered");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // A later write for the same conversation still lands after the earlier ones
        let id = Uuid::new_v4();
        queue.schedule(id, job("d.md", "1")).wait().await;
        queue.schedule(id, job("d.md", "2")).wait().await;
        assert_eq!(vault.read("d.md").await.unwrap(), "# header\n12");
    }

    #[test]
    fn note_paths_are_sanitized() {
        assert_eq!(note_path("Chats/", "What is a: b?"), "Chats/What is a- b-.md");
        assert_eq!(note_path("", "Chat"), "Chat.md");

        let created = Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 3).unwrap();
        assert_eq!(note_title(created), "Chat 2026-10-16 09-05-03");
    }

    #[test]
    fn turn_section_quotes_the_selection() {
        let user = Message::user("Explain this", Some("line one\n\nline two".to_string()));
        let assistant = Message::assistant("It means...\n", "gpt-4o-mini");

        assert_eq!(
            format_turn(&user, &assistant),
            "\n## User\n\nExplain this\n\
             \n> [!quote] Selected text\n> line one\n>\n> line two\n\
             \n## Assistant (gpt-4o-mini)\n\nIt means...\n"
        );
    }
}
