use super::persist::{PersistJob, PersistQueue, format_turn, note_header, note_path, note_title};
use super::prompt::{PromptParts, compose_prompt, guidance_for, system_prompt};
use super::registry::{FeatureRegistry, create_feature_registry};
use super::{
    ChatEvent, Destination, EventSender, FeatureDescriptor, Invocation, Outcome, StreamStatus,
};
use crate::config::Settings;
use crate::conversation::{Conversation, Message};
use crate::core::error::PluginError;
use crate::host::{DocumentEditor, Notifier, Prompter, Vault};
use crate::providers::{ChatProvider, ChatRequest};
use crate::sink::{BUFFER_LIMIT, DocumentSink, OutputSink, ViewSink};
use crate::stream::{CancellationToken, StreamHandle};
use chrono::Local;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

enum Target<'e> {
    View,
    Document(&'e mut dyn DocumentEditor),
}

/// Resolves feature ids and drives one request from prompt to destination.
pub struct FeatureDispatcher {
    registry: FeatureRegistry,
    settings: Settings,
    provider: Arc<dyn ChatProvider>,
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    prompter: Arc<dyn Prompter>,
    persist: PersistQueue,
    events: EventSender,
}

impl FeatureDispatcher {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn ChatProvider>,
        vault: Arc<dyn Vault>,
        notifier: Arc<dyn Notifier>,
        prompter: Arc<dyn Prompter>,
        events: EventSender,
    ) -> Self {
        Self {
            registry: create_feature_registry(&settings.custom_commands),
            persist: PersistQueue::new(vault.clone(), notifier.clone()),
            settings,
            provider,
            vault,
            notifier,
            prompter,
            events,
        }
    }

    pub fn with_persist_delay(mut self, delay: Duration) -> Self {
        self.persist = self.persist.with_delay(delay);
        self
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply edited settings; custom commands are registered again.
    pub fn update_settings(&mut self, settings: Settings) {
        self.registry
            .register_custom_commands(&settings.custom_commands);
        self.settings = settings;
    }

    /// Discard the conversation shown in a view and start a new one.
    pub fn new_conversation(&self, conversation: &mut Conversation) {
        self.persist.forget(conversation.id());
        conversation.reset();
    }

    /// Run a feature and report any failure through the notifier.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        invocation: Invocation,
        editor: Option<&mut dyn DocumentEditor>,
    ) -> Outcome {
        let feature_id = invocation.feature_id.clone();
        match self.execute(conversation, invocation, editor).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(feature = %feature_id, "feature failed: {}", e);
                let message = e.user_message();
                self.notifier.notify(&message);
                Outcome::Failed { message }
            }
        }
    }

    /// Run a feature against a conversation.
    ///
    /// `editor` is required for features writing into a document. Unknown
    /// features and a missing API key fail before anything is awaited.
    pub async fn execute(
        &self,
        conversation: &mut Conversation,
        invocation: Invocation,
        editor: Option<&mut dyn DocumentEditor>,
    ) -> Result<Outcome, PluginError> {
        let feature = self
            .registry
            .get(&invocation.feature_id)
            .cloned()
            .ok_or_else(|| PluginError::UnknownFeature(invocation.feature_id.clone()))?;

        if self.settings.api_key().is_none() {
            return Err(PluginError::MissingCredential);
        }

        let target = match feature.destination {
            Destination::ConversationView => Target::View,
            Destination::DocumentEditor => {
                Target::Document(editor.ok_or(PluginError::NoActiveEditor)?)
            }
        };

        conversation.settle().await;

        let controller = conversation.controller();
        let request = controller.begin();
        let span = tracing::info_span!(
            "feature",
            feature = %feature.id,
            conversation = %conversation.id()
        );
        let result = self
            .run_feature(conversation, &feature, invocation, target, request.token())
            .instrument(span)
            .await;
        controller.end(&request);
        result
    }

    async fn run_feature(
        &self,
        conversation: &mut Conversation,
        feature: &FeatureDescriptor,
        invocation: Invocation,
        target: Target<'_>,
        token: &CancellationToken,
    ) -> Result<Outcome, PluginError> {
        let Invocation {
            mut input_text,
            mut selected_text,
            ..
        } = invocation;

        let mut template_text = None;
        if let Some(template) = &feature.template {
            if template.prompt_before_run && input_text.is_none() {
                match self.prompter.prompt_for_input(&feature.title).await {
                    Some(text) => input_text = Some(text),
                    None => return Ok(Outcome::Dismissed),
                }
            }

            let text = self.vault.read(&template.path).await.map_err(|e| {
                PluginError::TemplateRead {
                    path: template.path.clone(),
                    reason: e.to_string(),
                }
            })?;
            template_text = Some(text);
            if !template.send_selected_text {
                selected_text = None;
            }
        }

        let request_text = feature.build_prompt(input_text.as_deref());
        let content = PromptParts {
            input: Some(&request_text),
            template: template_text.as_deref(),
            selected: selected_text.as_deref(),
            guidance: None,
        };
        if compose_prompt(content).is_empty() {
            return Err(PluginError::EmptyPrompt);
        }
        let prompt = compose_prompt(PromptParts {
            guidance: guidance_for(feature.destination),
            ..content
        });

        if token.is_cancelled() {
            return Ok(Outcome::Cancelled {
                text: String::new(),
            });
        }

        let model = feature
            .model
            .clone()
            .unwrap_or_else(|| self.settings.model.clone());
        let temperature = feature.temperature.unwrap_or(self.settings.temperature);

        if conversation.buffer.is_empty() {
            let system = system_prompt(
                feature.destination,
                self.settings.persona.as_deref(),
                Local::now().date_naive(),
            );
            conversation.buffer.append(Message::system(system))?;
        }

        let user = Message::user(prompt, selected_text);
        conversation.buffer.append(user.clone())?;

        let placeholder = match target {
            Target::View => {
                self.emit(ChatEvent::MessageAdded(user.clone()));
                let id = conversation.buffer.open_assistant(&model)?;
                if let Some(message) = conversation.buffer.latest() {
                    self.emit(ChatEvent::MessageAdded(message.clone()));
                }
                Some(id)
            }
            Target::Document(_) => None,
        };

        let request = ChatRequest {
            model: model.clone(),
            messages: conversation.buffer.payload(),
            temperature,
            stream: feature.streaming,
        };
        tracing::info!(
            model = %model,
            streaming = feature.streaming,
            messages = request.messages.len(),
            "sending request"
        );

        let mut handle = StreamHandle::new(token.clone());
        let result = {
            let mut sink = match (placeholder, target) {
                (Some(id), _) => {
                    OutputSink::View(ViewSink::new(&mut conversation.buffer, id, &self.events))
                }
                (None, Target::Document(editor)) => {
                    OutputSink::Document(DocumentSink::new(editor, BUFFER_LIMIT))
                }
                (None, Target::View) => return Err(PluginError::NoActiveEditor),
            };
            let result = self.pump(feature, &request, &mut sink, &mut handle).await;
            sink.on_stream_end();
            result
        };

        if let Err(e) = &result {
            conversation.buffer.fail_open(&e.user_message());
        }
        let sealed = conversation.buffer.seal();
        self.emit(ChatEvent::StreamEnded {
            message_id: placeholder,
            status: match &result {
                Ok(status) => *status,
                Err(_) => StreamStatus::Failed,
            },
        });

        let status = result?;
        tracing::info!(status = ?status, chars = handle.text.chars().count(), "request finished");

        if let Some(assistant) = sealed.filter(|m| !m.content.is_empty()) {
            if self.settings.save_conversations {
                self.save_turn(conversation, &user, &assistant, &model).await;
            }
        }

        let text = handle.text;
        Ok(match status {
            StreamStatus::Completed => Outcome::Completed { text },
            _ => Outcome::Cancelled { text },
        })
    }

    /// Feed the response into `sink` until it ends or `handle` is cancelled.
    async fn pump(
        &self,
        feature: &FeatureDescriptor,
        request: &ChatRequest,
        sink: &mut OutputSink<'_>,
        handle: &mut StreamHandle,
    ) -> Result<StreamStatus, PluginError> {
        let token = handle.token.clone();

        if !feature.streaming {
            let text = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamStatus::Cancelled),
                response = self.provider.get_response(request) => response?,
            };
            handle.record(&text);
            sink.on_delta(&text);
            return Ok(StreamStatus::Completed);
        }

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamStatus::Cancelled),
            stream = self.provider.get_response_stream(request) => stream?,
        };

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!(received = handle.text.len(), "stream cancelled");
                    return Ok(StreamStatus::Cancelled);
                }
                next = stream.next() => match next {
                    // Everything decoded from one chunk is delivered, even
                    // if cancellation is raised partway through it.
                    Some(Ok(batch)) => {
                        for delta in &batch {
                            handle.record(delta);
                            sink.on_delta(delta);
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Ok(StreamStatus::Completed),
                },
            }
        }
    }

    async fn save_turn(
        &self,
        conversation: &mut Conversation,
        user: &Message,
        assistant: &Message,
        model: &str,
    ) {
        let path = match self.conversation_note(conversation).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                tracing::info!("no conversation folder chosen, not saving");
                return;
            }
            Err(e) => {
                tracing::error!("cannot save conversation: {}", e);
                self.notifier.notify(&e.user_message());
                return;
            }
        };

        let job = PersistJob {
            note_path: path,
            header: note_header(conversation.id(), conversation.created(), model),
            section: format_turn(user, assistant),
        };
        conversation.pending_persist = Some(self.persist.schedule(conversation.id(), job));
    }

    /// Note the conversation is saved to, chosen on its first save.
    async fn conversation_note(
        &self,
        conversation: &mut Conversation,
    ) -> Result<Option<String>, PluginError> {
        if let Some(path) = &conversation.note_path {
            return Ok(Some(path.clone()));
        }

        let folders = self.vault.list_folders().await?;
        let configured = self
            .settings
            .conversation_folder
            .as_deref()
            .map(|f| f.trim().trim_matches('/'))
            .filter(|f| !f.is_empty());
        let folder = match configured {
            Some(folder) => folder.to_string(),
            None => match self.prompter.prompt_for_folder(&folders).await {
                Some(folder) => folder.trim().trim_matches('/').to_string(),
                None => return Ok(None),
            },
        };
        if !folder.is_empty() && !folders.contains(&folder) {
            return Err(PluginError::FolderNotFound(folder));
        }

        let title = note_title(conversation.created());
        let mut path = note_path(&folder, &title);
        let mut n = 1;
        while self.vault.exists(&path).await {
            n += 1;
            path = note_path(&folder, &format!("{} ({})", title, n));
        }

        conversation.note_path = Some(path.clone());
        Ok(Some(path))
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }
}
