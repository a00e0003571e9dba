pub mod builtin;
pub mod dispatcher;
pub mod persist;
pub mod prompt;
pub mod registry;

pub use dispatcher::FeatureDispatcher;
pub use registry::{FeatureRegistry, create_feature_registry};

use crate::config::CustomCommand;
use crate::conversation::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Where the response text of a feature goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    #[default]
    ConversationView,
    DocumentEditor,
}

/// Builds the request text from the user's input.
pub type PromptBuilder = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// Template note a custom command reads its instructions from.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSource {
    pub path: String,
    pub send_selected_text: bool,
    pub prompt_before_run: bool,
}

/// Registry entry describing how one feature builds and routes a request.
#[derive(Clone)]
pub struct FeatureDescriptor {
    pub id: String,
    pub title: String,
    pub prompt_builder: PromptBuilder,
    pub destination: Destination,
    pub streaming: bool,
    /// Falls back to the configured model when `None`
    pub model: Option<String>,
    /// Falls back to the configured temperature when `None`
    pub temperature: Option<f32>,
    pub template: Option<TemplateSource>,
}

impl FeatureDescriptor {
    pub fn new<F>(id: &str, title: &str, destination: Destination, prompt_builder: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            prompt_builder: Arc::new(prompt_builder),
            destination,
            streaming: true,
            model: None,
            temperature: None,
            template: None,
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn from_custom_command(command: &CustomCommand) -> Self {
        let mut descriptor = Self::new(
            &command.feature_id(),
            &command.name,
            command.destination,
            |input: Option<&str>| input.unwrap_or_default().to_string(),
        );
        descriptor.model = command.model_id.clone();
        descriptor.template = Some(TemplateSource {
            path: command.template_path(),
            send_selected_text: command.send_selected_text,
            prompt_before_run: command.prompt_before_run,
        });
        descriptor
    }

    pub fn build_prompt(&self, input: Option<&str>) -> String {
        (self.prompt_builder)(input)
    }
}

impl fmt::Debug for FeatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureDescriptor")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("streaming", &self.streaming)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// One user action resolved to a feature.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub feature_id: String,
    pub input_text: Option<String>,
    pub selected_text: Option<String>,
}

impl Invocation {
    pub fn new(feature_id: &str) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            ..Self::default()
        }
    }

    pub fn input(mut self, text: impl Into<String>) -> Self {
        self.input_text = Some(text.into());
        self
    }

    pub fn selection(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Cancelled,
    Failed,
}

/// Updates for the presentation layer, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A user message or an (empty) assistant placeholder joined the view
    MessageAdded(Message),
    Delta { message_id: Uuid, text: String },
    /// The request is over; input controls can be re-enabled
    StreamEnded {
        message_id: Option<Uuid>,
        status: StreamStatus,
    },
}

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

/// Result of one feature invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed { text: String },
    /// Stopped by the user; `text` is what arrived before that
    Cancelled { text: String },
    /// The user dismissed a dialog the feature needed
    Dismissed,
    /// Reported through the notifier
    Failed { message: String },
}
