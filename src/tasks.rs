//! Vendor-neutral call arguments.
//!
//! A [`CallArgs`] describes what the caller wants done: the model, the task, the
//! inputs and free-form task parameters. It says nothing about which vendor will
//! serve the call or what the vendor's request looks like; that is decided by the
//! resolver and the request builder.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros;

use crate::providers::ProviderId;

/// The kind of inference operation.
///
/// The `to_string` and `FromStr` forms are the registry's task names and are
/// used on the command line, so they should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
pub enum TaskKind {
    #[strum(to_string = "conversational", serialize = "chat-completion")]
    #[serde(rename = "conversational", alias = "chat-completion")]
    Conversational,
    #[strum(serialize = "text-generation")]
    #[serde(rename = "text-generation")]
    TextGeneration,
    #[strum(serialize = "feature-extraction")]
    #[serde(rename = "feature-extraction")]
    FeatureExtraction,
    #[strum(serialize = "sentence-similarity")]
    #[serde(rename = "sentence-similarity")]
    SentenceSimilarity,
    #[strum(serialize = "text-classification")]
    #[serde(rename = "text-classification")]
    TextClassification,
    #[strum(serialize = "zero-shot-classification")]
    #[serde(rename = "zero-shot-classification")]
    ZeroShotClassification,
    #[strum(serialize = "text-to-image")]
    #[serde(rename = "text-to-image")]
    TextToImage,
    #[strum(serialize = "text-to-speech")]
    #[serde(rename = "text-to-speech")]
    TextToSpeech,
    #[strum(serialize = "automatic-speech-recognition")]
    #[serde(rename = "automatic-speech-recognition")]
    AutomaticSpeechRecognition,
}

impl TaskKind {
    /// Whether the task can be streamed as a sequence of text deltas.
    pub fn is_streamable(self) -> bool {
        matches!(self, TaskKind::Conversational | TaskKind::TextGeneration)
    }
}

/// The author of a [`ChatMessage`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a chat conversation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: Role, content: S) -> ChatMessage {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> ChatMessage {
        Self::new(Role::User, content)
    }

    pub fn system<S: Into<String>>(content: S) -> ChatMessage {
        Self::new(Role::System, content)
    }
}

/// The inputs of a call. Which variant a task accepts depends on the task and
/// on the provider dialect; a mismatch is reported as
/// [`crate::Error::InvalidArguments`].
#[derive(Debug, Clone, PartialEq)]
pub enum Inputs {
    /// A chat conversation.
    Messages(Vec<ChatMessage>),
    /// A single text input.
    Text(String),
    /// A batch of text inputs.
    Texts(Vec<String>),
    /// Raw binary input, e.g. audio for speech recognition.
    Binary {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Structured inputs, e.g. `{source_sentence, sentences}`.
    Json(Value),
}

/// How media outputs should be returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputType {
    /// The payload bytes with their content type.
    #[default]
    Blob,
    /// A URL pointing at the payload (vendor URL or `data:` URL).
    Url,
}

/// A vendor-neutral request.
#[derive(Debug, Clone)]
pub struct CallArgs {
    /// The model identifier. For client-side routed providers this is
    /// `"<provider>/<model>"`.
    pub model: String,
    /// An explicit provider, or `None` to let the resolver pick one.
    pub provider: Option<ProviderId>,
    pub task: TaskKind,
    pub inputs: Inputs,
    /// Task parameters, passed to the provider after dialect renames.
    pub parameters: Map<String, Value>,
    pub stream: bool,
    pub output_type: OutputType,
}

impl CallArgs {
    pub fn new<S: Into<String>>(model: S, task: TaskKind, inputs: Inputs) -> CallArgs {
        CallArgs {
            model: model.into(),
            provider: None,
            task,
            inputs,
            parameters: Map::new(),
            stream: false,
            output_type: OutputType::default(),
        }
    }

    pub fn chat<S: Into<String>>(model: S, messages: Vec<ChatMessage>) -> CallArgs {
        Self::new(model, TaskKind::Conversational, Inputs::Messages(messages))
    }

    pub fn text_generation<S: Into<String>, I: Into<String>>(model: S, inputs: I) -> CallArgs {
        Self::new(model, TaskKind::TextGeneration, Inputs::Text(inputs.into()))
    }

    pub fn provider(mut self, provider: ProviderId) -> CallArgs {
        self.provider = Some(provider);
        self
    }

    pub fn parameter<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> CallArgs {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> CallArgs {
        self.stream = stream;
        self
    }

    pub fn output_type(mut self, output_type: OutputType) -> CallArgs {
        self.output_type = output_type;
        self
    }
}
