//! Caller-facing result shapes.
//!
//! Provider answers reach this module after the dialect output transform, so
//! every vendor's answer for a task already has the same canonical JSON shape
//! (or is a binary payload, or a URL). [`normalize`] turns that into a typed
//! [`NormalizedResult`]. It is pure: no I/O and no randomness.
//!
//! [`StreamAccumulator`] rebuilds the same result from a sequence of stream
//! chunks, so streamed and non-streamed calls can share one result type.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::providers::ProviderId;
use crate::stream::StreamChunk;
use crate::tasks::{OutputType, Role, TaskKind};

/// A provider answer, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    Json(Value),
    Binary { content_type: String, data: Bytes },
    /// A link to the result, hosted by the provider.
    Url(String),
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "nullable_string")]
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatCompletionMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// An OpenAI-compatible chat completion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl ChatCompletion {
    /// The content of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TextGeneration {
    pub generated_text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f64,
}

/// Embeddings of one input, a batch of inputs, or per-token embeddings of a
/// batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Embeddings {
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    Tensor(Vec<Vec<Vec<f64>>>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    ChatCompletion(ChatCompletion),
    TextGeneration(TextGeneration),
    /// Sorted by descending score.
    Classification(Vec<Classification>),
    Embeddings(Embeddings),
    Similarity(Vec<f64>),
    Transcription(Transcription),
    Blob { content_type: String, data: Bytes },
    Url(String),
}

/// Decodes a base64 `data:` URL into its content type and payload.
pub fn decode_data_url(url: &str) -> Option<(String, Bytes)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let content_type = meta.strip_suffix(";base64")?;

    let content_type = if content_type.is_empty() {
        "application/octet-stream"
    } else {
        content_type
    };

    let data = BASE64.decode(data).ok()?;

    Some((content_type.to_string(), Bytes::from(data)))
}

pub fn encode_data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(data))
}

fn classification(provider: ProviderId, value: Value) -> Result<Vec<Classification>> {
    let unexpected = || Error::unexpected_output(provider, "a list of labels and scores");

    let mut labels: Vec<Classification> = match value {
        // {sequence, labels: [...], scores: [...]}
        Value::Object(object) if object.contains_key("labels") => {
            let labels: Vec<String> = object
                .get("labels")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .ok_or_else(unexpected)?;
            let scores: Vec<f64> = object
                .get("scores")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .ok_or_else(unexpected)?;

            if labels.len() != scores.len() {
                return Err(unexpected());
            }

            labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| Classification { label, score })
                .collect()
        }
        // A batch of one: [[{label, score}, ...]]
        Value::Array(mut items) if items.first().is_some_and(Value::is_array) => {
            serde_json::from_value(items.swap_remove(0)).map_err(|_| unexpected())?
        }
        value => serde_json::from_value(value).map_err(|_| unexpected())?,
    };

    labels.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(labels)
}

fn json_result(task: TaskKind, provider: ProviderId, value: Value) -> Result<NormalizedResult> {
    fn parse<T: serde::de::DeserializeOwned>(
        provider: ProviderId,
        value: Value,
        expected: &str,
    ) -> Result<T> {
        serde_json::from_value(value).map_err(|_| Error::unexpected_output(provider, expected))
    }

    Ok(match task {
        TaskKind::Conversational => {
            NormalizedResult::ChatCompletion(parse(provider, value, "a chat completion")?)
        }
        TaskKind::TextGeneration => {
            NormalizedResult::TextGeneration(parse(provider, value, "generated text")?)
        }
        TaskKind::TextClassification | TaskKind::ZeroShotClassification => {
            NormalizedResult::Classification(classification(provider, value)?)
        }
        TaskKind::FeatureExtraction => {
            NormalizedResult::Embeddings(parse(provider, value, "embeddings")?)
        }
        TaskKind::SentenceSimilarity => {
            NormalizedResult::Similarity(parse(provider, value, "a list of similarity scores")?)
        }
        TaskKind::AutomaticSpeechRecognition => {
            NormalizedResult::Transcription(parse(provider, value, "a transcription")?)
        }
        TaskKind::TextToImage | TaskKind::TextToSpeech => {
            return Err(Error::unexpected_output(
                provider,
                format!("a binary {} result", task),
            ))
        }
    })
}

/// Maps a provider answer onto the result type of `task`.
///
/// A URL answer is only resolved here when it is a `data:` URL. Fetching a
/// remote URL is up to the caller.
pub fn normalize(
    task: TaskKind,
    provider: ProviderId,
    output: ProviderOutput,
    output_type: OutputType,
) -> Result<NormalizedResult> {
    match (output, output_type) {
        (ProviderOutput::Json(value), _) => json_result(task, provider, value),
        (ProviderOutput::Binary { content_type, data }, OutputType::Blob) => {
            Ok(NormalizedResult::Blob { content_type, data })
        }
        (ProviderOutput::Binary { content_type, data }, OutputType::Url) => {
            Ok(NormalizedResult::Url(encode_data_url(&content_type, &data)))
        }
        (ProviderOutput::Url(url), OutputType::Blob) => match decode_data_url(&url) {
            Some((content_type, data)) => Ok(NormalizedResult::Blob { content_type, data }),
            None => Ok(NormalizedResult::Url(url)),
        },
        (ProviderOutput::Url(url), OutputType::Url) => Ok(NormalizedResult::Url(url)),
    }
}

/// Folds stream chunks into the result the equivalent non-streamed call
/// would have produced.
#[derive(Debug)]
pub struct StreamAccumulator {
    task: TaskKind,
    choices: BTreeMap<u32, ChatCompletionChoice>,
    model: Option<String>,
    usage: Option<Value>,
    text: String,
}

impl StreamAccumulator {
    pub fn new(task: TaskKind) -> StreamAccumulator {
        StreamAccumulator {
            task,
            choices: BTreeMap::new(),
            model: None,
            usage: None,
            text: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::Chat(chunk) => {
                if chunk.model.is_some() {
                    self.model.clone_from(&chunk.model);
                }

                if chunk.usage.is_some() {
                    self.usage.clone_from(&chunk.usage);
                }

                for choice in &chunk.choices {
                    let entry = self
                        .choices
                        .entry(choice.index)
                        .or_insert_with(|| ChatCompletionChoice {
                            index: choice.index,
                            message: ChatCompletionMessage {
                                role: Role::Assistant,
                                content: String::new(),
                            },
                            finish_reason: None,
                        });

                    if let Some(role) = choice.delta.role {
                        entry.message.role = role;
                    }

                    if let Some(content) = &choice.delta.content {
                        entry.message.content.push_str(content);
                    }

                    if choice.finish_reason.is_some() {
                        entry.finish_reason.clone_from(&choice.finish_reason);
                    }
                }
            }
            StreamChunk::Text(chunk) => {
                if let Some(text) = chunk.delta_text() {
                    self.text.push_str(text);
                }
            }
        }
    }

    pub fn finish(self) -> NormalizedResult {
        match self.task {
            TaskKind::Conversational => NormalizedResult::ChatCompletion(ChatCompletion {
                choices: self.choices.into_values().collect(),
                model: self.model,
                usage: self.usage,
            }),
            _ => {
                // Chat chunks can also answer a text generation call.
                let text = if self.text.is_empty() {
                    self.choices
                        .into_values()
                        .next()
                        .map(|c| c.message.content)
                        .unwrap_or_default()
                } else {
                    self.text
                };

                NormalizedResult::TextGeneration(TextGeneration {
                    generated_text: text,
                })
            }
        }
    }
}
