use std::collections::HashMap;

use futures_core::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::chunk::{ChatCompletionChunk, ChunkChoice, Delta, StreamChunk, TextGenerationChunk, Token};
use super::frame_parser::FrameParser;
use crate::classify;
use crate::error::{Error, Result};
use crate::normalize::{NormalizedResult, StreamAccumulator};
use crate::providers::{ProviderId, StreamStyle};
use crate::tasks::{Role, TaskKind};
use crate::transport::ByteStream;

#[derive(Deserialize, Debug, Default)]
struct WireMessage {
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: Option<WireMessage>,
    /// Some vendors repeat the whole message so far instead of a delta.
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireChoices {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct WireTokenEvent {
    #[serde(default)]
    token: Option<Token>,
    #[serde(default)]
    generated_text: Option<String>,
}

/// The part of `full` that was not emitted yet.
fn unseen<'a>(emitted: &str, full: &'a str) -> &'a str {
    full.strip_prefix(emitted).unwrap_or(full)
}

/// A pull-based sequence of [`StreamChunk`]s decoded from a streamed
/// response.
///
/// The sequence is single-pass. It ends after the first error, after the
/// vendor's terminal frame, or when the body ends. Once the cancellation token
/// fires, the next pull yields [`Error::Cancelled`] and nothing after it.
pub struct ChunkStream {
    provider: ProviderId,
    task: TaskKind,
    style: StreamStyle,
    frames: Option<FrameParser<ByteStream>>,
    failure: Option<Error>,
    cancel: CancellationToken,
    // Text emitted so far, per choice index
    emitted: HashMap<u32, String>,
    // Text emitted so far, for token and completion streams
    text: String,
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("provider", &self.provider)
            .field("task", &self.task)
            .field("style", &self.style)
            .field("open", &self.frames.is_some())
            .finish_non_exhaustive()
    }
}

impl ChunkStream {
    pub fn new(
        provider: ProviderId,
        task: TaskKind,
        style: StreamStyle,
        frames: FrameParser<ByteStream>,
        cancel: CancellationToken,
    ) -> ChunkStream {
        ChunkStream {
            provider,
            task,
            style,
            frames: Some(frames),
            failure: None,
            cancel,
            emitted: HashMap::new(),
            text: String::new(),
        }
    }

    /// A sequence whose only item is `err`.
    pub fn failed(provider: ProviderId, task: TaskKind, err: Error) -> ChunkStream {
        ChunkStream {
            provider,
            task,
            style: StreamStyle::Unsupported,
            frames: None,
            failure: Some(err),
            cancel: CancellationToken::new(),
            emitted: HashMap::new(),
            text: String::new(),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// The next chunk, an error, or `None` once the sequence ended.
    pub async fn next(&mut self) -> Option<Result<StreamChunk>> {
        if let Some(err) = self.failure.take() {
            return Some(Err(err));
        }

        self.frames.as_ref()?;

        if self.cancel.is_cancelled() {
            // Drops whatever the parser buffered along with the connection
            self.frames = None;
            return Some(Err(Error::Cancelled));
        }

        loop {
            let frames = self.frames.as_mut()?;

            let frame = match frames.parse::<Value>().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    self.frames = None;
                    return Some(Err(err.into()));
                }
                None => {
                    self.frames = None;
                    return None;
                }
            };

            trace!(provider = %self.provider, %frame, "decoded frame");

            match self.decode(frame) {
                // The token may have fired while the frame was decoded
                Ok(Some(_)) if self.cancel.is_cancelled() => {
                    self.frames = None;
                    return Some(Err(Error::Cancelled));
                }
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => continue,
                Err(err) => {
                    self.frames = None;
                    return Some(Err(err));
                }
            }
        }
    }

    /// Drains the sequence into the result the equivalent non-streamed call
    /// would have returned.
    pub async fn collect_result(mut self) -> Result<NormalizedResult> {
        let mut accumulator = StreamAccumulator::new(self.task);

        while let Some(chunk) = self.next().await {
            accumulator.push(&chunk?);
        }

        Ok(accumulator.finish())
    }

    /// Adapts the sequence to a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamChunk>> + Send {
        futures_util::stream::unfold(self, |mut chunks| async move {
            chunks.next().await.map(|item| (item, chunks))
        })
    }

    fn malformed(&self, expected: &str, err: serde_json::Error) -> Error {
        Error::MalformedStreamChunk {
            message: format!("{} sent a frame which is not {}", self.provider, expected),
            source: Some(Box::new(err)),
        }
    }

    fn decode(&mut self, frame: Value) -> Result<Option<StreamChunk>> {
        if let Some(err) = classify::embedded(self.provider, &frame) {
            return Err(err);
        }

        match self.style {
            StreamStyle::ChatDeltas => self.decode_chat(frame),
            StreamStyle::CompletionText => self.decode_completion(frame),
            StreamStyle::TokenEvents => self.decode_tokens(frame),
            StreamStyle::Unsupported => Err(Error::invalid_arguments(format!(
                "{} cannot be streamed from {}",
                self.task, self.provider
            ))),
        }
    }

    fn decode_chat(&mut self, frame: Value) -> Result<Option<StreamChunk>> {
        let wire: WireChoices =
            serde_json::from_value(frame).map_err(|e| self.malformed("a chat completion chunk", e))?;

        if wire.choices.is_empty() && wire.usage.is_none() {
            return Ok(None);
        }

        let mut choices = Vec::with_capacity(wire.choices.len());

        for choice in wire.choices {
            let emitted = self.emitted.entry(choice.index).or_default();

            let (role, content) = match (choice.delta, choice.message) {
                (Some(delta), _) if delta.content.is_some() || delta.role.is_some() => {
                    if let Some(content) = &delta.content {
                        emitted.push_str(content);
                    }

                    (delta.role, delta.content)
                }
                (_, Some(message)) => {
                    let content = message.content.map(|full| {
                        let delta = unseen(emitted, &full).to_string();
                        *emitted = full;
                        delta
                    });

                    (message.role, content.filter(|delta| !delta.is_empty()))
                }
                _ => (None, None),
            };

            choices.push(ChunkChoice {
                index: choice.index,
                delta: Delta {
                    role: role.and_then(|role| serde_json::from_value::<Role>(role).ok()),
                    content,
                },
                finish_reason: choice.finish_reason,
            });
        }

        Ok(Some(StreamChunk::Chat(ChatCompletionChunk {
            choices,
            model: wire.model,
            usage: wire.usage,
        })))
    }

    fn decode_completion(&mut self, frame: Value) -> Result<Option<StreamChunk>> {
        let wire: WireChoices =
            serde_json::from_value(frame).map_err(|e| self.malformed("a completion chunk", e))?;

        let Some(choice) = wire.choices.into_iter().next() else {
            return Ok(None);
        };

        let text = choice.text.unwrap_or_default();
        self.text.push_str(&text);

        let generated_text = choice.finish_reason.map(|_| self.text.clone());

        Ok(Some(StreamChunk::Text(TextGenerationChunk {
            token: Token {
                id: None,
                text,
                special: false,
            },
            generated_text,
        })))
    }

    fn decode_tokens(&mut self, frame: Value) -> Result<Option<StreamChunk>> {
        let wire: WireTokenEvent =
            serde_json::from_value(frame).map_err(|e| self.malformed("a token event", e))?;

        match (wire.token, wire.generated_text) {
            (Some(token), generated_text) => {
                if !token.special {
                    self.text.push_str(&token.text);
                }

                Ok(Some(StreamChunk::Text(TextGenerationChunk {
                    token,
                    generated_text,
                })))
            }
            // Only the text so far, without tokens
            (None, Some(full)) => {
                let delta = unseen(&self.text, &full).to_string();
                self.text = full;

                if delta.is_empty() {
                    return Ok(None);
                }

                Ok(Some(StreamChunk::Text(TextGenerationChunk {
                    token: Token {
                        id: None,
                        text: delta,
                        special: false,
                    },
                    generated_text: None,
                })))
            }
            (None, None) => Err(Error::malformed_chunk(format!(
                "{} sent a token event without a token",
                self.provider
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::TextGeneration;
    use crate::stream::StreamFormat;
    use crate::transport;
    use crate::ErrorKind;
    use bytes::Bytes;
    use futures_util::{stream, StreamExt};

    fn body(chunk_size: usize, raw: &'static str) -> ByteStream {
        let chunks: Vec<std::result::Result<Bytes, transport::Error>> = raw
            .as_bytes()
            .chunks(chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Box::pin(stream::iter(chunks))
    }

    fn chunk_stream(
        chunk_size: usize,
        raw: &'static str,
        format: StreamFormat,
        style: StreamStyle,
        task: TaskKind,
        cancel: CancellationToken,
    ) -> ChunkStream {
        ChunkStream::new(
            ProviderId::Together,
            task,
            style,
            FrameParser::new(body(chunk_size, raw), format, cancel.clone()),
            cancel,
        )
    }

    async fn deltas(chunks: &mut ChunkStream) -> Vec<String> {
        let mut deltas = Vec::new();

        while let Some(chunk) = chunks.next().await {
            if let Some(text) = chunk.unwrap().delta_text() {
                deltas.push(text.to_string());
            }
        }

        deltas
    }

    const CHAT_SSE: &str = r#"data: {"id":"1","model":"llama","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}

data: {"id":"1","model":"llama","choices":[{"index":0,"delta":{"content":"Hello"}}]}

data: {"id":"1","model":"llama","choices":[{"index":0,"delta":{"content":" world"},"finish_reason":null}]}

data: {"id":"1","model":"llama","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}

data: [DONE]

"#;

    const CUMULATIVE_SSE: &str = r#"data: {"choices":[{"index":0,"message":{"role":"assistant","content":"Hel"}}]}

data: {"choices":[{"index":0,"message":{"content":"Hello"}}]}

data: {"choices":[{"index":0,"message":{"content":"Hello world"}}]}

"#;

    const TOKENS_SSE: &str = r#"data:{"index":1,"token":{"id":450,"text":"The","logprob":-0.1,"special":false},"generated_text":null,"details":null}

data:{"index":2,"token":{"id":1234,"text":" answer","logprob":-0.2,"special":false},"generated_text":null,"details":null}

data:{"index":3,"token":{"id":2,"text":"</s>","logprob":0.0,"special":true},"generated_text":"The answer","details":null}

"#;

    const CUMULATIVE_NDJSON: &str = "{\"generated_text\":\"The\"}\n{\"generated_text\":\"The answer\"}\n";

    const COMPLETION_SSE: &str = r#"data: {"choices":[{"index":0,"text":"Par"}]}

data: {"choices":[{"index":0,"text":"is","finish_reason":"stop"}]}

data: [DONE]

"#;

    const MALFORMED_SSE: &str = r#"data: {"choices":[{"index":0,"delta":{"content":"Hello"}}]}

data: {"choices":[{"index":0,"delta":{"content":" wor

data: {"choices":[{"index":0,"delta":{"content":"ld"}}]}

"#;

    const ERROR_SSE: &str = r#"data: {"choices":[{"index":0,"delta":{"content":"Hello"}}]}

data: {"error":"Input validation error: inputs tokens + max_new_tokens must be <= 4096","error_type":"validation"}

data: {"choices":[{"index":0,"delta":{"content":" world"}}]}

"#;

    #[tokio::test]
    async fn chat_deltas() {
        for chunk_size in 1..=16 {
            let mut chunks = chunk_stream(
                chunk_size,
                CHAT_SSE,
                StreamFormat::Sse,
                StreamStyle::ChatDeltas,
                TaskKind::Conversational,
                CancellationToken::new(),
            );

            assert_eq!(deltas(&mut chunks).await.concat(), "Hello world");
            assert!(chunks.next().await.is_none());
        }
    }

    #[tokio::test]
    async fn cumulative_messages_become_deltas() {
        for chunk_size in 1..=16 {
            let mut chunks = chunk_stream(
                chunk_size,
                CUMULATIVE_SSE,
                StreamFormat::Sse,
                StreamStyle::ChatDeltas,
                TaskKind::Conversational,
                CancellationToken::new(),
            );

            assert_eq!(deltas(&mut chunks).await, vec!["Hel", "lo", " world"]);
        }
    }

    #[tokio::test]
    async fn token_events() {
        for chunk_size in 1..=16 {
            let chunks = chunk_stream(
                chunk_size,
                TOKENS_SSE,
                StreamFormat::Sse,
                StreamStyle::TokenEvents,
                TaskKind::TextGeneration,
                CancellationToken::new(),
            );

            assert_eq!(
                chunks.collect_result().await.unwrap(),
                NormalizedResult::TextGeneration(TextGeneration {
                    generated_text: "The answer".to_string()
                })
            );
        }
    }

    #[tokio::test]
    async fn cumulative_generated_text_becomes_deltas() {
        for chunk_size in 1..CUMULATIVE_NDJSON.len() {
            let mut chunks = chunk_stream(
                chunk_size,
                CUMULATIVE_NDJSON,
                StreamFormat::Ndjson,
                StreamStyle::TokenEvents,
                TaskKind::TextGeneration,
                CancellationToken::new(),
            );

            assert_eq!(deltas(&mut chunks).await, vec!["The", " answer"]);
        }
    }

    #[tokio::test]
    async fn completion_text() {
        let mut chunks = chunk_stream(
            7,
            COMPLETION_SSE,
            StreamFormat::Sse,
            StreamStyle::CompletionText,
            TaskKind::TextGeneration,
            CancellationToken::new(),
        );

        let first = chunks.next().await.unwrap().unwrap();
        assert_eq!(first.delta_text(), Some("Par"));

        let StreamChunk::Text(last) = chunks.next().await.unwrap().unwrap() else {
            panic!("expected a text chunk");
        };
        assert_eq!(last.token.text, "is");
        assert_eq!(last.generated_text.as_deref(), Some("Paris"));

        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_frames_end_the_sequence() {
        for chunk_size in 1..=16 {
            let mut chunks = chunk_stream(
                chunk_size,
                MALFORMED_SSE,
                StreamFormat::Sse,
                StreamStyle::ChatDeltas,
                TaskKind::Conversational,
                CancellationToken::new(),
            );

            assert!(chunks.next().await.unwrap().is_ok());

            let err = chunks.next().await.unwrap().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedStreamChunk);

            assert!(chunks.next().await.is_none());
        }
    }

    #[tokio::test]
    async fn embedded_errors_are_classified() {
        let mut chunks = chunk_stream(
            32,
            ERROR_SSE,
            StreamFormat::Sse,
            StreamStyle::ChatDeltas,
            TaskKind::Conversational,
            CancellationToken::new(),
        );

        assert!(chunks.next().await.unwrap().is_ok());

        let err = chunks.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamValidationError);
        assert!(err.to_string().contains("must be <= 4096"));

        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_after_n_chunks() {
        for n in 0..3 {
            let cancel = CancellationToken::new();
            let mut chunks = chunk_stream(
                1024,
                CHAT_SSE,
                StreamFormat::Sse,
                StreamStyle::ChatDeltas,
                TaskKind::Conversational,
                cancel.clone(),
            );

            for _ in 0..n {
                assert!(chunks.next().await.unwrap().is_ok());
            }

            cancel.cancel();

            let err = chunks.next().await.unwrap().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Cancelled);
            assert!(chunks.next().await.is_none());
        }
    }

    #[tokio::test]
    async fn cancellation_while_reading_drops_buffered_frames() {
        let cancel = CancellationToken::new();
        let fired = cancel.clone();

        // The whole body arrives in one read, and the token fires as it does
        let body: ByteStream = Box::pin(
            stream::iter(vec![Ok::<_, transport::Error>(Bytes::from_static(CHAT_SSE.as_bytes()))])
                .inspect(move |_| fired.cancel()),
        );

        let mut chunks = ChunkStream::new(
            ProviderId::Together,
            TaskKind::Conversational,
            StreamStyle::ChatDeltas,
            FrameParser::new(body, StreamFormat::Sse, cancel.clone()),
            cancel,
        );

        let err = chunks.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn failed_streams_yield_their_error_first() {
        let err = classify::from_status(
            ProviderId::Together,
            422,
            Some("application/json"),
            br#"{"error":{"message":"max_tokens is too large"}}"#,
        );

        let mut chunks = ChunkStream::failed(ProviderId::Together, TaskKind::Conversational, err);

        let err = chunks.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamValidationError);
        assert!(err.to_string().contains("max_tokens is too large"));

        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn as_a_stream() {
        let chunks = chunk_stream(
            5,
            CHAT_SSE,
            StreamFormat::Sse,
            StreamStyle::ChatDeltas,
            TaskKind::Conversational,
            CancellationToken::new(),
        );

        let items: Vec<Result<StreamChunk>> = chunks.into_stream().collect().await;

        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|item| item.is_ok()));
    }
}
