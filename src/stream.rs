//! Decoding of streamed responses.
//!
//! A streamed body goes through two stages. The [`FrameParser`] splits the
//! bytes into frames (newline-delimited JSON or server-sent events) without
//! reading ahead of what the caller pulls. The [`ChunkStream`] turns each
//! frame into a vendor-neutral [`StreamChunk`] according to the provider's
//! [`StreamStyle`](crate::providers::StreamStyle), so callers never special
//! case a vendor.

mod chunk;
mod decoder;
mod frame_parser;

use thiserror::Error;

use crate::transport;

pub use chunk::{ChatCompletionChunk, ChunkChoice, Delta, StreamChunk, TextGenerationChunk, Token};
pub use decoder::ChunkStream;
pub use frame_parser::{FrameParser, StreamFormat};

#[derive(Error, Debug)]
pub enum Error {
    #[error("a streamed frame exceeded the maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("failed to deserialize a streamed JSON object \"{blob}\": {source}")]
    DeserializationFailed {
        blob: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("the source stream failed: {0}")]
    StreamFailed(#[source] transport::Error),
    #[error("the stream was cancelled")]
    Cancelled,
}

impl From<Error> for crate::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::FrameTooLarge { .. } => crate::Error::malformed_chunk(value.to_string()),
            Error::DeserializationFailed { blob, source } => crate::Error::MalformedStreamChunk {
                message: format!("invalid JSON frame \"{}\"", blob),
                source: Some(Box::new(source)),
            },
            Error::StreamFailed(err) => err.into(),
            Error::Cancelled => crate::Error::Cancelled,
        }
    }
}
