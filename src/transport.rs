//! The HTTP seam.
//!
//! A [`Transport`] sends an [`HttpRequest`] and hands back the status, the
//! content type and the body as a byte stream. It knows nothing about
//! providers, tasks or payloads. Tests swap in their own implementation.

mod error;
mod http;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::request::HttpRequest;

pub use error::{Error, ErrorKind};
pub use http::ReqwestTransport;

/// A response body, delivered in whatever pieces the connection produces.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl Response {
    /// A response whose body is already in memory.
    pub fn from_bytes<B: Into<Bytes>>(status: u16, content_type: Option<&str>, body: B) -> Response {
        let body: Bytes = body.into();

        Response {
            status,
            content_type: content_type.map(str::to_string),
            body: Box::pin(stream::once(async move { Ok(body) })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The media type, without parameters such as `charset`.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|content_type| {
            content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Reads the whole body.
    pub async fn bytes(mut self, cancel: &CancellationToken) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                next = self.body.next() => next,
            };

            match next {
                Some(chunk) => buf.extend_from_slice(&chunk?),
                None => return Ok(buf.freeze()),
            }
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`. Resolves once the status and headers have arrived.
    /// Dropping the returned future, or cancelling `cancel`, aborts the
    /// request.
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<Response, Error>;
}
