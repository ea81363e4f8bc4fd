//! Inference dispatch for Hub models.
//!
//! `xinfer` lets a caller run an inference task (chat completion, text
//! generation, embeddings, image generation, ...) against a model without
//! knowing which vendor serves it. A call goes through the following stages:
//!
//! 1. The [`ModelResolver`](registry::ModelResolver) maps `(model, task,
//!    provider?)` onto a registry entry.
//! 2. The [`RequestBuilder`](request::RequestBuilder) turns the
//!    vendor-neutral [`CallArgs`] into the vendor's request, following the
//!    provider's [`Dialect`](providers::Dialect).
//! 3. A [`Transport`](transport::Transport) sends it.
//! 4. The answer is either [normalized](normalize) into a
//!    [`NormalizedResult`] or, for streamed calls, decoded into a
//!    [`ChunkStream`] of vendor-neutral deltas.
//!
//! Every failure is an [`Error`] whose [`ErrorKind`] is one of a fixed set.
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use xinfer::{CallArgs, ChatMessage, InferenceClient};
//!
//! # async fn run() -> xinfer::Result<()> {
//! let client = InferenceClient::builder()
//!     .access_token("hf_...")
//!     .build()
//!     .expect("failed to set up the transport");
//!
//! let args = CallArgs::chat(
//!     "meta-llama/Llama-3.3-70B-Instruct",
//!     vec![ChatMessage::user("What is the capital of France?")],
//! );
//!
//! let mut chunks = client.stream(&args, CancellationToken::new()).await?;
//!
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?.delta_text().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod hasher;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod request;
pub mod stream;
pub mod tasks;
pub mod transport;

pub use client::{ClientBuilder, InferenceClient};
pub use error::{Error, ErrorKind, Result};
pub use normalize::NormalizedResult;
pub use providers::ProviderId;
pub use stream::{ChunkStream, StreamChunk};
pub use tasks::{CallArgs, ChatMessage, Inputs, OutputType, Role, TaskKind};
