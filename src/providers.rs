//! Provider identities and their request/response dialects.
//!
//! Every vendor the dispatch layer can reach is a variant of [`ProviderId`]. Each
//! variant owns a static [`Dialect`]: the capability table entry that describes
//! where the vendor lives, how it authenticates, and, per supported task, how a
//! vendor-neutral [`CallArgs`](crate::tasks::CallArgs) is turned into a request
//! body and how the vendor's answer is turned back into the shape the
//! [normalizer](crate::normalize) expects.
//!
//! ## Dialects
//!
//! Most vendors speak some flavour of the OpenAI API. Those share the transforms
//! in `openai_compat` and only differ by base URL and route. The remaining vendors
//! (hf-inference, together, fal-ai, replicate) have their own modules with the
//! transforms that are specific to them.
//!
//! Dispatch never probes the shape of a payload at runtime to decide which vendor
//! it came from. The [`Dialect`] table is consulted instead.

mod dialect;
mod fal_ai;
mod hf_inference;
mod identifier;
mod openai_compat;
mod payload;
mod replicate;
mod together;

pub use dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
pub use identifier::ProviderId;
