//! The registry maps Hub model identifiers to the providers that serve them.
//!
//! Each entry commits a `(model, provider)` pair to exactly one task and records
//! the provider's own identifier for the model. The registry is plain data: it
//! is loaded once (from the built-in table, a JSON document, or both) and is
//! read-only afterwards. Clients receive it explicitly, so tests and embedders
//! can inject whatever mapping they need.
//!
//! ## Resolution
//!
//! The [`ModelResolver`] turns a `(model, task, provider?)` triple into a
//! [`ResolvedTarget`]. When the caller names a provider, the exact entry is
//! used. Otherwise the live entries of the model are ranked by provider
//! "priority", an eight bit unsigned number where 0 is a provider of last resort
//! and 255 is the most preferred. Providers with the same priority are ranked
//! by registration order, so resolution never depends on map iteration order.
//!
//! Providers that route on the client side (e.g. `openai`) are not in the
//! registry. Their models are named `"<provider>/<model>"` and resolve without
//! a lookup.

mod builtin;
mod default_priority;
pub(crate) mod populate;
#[allow(clippy::module_inception)]
mod registry;
mod resolver;

use std::path::PathBuf;

use thiserror::Error;

use crate::providers::ProviderId;

pub use default_priority::default_priority;
pub use registry::{EntryStatus, Registry, RegistryEntry};
pub use resolver::{ModelResolver, ResolvedTarget};

#[derive(Error, Debug)]
pub enum RegistryError {
    /// The registry document could not be read
    #[error("failed to read registry \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The registry document is not valid JSON, or an entry is malformed
    #[error("failed to parse registry")]
    Parse(
        #[from]
        #[source]
        serde_json::Error,
    ),
    /// The registry names a provider which does not exist
    #[error("provider \"{0}\" does not exist")]
    UnknownProvider(String),
    /// A `(model, provider)` pair was registered twice
    #[error("model \"{model}\" is registered twice for provider \"{provider}\"")]
    DuplicateEntry { model: String, provider: ProviderId },
}
