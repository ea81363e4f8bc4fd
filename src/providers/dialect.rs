//! The capability table entry of a provider.

use crate::error::Result;
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, TaskKind};

use super::ProviderId;

/// Builds the vendor request body for a resolved call.
pub type PayloadFn = fn(&ResolvedTarget, &CallArgs) -> Result<RequestBody>;

/// Maps the vendor's answer onto the canonical output shape of the task.
pub type OutputFn = fn(&ResolvedTarget, ProviderOutput) -> Result<ProviderOutput>;

/// How requests reach the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// The provider is reachable through the Hub router and its models are
    /// registered in the registry.
    Hub,
    /// The provider is only reachable directly. Model identifiers must carry
    /// a `"<provider>/"` prefix and the registry is not consulted.
    ClientSide,
}

/// The scheme of the `Authorization` header when calling a provider directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    Bearer,
    Key,
}

impl KeyScheme {
    pub fn header_value(self, token: &str) -> String {
        match self {
            KeyScheme::Bearer => format!("Bearer {}", token),
            KeyScheme::Key => format!("Key {}", token),
        }
    }
}

/// The path of a task endpoint, relative to the provider base URL.
#[derive(Clone, Copy)]
pub enum Route {
    Fixed(&'static str),
    /// The path depends on the vendor model identifier.
    Model(fn(&ResolvedTarget) -> String),
}

impl Route {
    pub fn path(&self, target: &ResolvedTarget) -> String {
        match self {
            Route::Fixed(path) => path.to_string(),
            Route::Model(route) => route(target),
        }
    }
}

/// How a streamed response carries its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStyle {
    /// OpenAI chat chunks, `choices[].delta.content`.
    ChatDeltas,
    /// OpenAI completion chunks, `choices[].text`.
    CompletionText,
    /// Text-generation-inference events, `token.text` with a final
    /// `generated_text`.
    TokenEvents,
    /// The task cannot be streamed on this provider.
    Unsupported,
}

/// How a single task is served by a provider.
#[derive(Clone, Copy)]
pub struct TaskDialect {
    pub task: TaskKind,
    pub route: Route,
    pub payload: PayloadFn,
    pub output: OutputFn,
    pub stream: StreamStyle,
}

/// Everything the dispatch layer needs to know about a provider.
pub struct Dialect {
    pub provider: ProviderId,
    /// Used when calling the provider directly with its own key.
    pub base_url: &'static str,
    pub routing: Routing,
    pub key_scheme: KeyScheme,
    /// Extra headers sent with every request. Names must be lowercase.
    pub headers: &'static [(&'static str, &'static str)],
    pub tasks: &'static [TaskDialect],
}

impl Dialect {
    pub fn task(&self, task: TaskKind) -> Option<&TaskDialect> {
        self.tasks.iter().find(|t| t.task == task)
    }

    pub fn supports(&self, task: TaskKind) -> bool {
        self.task(task).is_some()
    }

    pub fn is_prefix_required(&self) -> bool {
        self.routing == Routing::ClientSide
    }
}
