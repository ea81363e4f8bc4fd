//! The vendor-neutral error taxonomy.
//!
//! Every failure surfaced by the dispatch layer is one of the variants of [`Error`].
//! Resolution and request construction errors are produced before any network
//! I/O. Transport and stream errors are produced at the point they are detected
//! and end the call (or the chunk sequence) they belong to.
//!
//! [`ErrorKind`] mirrors the variants without their payloads, so callers can branch
//! on the category of a failure without destructuring it.

use std::error::Error as StdError;
use std::fmt;

use crate::providers::ProviderId;
use crate::tasks::TaskKind;
use crate::transport;

/// General categories of errors returned by the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No registry entry serves the model for the requested task.
    ModelNotFound,
    /// The named provider does not serve the model for the requested task.
    ModelNotSupportedForProviderTask,
    /// The provider only accepts "<provider>/<model>" model identifiers.
    ProviderPrefixRequired,
    /// The call arguments are missing something the provider dialect requires.
    InvalidArguments,
    /// A streamed frame could not be decoded.
    MalformedStreamChunk,
    /// The provider rejected the inputs (HTTP 4xx or a validation error frame).
    UpstreamValidationError,
    /// The provider failed to serve the request, or answered with something
    /// that could not be understood.
    UpstreamServerError,
    /// The caller cancelled the call.
    Cancelled,
    /// The provider could not be reached.
    ConnectionError,
    /// The request timed out.
    Timeout,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Model {model} does not exist for task {task}")]
    ModelNotFound { model: String, task: TaskKind },

    #[error(
        "Model {model} is not supported for task {task} and provider {provider}.{}",
        SupportedTask(.supported)
    )]
    ModelNotSupportedForProviderTask {
        model: String,
        task: TaskKind,
        provider: ProviderId,
        /// The task the provider does serve the model for, if any.
        supported: Option<TaskKind>,
    },

    #[error("Models from {provider} must be prefixed by \"{provider}/\". Got \"{model}\".")]
    ProviderPrefixRequired { provider: ProviderId, model: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("malformed stream chunk: {message}")]
    MalformedStreamChunk {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("{provider} rejected the request: {message}")]
    UpstreamValidationError {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} failed to serve the request: {message}")]
    UpstreamServerError {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    #[error("the request was cancelled")]
    Cancelled,

    #[error("failed to connect to the provider: {0}")]
    ConnectionError(#[source] transport::Error),

    #[error("the request timed out: {0}")]
    Timeout(String),
}

struct SupportedTask<'t>(&'t Option<TaskKind>);

impl fmt::Display for SupportedTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(task) => write!(f, " Supported task: {}.", task),
            None => Ok(()),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Error::ModelNotSupportedForProviderTask { .. } => {
                ErrorKind::ModelNotSupportedForProviderTask
            }
            Error::ProviderPrefixRequired { .. } => ErrorKind::ProviderPrefixRequired,
            Error::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Error::MalformedStreamChunk { .. } => ErrorKind::MalformedStreamChunk,
            Error::UpstreamValidationError { .. } => ErrorKind::UpstreamValidationError,
            Error::UpstreamServerError { .. } => ErrorKind::UpstreamServerError,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::ConnectionError(_) => ErrorKind::ConnectionError,
            Error::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub(crate) fn invalid_arguments<S: Into<String>>(message: S) -> Error {
        Error::InvalidArguments(message.into())
    }

    pub(crate) fn malformed_chunk<S: Into<String>>(message: S) -> Error {
        Error::MalformedStreamChunk {
            message: message.into(),
            source: None,
        }
    }

    /// The provider answered, but not with the shape the task requires.
    pub(crate) fn unexpected_output<S: fmt::Display>(provider: ProviderId, expected: S) -> Error {
        Error::UpstreamServerError {
            provider,
            status: None,
            message: format!("unexpected response, expected {}", expected),
        }
    }
}

impl From<transport::Error> for Error {
    fn from(value: transport::Error) -> Self {
        match value.kind() {
            transport::ErrorKind::TimedOut => Error::Timeout(value.to_string()),
            transport::ErrorKind::Cancelled => Error::Cancelled,
            transport::ErrorKind::ConnectFailed
            | transport::ErrorKind::DecodingFailed
            | transport::ErrorKind::RedirectPolicyViolated
            | transport::ErrorKind::UnknownTransportError => Error::ConnectionError(value),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
