//! Transport failures, classified so callers can match on them without
//! depending on the HTTP client's error type.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectFailed,
    /// The body could not be read or decoded.
    DecodingFailed,
    RedirectPolicyViolated,
    TimedOut,
    /// The caller's cancellation token fired.
    Cancelled,
    UnknownTransportError,
}

impl ErrorKind {
    fn describe(self) -> &'static str {
        match self {
            ErrorKind::ConnectFailed => "connection failed",
            ErrorKind::DecodingFailed => "failed to read the response body",
            ErrorKind::RedirectPolicyViolated => "redirect policy violated",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::UnknownTransportError => "unknown transport error",
        }
    }
}

fn classify(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::TimedOut
    } else if err.is_connect() {
        ErrorKind::ConnectFailed
    } else if err.is_redirect() {
        ErrorKind::RedirectPolicyViolated
    } else if err.is_decode() || err.is_body() {
        ErrorKind::DecodingFailed
    } else {
        ErrorKind::UnknownTransportError
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub fn cancelled() -> Error {
        Error::from_kind(ErrorKind::Cancelled)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            kind: classify(&err),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.describe())?;

        // reqwest messages include the URL
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_without_source() {
        let err = Error::cancelled();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.to_string(), "cancelled");
        assert!(err.source().is_none());
    }

    #[tokio::test]
    async fn reqwest_errors_are_classified() {
        // Nothing listens on the discard port
        let err = reqwest::get("http://127.0.0.1:9/").await.unwrap_err();

        let err = Error::from(err);

        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert!(err.to_string().starts_with("connection failed ("));
        assert!(err.source().is_some());
    }
}
