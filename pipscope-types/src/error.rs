use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the pipscope workspace.
///
/// Covers input and aggregation problems on the compute side as well as
/// transport failures from publication. Aggregates are used when several
/// independent units fail together.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipscopeError {
    /// Issues with the parsed or expected data (malformed rows, empty series).
    #[error("data issue: {0}")]
    Data(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A file, symbol, or remote page could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of missing resource, e.g. "5m candles for EURUSD 2024".
        what: String,
    },

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(String),

    /// CSV encoding or decoding failure.
    #[error("csv error: {0}")]
    Csv(String),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A timeframe key outside the supported set.
    #[error("unsupported timeframe: {key}")]
    UnsupportedTimeframe {
        /// The rejected key, e.g. "2h".
        key: String,
    },

    /// The remote store answered with a non-success status.
    #[error("http {status}: {msg}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        msg: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),

    /// Several independent units failed; contains the individual failures.
    #[error("all attempts failed: {0:?}")]
    AllFailed(Vec<PipscopeError>),
}

impl PipscopeError {
    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build an `Http` error from a status code and message.
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            msg: msg.into(),
        }
    }

    /// Helper: build an `UnsupportedTimeframe` error.
    pub fn unsupported_timeframe(key: impl Into<String>) -> Self {
        Self::UnsupportedTimeframe { key: key.into() }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Rate limiting (429), gateway failures (502, 503, 504) and transport
    /// errors are transient. Everything else, including authentication and
    /// malformed-request statuses, is permanent. Aggregates are transient only
    /// when every member is.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::Transport(_) => true,
            Self::AllFailed(inner) => !inner.is_empty() && inner.iter().all(Self::is_transient),
            _ => false,
        }
    }

    /// Returns true for missing-input conditions that calculators degrade to
    /// "no data" instead of reporting.
    #[must_use]
    pub const fn is_missing_input(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Flatten nested `AllFailed` structures into a plain vector.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}

impl From<std::io::Error> for PipscopeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(e.to_string())
        } else {
            Self::Io(e.to_string())
        }
    }
}

impl From<toml::de::Error> for PipscopeError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<csv::Error> for PipscopeError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
