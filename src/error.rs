//! Error taxonomy for query compilation and execution.
//!
//! Every failure a caller can observe is a [`QueryError`]. The classified
//! variants carry an [`Origin`] naming the public entry point that raised them,
//! so a failed `Resilient::transaction` reads differently from a failed
//! `Connection::update` without any stack inspection.

use std::fmt;

use thiserror::Error;

use crate::driver::{DriverFailure, FailureKind};

/// Call site that triggered an error, e.g. `Resilient::transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub component: &'static str,
    pub operation: &'static str,
}

impl Origin {
    pub const fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.component, self.operation)
    }
}

/// Errors surfaced by connections and the retry layer.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Malformed structured-query input. Never retried.
    #[error("{origin}: invalid option: {message}")]
    InvalidOption { origin: Origin, message: String },

    /// Deadlock or lock-wait timeout that outlived the lock retry schedule.
    #[error("{origin}: lock retries exhausted: {source}")]
    Lock {
        origin: Origin,
        source: DriverFailure,
    },

    /// Connection loss that outlived the connection retry schedule.
    #[error("{origin}: connection could not be re-established: {source}")]
    Connection {
        origin: Origin,
        source: DriverFailure,
    },

    /// Non-transient SQL or driver failure.
    #[error("{origin}: driver error: {source}")]
    Driver {
        origin: Origin,
        source: DriverFailure,
    },

    /// Driver failure that has not been through the retry layer yet.
    #[error(transparent)]
    Raw(#[from] DriverFailure),

    /// Error raised by caller code inside a transaction body.
    #[error("{0}")]
    Callback(Box<dyn std::error::Error + Send + Sync>),
}

impl QueryError {
    pub fn invalid(origin: Origin, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            origin,
            message: message.into(),
        }
    }

    /// Wrap an application error so it passes through the retry layer untouched.
    pub fn callback(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Callback(err.into())
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::InvalidOption { origin, .. }
            | Self::Lock { origin, .. }
            | Self::Connection { origin, .. }
            | Self::Driver { origin, .. } => Some(*origin),
            Self::Raw(_) | Self::Callback(_) => None,
        }
    }

    /// Kind of an unclassified driver failure, if this is one.
    pub fn raw_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Raw(failure) => Some(failure.kind),
            _ => None,
        }
    }

    pub fn is_invalid_option(&self) -> bool {
        matches!(self, Self::InvalidOption { .. })
    }
}

/// Validation failure produced by the pure query compiler.
///
/// The compiler does not know which public operation invoked it; the caller
/// attaches that with [`InvalidOption::at`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidOption(pub String);

impl InvalidOption {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn at(self, origin: Origin) -> QueryError {
        QueryError::InvalidOption {
            origin,
            message: self.0,
        }
    }
}

impl From<InvalidOption> for QueryError {
    fn from(err: InvalidOption) -> Self {
        err.at(Origin::new("StructuredQuery", "compile"))
    }
}
