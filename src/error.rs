//! Error types for pool operations.

use thiserror::Error;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single configuration field validation failure.
#[derive(Debug, Clone)]
pub struct FieldViolation {
    /// The field name (e.g. "min_idle").
    pub field: String,
    /// The constraint that was violated (e.g. "must not exceed max_total").
    pub constraint: String,
    /// The actual value that failed (as a string representation).
    pub actual: String,
}

impl FieldViolation {
    /// Create a new field violation.
    pub fn new(
        field: impl Into<String>,
        constraint: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            actual: actual.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} (got {})",
            self.field, self.constraint, self.actual
        )
    }
}

/// Errors produced by a [`crate::Pool`] or the factories it drives.
#[derive(Error, Debug)]
pub enum Error {
    /// The pool has been closed; no further borrows are accepted.
    #[error("pool is closed")]
    PoolClosed,

    /// `borrow` could not produce a resource: exhaustion, timeout, or a
    /// just-created resource that failed activation/validation.
    #[error("{message}")]
    NoSuchElement {
        /// Human-readable description of why no element was available.
        message: String,
        /// The underlying factory failure, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// `return`/`invalidate` referenced a resource the pool did not lend,
    /// or a resource that has already been returned once.
    #[error("{message}")]
    IllegalState {
        /// Human-readable description of the illegal state.
        message: String,
    },

    /// An argument passed to a pool operation was invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable description of the invalid argument.
        message: String,
    },

    /// `PoolConfig::validate()` rejected the configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Summary message.
        message: String,
        /// Individual field violations.
        violations: Vec<FieldViolation>,
    },

    /// A factory call failed in a way that must be rethrown rather than
    /// treated as "this resource is invalid, destroy and retry".
    #[error("fatal error from factory: {0}")]
    Fatal(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An ordinary (non-fatal) factory failure.
    #[error("factory error: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a [`Error::NoSuchElement`] with no cause.
    pub fn no_such_element(message: impl Into<String>) -> Self {
        Self::NoSuchElement {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`Error::NoSuchElement`] wrapping a factory cause.
    pub fn no_such_element_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NoSuchElement {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a [`Error::IllegalState`].
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Build a [`Error::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Build a [`Error::Configuration`] from a list of field violations.
    pub fn configuration(message: impl Into<String>, violations: Vec<FieldViolation>) -> Self {
        Self::Configuration {
            message: message.into(),
            violations,
        }
    }

    /// Wrap an ordinary factory error.
    pub fn factory(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(source))
    }

    /// Whether this error must be rethrown rather than swallowed and retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Whether retrying the same operation might succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoSuchElement { .. })
    }
}
