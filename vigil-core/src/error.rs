//! Error Types
//!
//! Every fallible operation in the crate reports through [`ReactiveError`].
//!
//! Two classes of failure never surface here at all: defining a reactive slot
//! on a non-configurable property, and observing a non-extensible container.
//! Both are silent no-ops and leave the data as plain, non-reactive values.

use std::fmt;

use thiserror::Error;

use crate::reactive::WatcherId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Which reactive mutation helper produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Set,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Set => f.write_str("set"),
            MutationKind::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// `set` / `delete` invoked on undefined, null or a primitive.
    #[error("cannot {operation} reactive property on undefined, null, or primitive value: {target}")]
    InvalidTarget {
        operation: MutationKind,
        target: String,
    },

    /// A key that is not a valid array index was used on an array.
    #[error("invalid array index: {key}")]
    InvalidKey { key: String },

    /// Growing an array to reach an index failed to allocate.
    #[error("cannot grow array to {len} elements")]
    ArrayAllocation { len: usize },

    /// `set` / `delete` targeting a component's root data container.
    #[error(
        "avoid {operation} of reactive property \"{key}\" on a root data object at runtime; declare it upfront instead"
    )]
    RootMutation { operation: MutationKind, key: String },

    /// Raised by a watcher getter or callback.
    #[error("{0}")]
    Evaluation(String),

    /// A queued watcher failed during flush.
    #[error("error in watcher {id} \"{expression}\": {source}")]
    WatcherEvaluation {
        id: WatcherId,
        expression: String,
        #[source]
        source: Box<ReactiveError>,
    },

    /// A watcher kept re-queueing itself inside a single flush.
    #[error("you may have an infinite update loop in watcher \"{expression}\" (more than {limit} runs in one flush)")]
    CircularUpdate { expression: String, limit: u32 },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Convenience constructor for errors raised from user computations.
    pub fn evaluation(message: impl Into<String>) -> Self {
        ReactiveError::Evaluation(message.into())
    }
}

/// The outcome of a reactive mutation helper.
///
/// The mutation helpers never fail hard. When a call is refused or only
/// partially honored, the reason travels here and is also reported through
/// the diagnostic channel; callers that ignore it get the historical
/// warn-and-continue behavior.
#[derive(Debug)]
pub struct Diagnosed<T> {
    pub value: T,
    pub diagnostic: Option<ReactiveError>,
}

impl<T> Diagnosed<T> {
    pub(crate) fn clean(value: T) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    pub(crate) fn flagged(value: T, diagnostic: ReactiveError) -> Self {
        crate::config::report_warning(&diagnostic);
        Self {
            value,
            diagnostic: Some(diagnostic),
        }
    }

    /// True when no diagnostic was raised.
    pub fn is_clean(&self) -> bool {
        self.diagnostic.is_none()
    }

    pub fn diagnostic(&self) -> Option<&ReactiveError> {
        self.diagnostic.as_ref()
    }

    /// Turn a flagged outcome into an error.
    pub fn into_result(self) -> Result<T> {
        match self.diagnostic {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}
