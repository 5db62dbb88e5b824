//! Error types.

use std::fmt;
use std::sync::Arc;

use crate::id::SentenceId;
use crate::text::{Position, Span};

/// Errors raised by the document, scheduler and execution manager.
///
/// `UnknownSentence` and `UnknownTask` signal a broken invariant elsewhere in the pipeline: a
/// correct driver never observes them. The remaining variants reject malformed input from the
/// editor side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The sentence is not stored in the document.
    #[error("unknown sentence {0}")]
    UnknownSentence(SentenceId),

    /// The sentence has no task in the schedule.
    #[error("sentence {0} is not scheduled")]
    UnknownTask(SentenceId),

    /// The edit does not fit the current text.
    #[error("invalid edit {start}..{end} on text of length {len}")]
    InvalidEdit {
        /// Start offset of the edit.
        start: usize,
        /// End offset of the edit.
        end: usize,
        /// Length of the text.
        len: usize,
    },

    /// The position lies outside of the text.
    #[error("position {}:{} is outside of the text", .0.line, .0.character)]
    InvalidPosition(Position),
}

/// Result type for fallible operations of this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An execution failure reported by the backend.
///
/// The error is shared behind `Arc` so cached results stay cheap to clone. Any
/// `Into<anyhow::Error>` converts into an `ExecError` without a location, so backends can use `?`.
#[derive(Clone)]
pub struct ExecError {
    /// Location of the failure relative to the document, if the backend knows it.
    pub location: Option<Span>,
    /// The underlying error.
    pub error: Arc<anyhow::Error>,
}

impl ExecError {
    /// Create an error with a location.
    pub fn located(location: Span, error: impl Into<anyhow::Error>) -> Self {
        Self {
            location: Some(location),
            error: Arc::new(error.into()),
        }
    }

    /// The error message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl<T: Into<anyhow::Error>> From<T> for ExecError {
    fn from(err: T) -> Self {
        Self {
            location: None,
            error: Arc::new(err.into()),
        }
    }
}

impl fmt::Debug for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecError")
            .field("location", &self.location)
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl PartialEq for ExecError {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.message() == other.message()
    }
}
