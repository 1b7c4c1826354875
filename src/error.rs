//! Error types for streams and tasks.
//!
//! A traversal surfaces at most one [`StreamError`] per terminal call. The
//! error carries a primary message, the lifecycle phase it came from, and an
//! ordered list of *suppressed* secondary errors: failures raised by cleanup
//! (release effects, finalizers) while the primary termination was being
//! handled. Cleanup failures are never silently dropped — each one is either
//! the primary error or attached to it.
//!
//! # Examples
//!
//! ```rust
//! use rill::error::{ErrorKind, StreamError};
//!
//! let mut error = StreamError::production("io-error");
//! error.suppress(StreamError::release("close-error"));
//!
//! assert_eq!(error.message(), "io-error");
//! assert_eq!(error.kind(), ErrorKind::Production);
//! assert_eq!(error.suppressed().len(), 1);
//! assert_eq!(error.suppressed()[0].message(), "close-error");
//! ```

/// The lifecycle phase a [`StreamError`] originated from.
///
/// Each variant identifies which part of the acquire/produce/release cycle
/// failed, so callers can distinguish "the data source broke" from "cleanup
/// broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The acquire effect of a bracket failed. Nothing was acquired, so no
    /// release was attempted.
    Acquisition,
    /// An element-producing step failed mid-stream. Release and finalizers
    /// run before this error propagates.
    Production,
    /// The release effect of a bracket failed.
    Release,
    /// A finalizer attached via `on_finalize` failed.
    Finalizer,
}

impl ErrorKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Production => "production",
            Self::Release => "release",
            Self::Finalizer => "finalizer",
        }
    }
}

/// An error surfaced by running a stream or task.
///
/// Holds one primary message plus any secondary errors raised by cleanup
/// while the primary termination was being handled. The primary is always
/// the first failure on the critical path; cleanup failures are demoted to
/// the suppressed list — unless the path was otherwise successful, in which
/// case the cleanup failure itself becomes primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    kind: ErrorKind,
    message: String,
    suppressed: Vec<StreamError>,
}

impl StreamError {
    /// Creates an error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suppressed: Vec::new(),
        }
    }

    /// Creates an [`ErrorKind::Acquisition`] error.
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Acquisition, message)
    }

    /// Creates an [`ErrorKind::Production`] error.
    ///
    /// This is the default kind for failures raised by user-supplied
    /// effects; the stream machinery re-tags them when they surface from a
    /// specific lifecycle phase.
    pub fn production(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Production, message)
    }

    /// Creates an [`ErrorKind::Release`] error.
    pub fn release(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Release, message)
    }

    /// Creates an [`ErrorKind::Finalizer`] error.
    pub fn finalizer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Finalizer, message)
    }

    /// The lifecycle phase this error originated from.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The primary message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Secondary errors raised by cleanup while this error was being
    /// handled, in the order they occurred.
    pub fn suppressed(&self) -> &[StreamError] {
        &self.suppressed
    }

    /// Attaches a secondary error.
    ///
    /// If the secondary itself carries suppressed errors they are flattened
    /// into this error's list, preserving order.
    pub fn suppress(&mut self, mut secondary: StreamError) {
        let nested = std::mem::take(&mut secondary.suppressed);
        self.suppressed.push(secondary);
        self.suppressed.extend(nested);
    }

    /// Re-tags this error with a different kind, keeping the message and
    /// suppressed list intact.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} failed: {}", self.kind.label(), self.message)?;
        if !self.suppressed.is_empty() {
            write!(formatter, " ({} suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamError {}

static_assertions::assert_impl_all!(StreamError: Send, Sync, Clone, std::error::Error);

/// Combines the outcomes of two cleanup actions that ran back to back.
///
/// The first failure stays primary; a second failure is suppressed onto it.
pub(crate) fn combine_cleanup(
    primary: Result<(), StreamError>,
    secondary: Result<(), StreamError>,
) -> Result<(), StreamError> {
    match (primary, secondary) {
        (Ok(()), outcome) => outcome,
        (Err(error), Ok(())) => Err(error),
        (Err(mut error), Err(secondary)) => {
            error.suppress(secondary);
            Err(error)
        }
    }
}

/// Folds a batch of cleanup failures into a single result.
///
/// The first failure becomes primary and the rest are suppressed onto it.
pub(crate) fn collect_cleanup(failures: Vec<StreamError>) -> Result<(), StreamError> {
    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some(mut primary) => {
            for failure in failures {
                primary.suppress(failure);
            }
            Err(primary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppress_preserves_order() {
        let mut error = StreamError::production("primary");
        error.suppress(StreamError::release("first"));
        error.suppress(StreamError::finalizer("second"));

        let messages: Vec<_> = error.suppressed().iter().map(StreamError::message).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn suppress_flattens_nested_secondaries() {
        let mut secondary = StreamError::release("close-error");
        secondary.suppress(StreamError::finalizer("log-error"));

        let mut error = StreamError::production("io-error");
        error.suppress(secondary);

        let messages: Vec<_> = error.suppressed().iter().map(StreamError::message).collect();
        assert_eq!(messages, vec!["close-error", "log-error"]);
    }

    #[test]
    fn display_includes_kind_and_suppressed_count() {
        let mut error = StreamError::acquisition("disk-full");
        assert_eq!(error.to_string(), "acquisition failed: disk-full");

        error.suppress(StreamError::release("close-error"));
        assert_eq!(error.to_string(), "acquisition failed: disk-full (1 suppressed)");
    }

    #[test]
    fn with_kind_keeps_message() {
        let error = StreamError::production("disk-full").with_kind(ErrorKind::Acquisition);
        assert_eq!(error.kind(), ErrorKind::Acquisition);
        assert_eq!(error.message(), "disk-full");
    }

    #[test]
    fn combine_cleanup_keeps_first_failure_primary() {
        let combined = combine_cleanup(
            Err(StreamError::production("inner")),
            Err(StreamError::release("outer")),
        );
        let error = combined.unwrap_err();
        assert_eq!(error.message(), "inner");
        assert_eq!(error.suppressed()[0].message(), "outer");
    }

    #[test]
    fn collect_cleanup_promotes_first_failure() {
        let collected = collect_cleanup(vec![
            StreamError::finalizer("first"),
            StreamError::finalizer("second"),
        ]);
        let error = collected.unwrap_err();
        assert_eq!(error.message(), "first");
        assert_eq!(error.suppressed()[0].message(), "second");
    }
}
