//! # rill
//!
//! Lazy pull-based streaming with guaranteed resource release.
//!
//! ## Overview
//!
//! A [`Stream`](stream::Stream) describes a sequence without producing it:
//! construction and transformation perform no work, and elements appear one
//! at a time as a consumer pulls them. Streams whose elements depend on an
//! external resource use [`Stream::bracket`](stream::Stream::bracket) to tie
//! acquisition and release to the traversal, with a hard guarantee that the
//! release runs exactly once no matter how consumption ends — full
//! traversal, early stop, or failure. This library includes:
//!
//! - **Pull Protocol**: [`Stream::pull`](stream::Stream::pull) answers with
//!   an element plus the rest of the stream, the end of the sequence, or a
//!   failure, inspected exhaustively at every call site
//! - **Resource Scoping**: `bracket` acquires on the first pull, releases
//!   exactly once on any termination, and never releases what was never
//!   acquired
//! - **Finalizer Chains**: [`on_finalize`](stream::Stream::on_finalize)
//!   attaches once-only cleanup effects that run in attachment order
//! - **Deferred Effects**: [`Task`](effect::Task) defers fallible side
//!   effects until run
//! - **Suppressed Errors**: [`StreamError`](error::StreamError) keeps the
//!   first failure primary and attaches cleanup failures instead of
//!   dropping them
//!
//! ## Example
//!
//! ```rust
//! use rill::effect::Task;
//! use rill::stream::Stream;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let releases = Arc::new(AtomicUsize::new(0));
//! let counter = releases.clone();
//!
//! let lines = Stream::bracket(
//!     Task::succeed(vec!["alpha", "beta", "gamma"]),
//!     |file| Stream::from_iter(file.clone()),
//!     move |_file| Task::exec(move || { counter.fetch_add(1, Ordering::SeqCst); }),
//! );
//!
//! // Early stop still releases the resource, exactly once.
//! assert_eq!(lines.take(2).to_vec().run(), Ok(vec!["alpha", "beta"]));
//! assert_eq!(releases.load(Ordering::SeqCst), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use rill::prelude::*;
///
/// let total = stream![1, 2, 3].fold(0, |acc, x| acc + x);
/// assert_eq!(total.run(), Ok(6));
/// ```
pub mod prelude {
    pub use crate::effect::Task;
    pub use crate::error::{ErrorKind, StreamError};
    pub use crate::stream;
    pub use crate::stream::{Step, Stream};
}

pub mod effect;
pub mod error;
pub mod stream;
