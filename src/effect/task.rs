//! Task - deferred, fallible computation.
//!
//! The `Task` type represents a computation that may perform side effects
//! and may fail. Nothing executes until [`Task::run`] is called, so a task
//! is a description of work rather than the work itself. Streams use tasks
//! to express acquisition, release, per-element work, and finalization.
//!
//! # Design Philosophy
//!
//! A `Task` "describes" an effect but doesn't "execute" it. Execution
//! happens exactly once, via `run`, which consumes the task: the deferred
//! thunk is owned by value and handed to whichever combinator runs it.
//!
//! # Examples
//!
//! ```rust
//! use rill::effect::Task;
//!
//! // Create a pure task
//! let task = Task::succeed(42);
//! assert_eq!(task.run(), Ok(42));
//!
//! // Chain tasks
//! let task = Task::succeed(10)
//!     .map(|x| x * 2)
//!     .and_then(|x| Task::succeed(x + 1));
//! assert_eq!(task.run(), Ok(21));
//! ```
//!
//! # Side Effect Deferral
//!
//! ```rust
//! use rill::effect::Task;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! let executed = Arc::new(AtomicBool::new(false));
//! let flag = executed.clone();
//!
//! let task = Task::of(move || {
//!     flag.store(true, Ordering::SeqCst);
//!     42
//! });
//!
//! // Not executed yet
//! assert!(!executed.load(Ordering::SeqCst));
//!
//! let result = task.run();
//! assert!(executed.load(Ordering::SeqCst));
//! assert_eq!(result, Ok(42));
//! ```

use crate::error::StreamError;

/// A deferred computation that produces a value or a [`StreamError`] when
/// run.
///
/// `Task<A>` wraps a thunk producing `Result<A, StreamError>`. The thunk is
/// not executed until `run` is called, and `run` consumes the task, so every
/// task runs at most once.
///
/// # Type Parameters
///
/// - `A`: The type of the value produced on success.
pub struct Task<A> {
    run_task: Box<dyn FnOnce() -> Result<A, StreamError>>,
}

impl<A: 'static> Task<A> {
    /// Creates a task from a fallible thunk.
    ///
    /// The thunk will not be executed until `run` is called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rill::effect::Task;
    /// use rill::error::StreamError;
    ///
    /// let task = Task::new(|| {
    ///     if true { Ok(42) } else { Err(StreamError::production("unreachable")) }
    /// });
    /// assert_eq!(task.run(), Ok(42));
    /// ```
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() -> Result<A, StreamError> + 'static,
    {
        Self {
            run_task: Box::new(action),
        }
    }

    /// Creates a task from an infallible thunk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rill::effect::Task;
    ///
    /// let task = Task::of(|| 10 + 20);
    /// assert_eq!(task.run(), Ok(30));
    /// ```
    pub fn of<F>(action: F) -> Self
    where
        F: FnOnce() -> A + 'static,
    {
        Self::new(move || Ok(action()))
    }

    /// Wraps an already-computed value in a task.
    pub fn succeed(value: A) -> Self {
        Self::new(move || Ok(value))
    }

    /// Creates a task that fails with the given error when run.
    pub fn fail(error: StreamError) -> Self {
        Self::new(move || Err(error))
    }

    /// Executes the task and returns its result.
    ///
    /// This is the only way to extract a value from a task, and it consumes
    /// the task: side effects happen here, exactly once.
    pub fn run(self) -> Result<A, StreamError> {
        (self.run_task)()
    }

    /// Transforms the success value of this task.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rill::effect::Task;
    ///
    /// let task = Task::succeed(21).map(|x| x * 2);
    /// assert_eq!(task.run(), Ok(42));
    /// ```
    pub fn map<B, F>(self, function: F) -> Task<B>
    where
        F: FnOnce(A) -> B + 'static,
        B: 'static,
    {
        Task::new(move || self.run().map(function))
    }

    /// Chains this task with a function producing the next task.
    ///
    /// The second task runs only if this one succeeded; a failure
    /// short-circuits.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rill::effect::Task;
    ///
    /// let task = Task::succeed(10).and_then(|x| Task::succeed(x * 2));
    /// assert_eq!(task.run(), Ok(20));
    /// ```
    pub fn and_then<B, F>(self, function: F) -> Task<B>
    where
        F: FnOnce(A) -> Task<B> + 'static,
        B: 'static,
    {
        Task::new(move || {
            let value = self.run()?;
            function(value).run()
        })
    }

    /// Sequences two tasks, discarding the result of the first.
    ///
    /// The first task still runs for its effects and its failure still
    /// short-circuits.
    pub fn then<B>(self, next: Task<B>) -> Task<B>
    where
        B: 'static,
    {
        self.and_then(move |_| next)
    }

    /// Transforms the error of a failed task.
    pub fn map_err<F>(self, function: F) -> Task<A>
    where
        F: FnOnce(StreamError) -> StreamError + 'static,
    {
        Task::new(move || self.run().map_err(function))
    }
}

impl Task<()> {
    /// Creates a task that performs a side effect and yields `()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rill::effect::Task;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let count = Arc::new(AtomicUsize::new(0));
    /// let counter = count.clone();
    ///
    /// let task = Task::exec(move || {
    ///     counter.fetch_add(1, Ordering::SeqCst);
    /// });
    /// assert_eq!(task.run(), Ok(()));
    /// assert_eq!(count.load(Ordering::SeqCst), 1);
    /// ```
    pub fn exec<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::of(action)
    }

    /// A task that does nothing and succeeds.
    pub fn unit() -> Self {
        Self::succeed(())
    }
}

impl<A> std::fmt::Debug for Task<A> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Task").field("run_task", &"<thunk>").finish()
    }
}
