//! Deferred effects.
//!
//! The [`Task`] type represents a computation with side effects that is
//! deferred until `run` is called. Streams are built out of tasks: a pull is
//! a task producing the next step, a bracket's acquire and release are
//! tasks, and finalizers are `Task<()>` values.
//!
//! ```rust
//! use rill::effect::Task;
//!
//! let task = Task::succeed(10)
//!     .map(|x| x * 2)
//!     .and_then(|x| Task::succeed(x + 1));
//! assert_eq!(task.run(), Ok(21));
//! ```

mod task;

pub use task::Task;
