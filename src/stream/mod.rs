//! Lazy pull-based streams with guaranteed resource release.
//!
//! A [`Stream`] is a description of a sequence: nothing runs at construction
//! time, and elements are produced one at a time by [`Stream::pull`]. Each
//! pull answers with a [`Step`] — either an element together with the rest of
//! the stream, or the end of the sequence — or fails with a
//! [`StreamError`](crate::error::StreamError).
//!
//! Streams may depend on externally acquired resources. [`Stream::bracket`]
//! ties a resource's lifetime to the traversal: the resource is acquired on
//! the first pull and released exactly once when the traversal ends, whether
//! it ends by running out of elements, by failing, or by a consumer stopping
//! early. [`Stream::on_finalize`] attaches cleanup effects with the same
//! exactly-once guarantee.
//!
//! # Examples
//!
//! ```rust
//! use rill::stream::Stream;
//!
//! let stream = Stream::from_iter(1..=5).map(|x| x * 10).take(3);
//! assert_eq!(stream.to_vec().run(), Ok(vec![10, 20, 30]));
//! ```
//!
//! Bracketed resource use:
//!
//! ```rust
//! use rill::effect::Task;
//! use rill::stream::Stream;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! let released = Arc::new(AtomicBool::new(false));
//! let flag = released.clone();
//!
//! let stream = Stream::bracket(
//!     Task::succeed(vec![1, 2, 3]),
//!     |data| Stream::from_iter(data.clone()),
//!     move |_data| Task::exec(move || flag.store(true, Ordering::SeqCst)),
//! );
//!
//! assert_eq!(stream.to_vec().run(), Ok(vec![1, 2, 3]));
//! assert!(released.load(Ordering::SeqCst));
//! ```

mod combinators;
mod finalize;
mod scope;

use crate::effect::Task;
use crate::error::StreamError;
use combinators::{
    Concat, Defer, Filter, FlatMap, FromFn, FromIter, Map, MapError, MapTask, Peek, Recover,
    Skip, Take, TakeWhile, Unfold,
};
use finalize::FinalizerList;

/// The answer to a single pull: the next element plus the rest of the
/// stream, or the end of the sequence.
///
/// Failure is the `Err` arm of the surrounding
/// `Result<Step<A>, StreamError>`, so every call site inspects exactly three
/// cases: element, end, failure.
pub enum Step<A> {
    /// The next element and the stream that continues after it.
    Emit(A, Stream<A>),
    /// The sequence ended normally; no element accompanies this step.
    Done,
}

/// A lazy, pull-based sequence of values of type `A`.
///
/// Constructing a stream — including applying transformations such as
/// [`map`](Stream::map) or [`take`](Stream::take) — performs no work.
/// Elements are produced only when a pull demands them, and each pull
/// consumes the handle: the tail carried by [`Step::Emit`] is the stream to
/// pull next. Ownership therefore enforces single-consumer traversal; there
/// is no way to pull a stream that has already answered.
///
/// Termination is cooperative. A consumer that stops early must drive the
/// stop through the stream — either by pulling to the end, or by closing the
/// abandoned tail (the terminal operations in this module all do one or the
/// other) — so that bracketed releases and finalizers fire. Dropping a
/// handle without a terminal operation runs no cleanup.
pub struct Stream<A> {
    kind: Kind<A>,
}

enum Kind<A> {
    Core(Box<dyn StreamCore<A>>),
    Finalized(Box<Stream<A>>, FinalizerList),
}

/// One stage of a stream pipeline.
///
/// Both operations consume the stage; exactly one of them ever runs for a
/// given stage, because the owning `Stream` handle is itself consumed.
/// `close` carries the early-stop signal downstream so that every stage can
/// run its cleanup without producing further elements.
pub(crate) trait StreamCore<A> {
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError>;
    fn close(self: Box<Self>) -> Result<(), StreamError>;
}

impl<A: 'static> Stream<A> {
    pub(crate) fn from_core(core: Box<dyn StreamCore<A>>) -> Self {
        Self {
            kind: Kind::Core(core),
        }
    }

    pub(crate) fn from_pull<F>(pull_fn: F) -> Self
    where
        F: FnOnce() -> Result<Step<A>, StreamError> + 'static,
    {
        Self::from_core(Box::new(FromFn::new(pull_fn)))
    }

    fn finalized(inner: Stream<A>, finalizers: FinalizerList) -> Self {
        Self {
            kind: Kind::Finalized(Box::new(inner), finalizers),
        }
    }

    // ===== Builders =====

    /// A stream with no elements.
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// assert_eq!(Stream::<i32>::empty().to_vec().run(), Ok(vec![]));
    /// ```
    pub fn empty() -> Self {
        Self::from_pull(|| Ok(Step::Done))
    }

    /// A stream of exactly one element.
    pub fn emit(value: A) -> Self {
        Self::from_pull(move || Ok(Step::Emit(value, Stream::empty())))
    }

    /// A stream over the elements of an iterator.
    ///
    /// The iterator is not advanced until the stream is pulled.
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// let stream = Stream::from_iter(vec!["a", "b"]);
    /// assert_eq!(stream.to_vec().run(), Ok(vec!["a", "b"]));
    /// ```
    pub fn from_iter<I>(into_iter: I) -> Self
    where
        I: IntoIterator<Item = A>,
        I::IntoIter: 'static,
    {
        Self::from_core(Box::new(FromIter::new(into_iter.into_iter())))
    }

    /// A stream that fails with the given error on its first pull.
    pub fn fail(error: StreamError) -> Self {
        Self::from_pull(move || Err(error))
    }

    /// Builds a stream from a seed and a step function.
    ///
    /// Each pull applies `step` to the current seed; `Some((element, next))`
    /// emits the element and carries `next` as the new seed, `None` ends the
    /// stream.
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// let countdown = Stream::unfold(3, |n| if n == 0 { None } else { Some((n, n - 1)) });
    /// assert_eq!(countdown.to_vec().run(), Ok(vec![3, 2, 1]));
    /// ```
    pub fn unfold<S, F>(seed: S, step: F) -> Self
    where
        S: 'static,
        F: FnMut(S) -> Option<(A, S)> + 'static,
    {
        Self::from_core(Box::new(Unfold::new(seed, step)))
    }

    /// An infinite stream of repeated applications: `seed`, `f(seed)`,
    /// `f(f(seed))`, and so on.
    ///
    /// Combine with [`take`](Stream::take) or
    /// [`take_while`](Stream::take_while) to bound it.
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// let powers = Stream::iterate(1, |x| x * 2).take(4);
    /// assert_eq!(powers.to_vec().run(), Ok(vec![1, 2, 4, 8]));
    /// ```
    pub fn iterate<F>(seed: A, mut function: F) -> Self
    where
        F: FnMut(&A) -> A + 'static,
    {
        Self::unfold(seed, move |current| {
            let next = function(&current);
            Some((current, next))
        })
    }

    /// Defers stream construction until the first pull or close.
    ///
    /// Useful when building the stream itself captures state that should not
    /// be touched before consumption starts.
    pub fn defer<F>(build: F) -> Self
    where
        F: FnOnce() -> Stream<A> + 'static,
    {
        Self::from_core(Box::new(Defer::new(build)))
    }

    /// Concatenates two streams: all elements of `self`, then all elements
    /// of `other`.
    ///
    /// If `self` fails, `other` is closed before the failure propagates so
    /// any cleanup it carries still runs.
    pub fn concat(self, other: Stream<A>) -> Self {
        Self::from_core(Box::new(Concat::new(self, other)))
    }

    /// Ties a resource to the lifetime of a stream.
    ///
    /// Nothing runs at construction time. The first pull runs `acquire`;
    /// on success, `use_fn` builds the element stream from a borrow of the
    /// resource, and `release` is armed to consume the resource when the
    /// traversal ends. The release runs exactly once — on normal exhaustion,
    /// on failure, or on an early stop driven by a consumer — before the
    /// terminating result reaches the caller. If `acquire` fails, the
    /// failure surfaces as [`ErrorKind::Acquisition`] and `release` never
    /// runs.
    ///
    /// Brackets nest: an inner bracket's release runs before the outer one.
    ///
    /// [`ErrorKind::Acquisition`]: crate::error::ErrorKind::Acquisition
    ///
    /// ```rust
    /// use rill::effect::Task;
    /// use rill::stream::Stream;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let releases = Arc::new(AtomicUsize::new(0));
    /// let counter = releases.clone();
    ///
    /// let stream = Stream::bracket(
    ///     Task::succeed("handle"),
    ///     |_handle| Stream::from_iter(1..=4),
    ///     move |_handle| Task::exec(move || { counter.fetch_add(1, Ordering::SeqCst); }),
    /// );
    ///
    /// // Early stop: take(2) closes the rest, the release still fires once.
    /// assert_eq!(stream.take(2).to_vec().run(), Ok(vec![1, 2]));
    /// assert_eq!(releases.load(Ordering::SeqCst), 1);
    /// ```
    pub fn bracket<R, U, Rel>(acquire: Task<R>, use_fn: U, release: Rel) -> Self
    where
        R: 'static,
        U: FnOnce(&R) -> Stream<A> + 'static,
        Rel: FnOnce(R) -> Task<()> + 'static,
    {
        scope::bracket(acquire, use_fn, release)
    }

    // ===== Transformations =====

    /// Transforms each element with `function`.
    pub fn map<B, F>(self, function: F) -> Stream<B>
    where
        B: 'static,
        F: FnMut(A) -> B + 'static,
    {
        Stream::from_core(Box::new(Map::new(self, function)))
    }

    /// Keeps only the elements matching `predicate`.
    ///
    /// Rejected elements are consumed within the pull that skips them; the
    /// stream stays lazy between pulls.
    pub fn filter<F>(self, predicate: F) -> Stream<A>
    where
        F: FnMut(&A) -> bool + 'static,
    {
        Stream::from_core(Box::new(Filter::new(self, predicate)))
    }

    /// Replaces each element with the elements of a derived stream.
    pub fn flat_map<B, F>(self, function: F) -> Stream<B>
    where
        B: 'static,
        F: FnMut(A) -> Stream<B> + 'static,
    {
        Stream::from_core(Box::new(FlatMap::new(self, function)))
    }

    /// Transforms each element with an effectful task.
    ///
    /// The task runs inside the pull that produced the element. If it fails,
    /// the remaining upstream is closed before the failure propagates, so
    /// bracketed releases and finalizers still fire.
    pub fn map_task<B, F>(self, function: F) -> Stream<B>
    where
        B: 'static,
        F: FnMut(A) -> Task<B> + 'static,
    {
        Stream::from_core(Box::new(MapTask::new(self, function)))
    }

    /// Passes through at most `count` elements.
    ///
    /// Once the budget is spent, the next pull closes the upstream — running
    /// its cleanup — and answers [`Step::Done`].
    pub fn take(self, count: usize) -> Stream<A> {
        Stream::from_core(Box::new(Take::new(self, count)))
    }

    /// Passes elements through while `predicate` holds, then stops.
    ///
    /// The first rejected element is discarded and the upstream is closed.
    pub fn take_while<F>(self, predicate: F) -> Stream<A>
    where
        F: FnMut(&A) -> bool + 'static,
    {
        Stream::from_core(Box::new(TakeWhile::new(self, predicate)))
    }

    /// Discards the first `count` elements.
    pub fn skip(self, count: usize) -> Stream<A> {
        Stream::from_core(Box::new(Skip::new(self, count)))
    }

    /// Observes each element without modifying the stream.
    pub fn peek<F>(self, observer: F) -> Stream<A>
    where
        F: FnMut(&A) + 'static,
    {
        Stream::from_core(Box::new(Peek::new(self, observer)))
    }

    /// Replaces a failure with a single fallback element.
    ///
    /// Cleanup owed by the failed portion has already run by the time
    /// `handler` sees the error.
    pub fn recover<F>(self, handler: F) -> Stream<A>
    where
        F: FnOnce(StreamError) -> A + 'static,
    {
        Stream::from_core(Box::new(Recover::new(self, handler)))
    }

    /// Transforms a failure as it propagates.
    pub fn map_error<F>(self, function: F) -> Stream<A>
    where
        F: FnOnce(StreamError) -> StreamError + 'static,
    {
        Stream::from_core(Box::new(MapError::new(self, function)))
    }

    /// Attaches a cleanup effect that runs exactly once when the stream
    /// terminates — normally, by failure, or by an explicit close.
    ///
    /// Chained finalizers accumulate in attachment order and run in that
    /// order. A finalizer failure becomes the primary error when the stream
    /// otherwise ended cleanly, and is suppressed onto the existing failure
    /// otherwise; either way no failure is dropped.
    ///
    /// ```rust
    /// use rill::effect::Task;
    /// use rill::stream::Stream;
    /// use std::sync::Arc;
    /// use parking_lot::Mutex;
    ///
    /// let log = Arc::new(Mutex::new(Vec::new()));
    /// let first = log.clone();
    /// let second = log.clone();
    ///
    /// let stream = Stream::from_iter(1..=2)
    ///     .on_finalize(Task::exec(move || first.lock().push("first")))
    ///     .on_finalize(Task::exec(move || second.lock().push("second")));
    ///
    /// stream.drain().run().unwrap();
    /// assert_eq!(*log.lock(), vec!["first", "second"]);
    /// ```
    pub fn on_finalize(self, finalizer: Task<()>) -> Stream<A> {
        match self.kind {
            Kind::Finalized(inner, mut finalizers) => {
                finalizers.attach(finalizer);
                Stream {
                    kind: Kind::Finalized(inner, finalizers),
                }
            }
            core => Stream {
                kind: Kind::Finalized(
                    Box::new(Stream { kind: core }),
                    FinalizerList::single(finalizer),
                ),
            },
        }
    }

    // ===== Traversal =====

    /// Produces the next step of the stream.
    ///
    /// Consumes the handle: continue with the tail carried by
    /// [`Step::Emit`]. Any cleanup owed by a terminating step (release
    /// effects, finalizers) completes before this call returns.
    ///
    /// ```rust
    /// use rill::stream::{Step, Stream};
    ///
    /// let stream = Stream::from_iter(vec![1, 2]);
    /// match stream.pull() {
    ///     Ok(Step::Emit(first, rest)) => {
    ///         assert_eq!(first, 1);
    ///         assert_eq!(rest.to_vec().run(), Ok(vec![2]));
    ///     }
    ///     _ => panic!("expected an element"),
    /// }
    /// ```
    pub fn pull(self) -> Result<Step<A>, StreamError> {
        match self.kind {
            Kind::Core(core) => core.pull(),
            Kind::Finalized(inner, finalizers) => finalize::pull_finalized(*inner, finalizers),
        }
    }

    pub(crate) fn close_now(self) -> Result<(), StreamError> {
        match self.kind {
            Kind::Core(core) => core.close(),
            Kind::Finalized(inner, finalizers) => finalize::close_finalized(*inner, finalizers),
        }
    }

    // ===== Terminal operations =====

    /// Stops the stream without consuming any elements.
    ///
    /// Drives the termination signal through every stage: bracketed
    /// releases and finalizers fire exactly as if the stream had ended,
    /// inner stages before outer ones. Cleanup already performed by an
    /// earlier termination of the same lineage is not repeated.
    pub fn close(self) -> Task<()> {
        Task::new(move || self.close_now())
    }

    /// Collects every element into a `Vec`, pulling to the end.
    pub fn to_vec(self) -> Task<Vec<A>> {
        Task::new(move || {
            let mut collected = Vec::new();
            let mut stream = self;
            loop {
                match stream.pull()? {
                    Step::Emit(element, tail) => {
                        collected.push(element);
                        stream = tail;
                    }
                    Step::Done => return Ok(collected),
                }
            }
        })
    }

    /// Folds every element into an accumulator, pulling to the end.
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// let sum = Stream::from_iter(1..=4).fold(0, |acc, x| acc + x);
    /// assert_eq!(sum.run(), Ok(10));
    /// ```
    pub fn fold<B, F>(self, initial: B, mut function: F) -> Task<B>
    where
        B: 'static,
        F: FnMut(B, A) -> B + 'static,
    {
        Task::new(move || {
            let mut accumulator = initial;
            let mut stream = self;
            loop {
                match stream.pull()? {
                    Step::Emit(element, tail) => {
                        accumulator = function(accumulator, element);
                        stream = tail;
                    }
                    Step::Done => return Ok(accumulator),
                }
            }
        })
    }

    /// Takes the first element, if any, closing the rest of the stream.
    pub fn head_option(self) -> Task<Option<A>> {
        Task::new(move || match self.pull()? {
            Step::Emit(element, tail) => {
                tail.close_now()?;
                Ok(Some(element))
            }
            Step::Done => Ok(None),
        })
    }

    /// Pulls to the end and yields the last element, if any.
    pub fn last_option(self) -> Task<Option<A>> {
        self.fold(None, |_, element| Some(element))
    }

    /// Finds the first element matching `predicate`, closing the rest of
    /// the stream once found.
    pub fn find<F>(self, mut predicate: F) -> Task<Option<A>>
    where
        F: FnMut(&A) -> bool + 'static,
    {
        Task::new(move || {
            let mut stream = self;
            loop {
                match stream.pull()? {
                    Step::Emit(element, tail) => {
                        if predicate(&element) {
                            tail.close_now()?;
                            return Ok(Some(element));
                        }
                        stream = tail;
                    }
                    Step::Done => return Ok(None),
                }
            }
        })
    }

    /// Whether any element matches `predicate`; stops at the first match.
    pub fn exists<F>(self, predicate: F) -> Task<bool>
    where
        F: FnMut(&A) -> bool + 'static,
    {
        self.find(predicate).map(|found| found.is_some())
    }

    /// Whether every element matches `predicate`; stops at the first
    /// counterexample, closing the rest of the stream.
    pub fn for_all<F>(self, mut predicate: F) -> Task<bool>
    where
        F: FnMut(&A) -> bool + 'static,
    {
        Task::new(move || {
            let mut stream = self;
            loop {
                match stream.pull()? {
                    Step::Emit(element, tail) => {
                        if !predicate(&element) {
                            tail.close_now()?;
                            return Ok(false);
                        }
                        stream = tail;
                    }
                    Step::Done => return Ok(true),
                }
            }
        })
    }

    /// Runs `action` on every element, pulling to the end.
    pub fn for_each<F>(self, mut action: F) -> Task<()>
    where
        F: FnMut(A) + 'static,
    {
        self.fold((), move |(), element| action(element))
    }

    /// Counts the elements, pulling to the end.
    pub fn count(self) -> Task<usize> {
        self.fold(0, |total, _| total + 1)
    }

    /// Pulls to the end, discarding every element.
    ///
    /// Useful when a stream is traversed purely for its effects.
    pub fn drain(self) -> Task<()> {
        self.fold((), |(), _| ())
    }
}

impl Stream<i64> {
    /// A stream of consecutive integers from `start` (inclusive) to `end`
    /// (exclusive).
    ///
    /// ```rust
    /// use rill::stream::Stream;
    ///
    /// assert_eq!(Stream::range(2, 5).to_vec().run(), Ok(vec![2, 3, 4]));
    /// ```
    pub fn range(start: i64, end: i64) -> Self {
        Self::from_iter(start..end)
    }
}

impl<A> std::fmt::Debug for Stream<A> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match &self.kind {
            Kind::Core(_) => "core",
            Kind::Finalized(..) => "finalized",
        };
        formatter.debug_struct("Stream").field("stage", &stage).finish()
    }
}

/// Builds a stream from a fixed list of elements.
///
/// `stream![]` is [`Stream::empty`]; `stream![a, b, c]` emits the listed
/// elements in order.
///
/// ```rust
/// use rill::stream;
///
/// let doubled = stream![1, 2, 3].map(|x| x * 2);
/// assert_eq!(doubled.to_vec().run(), Ok(vec![2, 4, 6]));
/// ```
#[macro_export]
macro_rules! stream {
    () => {
        $crate::stream::Stream::empty()
    };
    ($($element:expr),+ $(,)?) => {
        $crate::stream::Stream::from_iter(vec![$($element),+])
    };
}
