//! Pipeline stages backing the `Stream` builders and transformations.
//!
//! Each stage is a struct implementing [`StreamCore`] with by-value `pull`
//! and `close`. A stage that survives an emit re-wraps the upstream tail in
//! a fresh copy of itself, so the pipeline shape is preserved across pulls.
//! Stages that discard elements (`Filter`, `Skip`, `FlatMap` hand-offs) loop
//! inside a single pull rather than surfacing intermediate steps; laziness
//! between pulls is unaffected.

use crate::effect::Task;
use crate::error::StreamError;
use crate::stream::{Step, Stream, StreamCore};

// ===== Sources =====

/// A source defined by a single pull thunk.
pub(crate) struct FromFn<F> {
    pull_fn: F,
}

impl<F> FromFn<F> {
    pub(crate) fn new(pull_fn: F) -> Self {
        Self { pull_fn }
    }
}

impl<A, F> StreamCore<A> for FromFn<F>
where
    F: FnOnce() -> Result<Step<A>, StreamError>,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        (self.pull_fn)()
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        Ok(())
    }
}

/// A source draining an iterator one element per pull.
pub(crate) struct FromIter<I> {
    iter: I,
}

impl<I> FromIter<I> {
    pub(crate) fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<A, I> StreamCore<A> for FromIter<I>
where
    A: 'static,
    I: Iterator<Item = A> + 'static,
{
    fn pull(mut self: Box<Self>) -> Result<Step<A>, StreamError> {
        match self.iter.next() {
            Some(element) => Ok(Step::Emit(element, Stream::from_core(self))),
            None => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        Ok(())
    }
}

/// A source unfolding a seed with a step function.
pub(crate) struct Unfold<S, F> {
    seed: S,
    step: F,
}

impl<S, F> Unfold<S, F> {
    pub(crate) fn new(seed: S, step: F) -> Self {
        Self { seed, step }
    }
}

impl<A, S, F> StreamCore<A> for Unfold<S, F>
where
    A: 'static,
    S: 'static,
    F: FnMut(S) -> Option<(A, S)> + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Unfold { seed, mut step } = *self;
        match step(seed) {
            Some((element, next)) => Ok(Step::Emit(
                element,
                Stream::from_core(Box::new(Unfold { seed: next, step })),
            )),
            None => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        Ok(())
    }
}

/// A source whose stream is built on first use.
///
/// Closing an unforced `Defer` is a no-op: the inner stream was never
/// constructed, so nothing was acquired and nothing is owed.
pub(crate) struct Defer<F> {
    build: F,
}

impl<F> Defer<F> {
    pub(crate) fn new(build: F) -> Self {
        Self { build }
    }
}

impl<A, F> StreamCore<A> for Defer<F>
where
    A: 'static,
    F: FnOnce() -> Stream<A>,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        (self.build)().pull()
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        Ok(())
    }
}

// ===== Composition =====

/// Sequences two streams.
pub(crate) struct Concat<A> {
    left: Stream<A>,
    right: Stream<A>,
}

impl<A> Concat<A> {
    pub(crate) fn new(left: Stream<A>, right: Stream<A>) -> Self {
        Self { left, right }
    }
}

impl<A: 'static> StreamCore<A> for Concat<A> {
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Concat { left, right } = *self;
        match left.pull() {
            Ok(Step::Emit(element, tail)) => Ok(Step::Emit(element, tail.concat(right))),
            Ok(Step::Done) => right.pull(),
            Err(mut error) => {
                // The pending right side still owes its cleanup.
                if let Err(close_error) = right.close_now() {
                    error.suppress(close_error);
                }
                Err(error)
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        let Concat { left, right } = *self;
        crate::error::combine_cleanup(left.close_now(), right.close_now())
    }
}

// ===== Element transformations =====

pub(crate) struct Map<A, F> {
    inner: Stream<A>,
    function: F,
}

impl<A, F> Map<A, F> {
    pub(crate) fn new(inner: Stream<A>, function: F) -> Self {
        Self { inner, function }
    }
}

impl<A, B, F> StreamCore<B> for Map<A, F>
where
    A: 'static,
    B: 'static,
    F: FnMut(A) -> B + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<B>, StreamError> {
        let Map {
            inner,
            mut function,
        } = *self;
        match inner.pull()? {
            Step::Emit(element, tail) => {
                let mapped = function(element);
                Ok(Step::Emit(
                    mapped,
                    Stream::from_core(Box::new(Map {
                        inner: tail,
                        function,
                    })),
                ))
            }
            Step::Done => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct Filter<A, F> {
    inner: Stream<A>,
    predicate: F,
}

impl<A, F> Filter<A, F> {
    pub(crate) fn new(inner: Stream<A>, predicate: F) -> Self {
        Self { inner, predicate }
    }
}

impl<A, F> StreamCore<A> for Filter<A, F>
where
    A: 'static,
    F: FnMut(&A) -> bool + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Filter {
            mut inner,
            mut predicate,
        } = *self;
        loop {
            match inner.pull()? {
                Step::Emit(element, tail) => {
                    if predicate(&element) {
                        return Ok(Step::Emit(
                            element,
                            Stream::from_core(Box::new(Filter {
                                inner: tail,
                                predicate,
                            })),
                        ));
                    }
                    inner = tail;
                }
                Step::Done => return Ok(Step::Done),
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct FlatMap<A, B, F> {
    outer: Stream<A>,
    current: Option<Stream<B>>,
    function: F,
}

impl<A, B, F> FlatMap<A, B, F> {
    pub(crate) fn new(outer: Stream<A>, function: F) -> Self {
        Self {
            outer,
            current: None,
            function,
        }
    }
}

impl<A, B, F> StreamCore<B> for FlatMap<A, B, F>
where
    A: 'static,
    B: 'static,
    F: FnMut(A) -> Stream<B> + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<B>, StreamError> {
        let FlatMap {
            mut outer,
            mut current,
            mut function,
        } = *self;
        loop {
            if let Some(active) = current.take() {
                match active.pull() {
                    Ok(Step::Emit(element, tail)) => {
                        return Ok(Step::Emit(
                            element,
                            Stream::from_core(Box::new(FlatMap {
                                outer,
                                current: Some(tail),
                                function,
                            })),
                        ));
                    }
                    Ok(Step::Done) => {}
                    Err(mut error) => {
                        // The outer stream never saw a termination; close it
                        // so its cleanup runs.
                        if let Err(close_error) = outer.close_now() {
                            error.suppress(close_error);
                        }
                        return Err(error);
                    }
                }
            } else {
                match outer.pull()? {
                    Step::Emit(element, tail) => {
                        current = Some(function(element));
                        outer = tail;
                        continue;
                    }
                    Step::Done => return Ok(Step::Done),
                }
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        let FlatMap { outer, current, .. } = *self;
        let current_result = match current {
            Some(active) => active.close_now(),
            None => Ok(()),
        };
        crate::error::combine_cleanup(current_result, outer.close_now())
    }
}

pub(crate) struct MapTask<A, F> {
    inner: Stream<A>,
    function: F,
}

impl<A, F> MapTask<A, F> {
    pub(crate) fn new(inner: Stream<A>, function: F) -> Self {
        Self { inner, function }
    }
}

impl<A, B, F> StreamCore<B> for MapTask<A, F>
where
    A: 'static,
    B: 'static,
    F: FnMut(A) -> Task<B> + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<B>, StreamError> {
        let MapTask {
            inner,
            mut function,
        } = *self;
        match inner.pull()? {
            Step::Emit(element, tail) => match function(element).run() {
                Ok(mapped) => Ok(Step::Emit(
                    mapped,
                    Stream::from_core(Box::new(MapTask {
                        inner: tail,
                        function,
                    })),
                )),
                Err(mut error) => {
                    // The element task failed after a successful emit; the
                    // tail still owes its cleanup.
                    if let Err(close_error) = tail.close_now() {
                        error.suppress(close_error);
                    }
                    Err(error)
                }
            },
            Step::Done => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct Peek<A, F> {
    inner: Stream<A>,
    observer: F,
}

impl<A, F> Peek<A, F> {
    pub(crate) fn new(inner: Stream<A>, observer: F) -> Self {
        Self { inner, observer }
    }
}

impl<A, F> StreamCore<A> for Peek<A, F>
where
    A: 'static,
    F: FnMut(&A) + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Peek {
            inner,
            mut observer,
        } = *self;
        match inner.pull()? {
            Step::Emit(element, tail) => {
                observer(&element);
                Ok(Step::Emit(
                    element,
                    Stream::from_core(Box::new(Peek {
                        inner: tail,
                        observer,
                    })),
                ))
            }
            Step::Done => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

// ===== Prefix selection =====

pub(crate) struct Take<A> {
    inner: Stream<A>,
    remaining: usize,
}

impl<A> Take<A> {
    pub(crate) fn new(inner: Stream<A>, remaining: usize) -> Self {
        Self { inner, remaining }
    }
}

impl<A: 'static> StreamCore<A> for Take<A> {
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Take { inner, remaining } = *self;
        if remaining == 0 {
            // Budget spent: the stop happens here, not at the upstream's
            // natural end, so the upstream is closed explicitly.
            inner.close_now()?;
            return Ok(Step::Done);
        }
        match inner.pull()? {
            Step::Emit(element, tail) => Ok(Step::Emit(
                element,
                Stream::from_core(Box::new(Take {
                    inner: tail,
                    remaining: remaining - 1,
                })),
            )),
            Step::Done => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct TakeWhile<A, F> {
    inner: Stream<A>,
    predicate: F,
}

impl<A, F> TakeWhile<A, F> {
    pub(crate) fn new(inner: Stream<A>, predicate: F) -> Self {
        Self { inner, predicate }
    }
}

impl<A, F> StreamCore<A> for TakeWhile<A, F>
where
    A: 'static,
    F: FnMut(&A) -> bool + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let TakeWhile {
            inner,
            mut predicate,
        } = *self;
        match inner.pull()? {
            Step::Emit(element, tail) => {
                if predicate(&element) {
                    Ok(Step::Emit(
                        element,
                        Stream::from_core(Box::new(TakeWhile {
                            inner: tail,
                            predicate,
                        })),
                    ))
                } else {
                    tail.close_now()?;
                    Ok(Step::Done)
                }
            }
            Step::Done => Ok(Step::Done),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct Skip<A> {
    inner: Stream<A>,
    remaining: usize,
}

impl<A> Skip<A> {
    pub(crate) fn new(inner: Stream<A>, remaining: usize) -> Self {
        Self { inner, remaining }
    }
}

impl<A: 'static> StreamCore<A> for Skip<A> {
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Skip {
            mut inner,
            mut remaining,
        } = *self;
        while remaining > 0 {
            match inner.pull()? {
                Step::Emit(_, tail) => {
                    inner = tail;
                    remaining -= 1;
                }
                Step::Done => return Ok(Step::Done),
            }
        }
        // Prefix consumed; the tail passes through unwrapped.
        inner.pull()
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

// ===== Error handling =====

pub(crate) struct Recover<A, F> {
    inner: Stream<A>,
    handler: F,
}

impl<A, F> Recover<A, F> {
    pub(crate) fn new(inner: Stream<A>, handler: F) -> Self {
        Self { inner, handler }
    }
}

impl<A, F> StreamCore<A> for Recover<A, F>
where
    A: 'static,
    F: FnOnce(StreamError) -> A + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Recover { inner, handler } = *self;
        match inner.pull() {
            Ok(Step::Emit(element, tail)) => Ok(Step::Emit(
                element,
                Stream::from_core(Box::new(Recover {
                    inner: tail,
                    handler,
                })),
            )),
            Ok(Step::Done) => Ok(Step::Done),
            // Cleanup owed by the failed portion already ran inside the
            // failing pull.
            Err(error) => Ok(Step::Emit(handler(error), Stream::empty())),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}

pub(crate) struct MapError<A, F> {
    inner: Stream<A>,
    function: F,
}

impl<A, F> MapError<A, F> {
    pub(crate) fn new(inner: Stream<A>, function: F) -> Self {
        Self { inner, function }
    }
}

impl<A, F> StreamCore<A> for MapError<A, F>
where
    A: 'static,
    F: FnOnce(StreamError) -> StreamError + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let MapError { inner, function } = *self;
        match inner.pull() {
            Ok(Step::Emit(element, tail)) => Ok(Step::Emit(
                element,
                Stream::from_core(Box::new(MapError {
                    inner: tail,
                    function,
                })),
            )),
            Ok(Step::Done) => Ok(Step::Done),
            Err(error) => Err(function(error)),
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        self.inner.close_now()
    }
}
