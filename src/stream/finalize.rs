//! Finalizer chains.
//!
//! `Stream::on_finalize` attaches cleanup effects to a stream. Chained
//! attachments accumulate in one flat, attachment-ordered [`FinalizerList`]
//! rather than nesting wrapper streams, so a chain of `k` finalizers costs
//! one wrapper and runs its entries in attachment order. Each entry carries
//! its own single-use latch, shared across the tails the list is cloned
//! into, so an entry runs at most once per stream lineage no matter which
//! termination path fires it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::effect::Task;
use crate::error::{ErrorKind, StreamError, collect_cleanup, combine_cleanup};
use crate::stream::{Step, Stream};

/// A single cleanup effect behind a once-only latch.
#[derive(Clone)]
pub(crate) struct Finalizer {
    state: Arc<FinalizerState>,
}

struct FinalizerState {
    fired: AtomicBool,
    effect: Mutex<Option<Task<()>>>,
}

impl Finalizer {
    fn new(effect: Task<()>) -> Self {
        Self {
            state: Arc::new(FinalizerState {
                fired: AtomicBool::new(false),
                effect: Mutex::new(Some(effect)),
            }),
        }
    }

    fn run_once(&self) -> Result<(), StreamError> {
        if self
            .state
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        match self.state.effect.lock().take() {
            Some(effect) => effect
                .run()
                .map_err(|error| error.with_kind(ErrorKind::Finalizer)),
            None => Ok(()),
        }
    }
}

/// Cleanup effects attached to one stream, in attachment order.
#[derive(Clone, Default)]
pub(crate) struct FinalizerList {
    entries: SmallVec<[Finalizer; 2]>,
}

impl FinalizerList {
    pub(crate) fn single(effect: Task<()>) -> Self {
        let mut entries = SmallVec::new();
        entries.push(Finalizer::new(effect));
        Self { entries }
    }

    pub(crate) fn attach(&mut self, effect: Task<()>) {
        self.entries.push(Finalizer::new(effect));
    }

    /// Runs every entry that has not fired yet, collecting failures in
    /// attachment order. Entries that fail do not stop later entries.
    fn run_all(&self) -> Vec<StreamError> {
        self.entries
            .iter()
            .filter_map(|finalizer| finalizer.run_once().err())
            .collect()
    }
}

/// Pulls the wrapped stream, firing the finalizers on any termination.
///
/// Emits carry the list forward onto the tail; the per-entry latches keep
/// each entry once-only across the lineage.
pub(crate) fn pull_finalized<A: 'static>(
    inner: Stream<A>,
    finalizers: FinalizerList,
) -> Result<Step<A>, StreamError> {
    match inner.pull() {
        Ok(Step::Emit(element, tail)) => Ok(Step::Emit(
            element,
            Stream::finalized(tail, finalizers),
        )),
        Ok(Step::Done) => {
            collect_cleanup(finalizers.run_all())?;
            Ok(Step::Done)
        }
        Err(mut error) => {
            for failure in finalizers.run_all() {
                error.suppress(failure);
            }
            Err(error)
        }
    }
}

/// Closes the wrapped stream, then fires the finalizers.
///
/// Inner cleanup runs first; the first failure from either phase is primary
/// and the rest are suppressed onto it.
pub(crate) fn close_finalized<A: 'static>(
    inner: Stream<A>,
    finalizers: FinalizerList,
) -> Result<(), StreamError> {
    let inner_result = inner.close_now();
    combine_cleanup(inner_result, collect_cleanup(finalizers.run_all()))
}
