//! Resource scoping for streams.
//!
//! [`bracket`] ties an acquired resource to a traversal. The resource is
//! acquired lazily on the first pull, the element stream borrows it, and the
//! release effect consumes it when the traversal ends. A [`ReleaseScope`]
//! guards the release behind a single-use compare-and-set latch: whichever
//! termination path reaches it first runs the release, and every later
//! attempt is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::effect::Task;
use crate::error::{ErrorKind, StreamError, combine_cleanup};
use crate::stream::{Step, Stream, StreamCore};

pub(crate) fn bracket<R, A, U, Rel>(acquire: Task<R>, use_fn: U, release: Rel) -> Stream<A>
where
    R: 'static,
    A: 'static,
    U: FnOnce(&R) -> Stream<A> + 'static,
    Rel: FnOnce(R) -> Task<()> + 'static,
{
    Stream::from_core(Box::new(BracketStream {
        acquire,
        use_fn,
        release,
    }))
}

/// The unforced stage of a bracket: nothing acquired yet.
struct BracketStream<R, U, Rel> {
    acquire: Task<R>,
    use_fn: U,
    release: Rel,
}

impl<R, A, U, Rel> StreamCore<A> for BracketStream<R, U, Rel>
where
    R: 'static,
    A: 'static,
    U: FnOnce(&R) -> Stream<A> + 'static,
    Rel: FnOnce(R) -> Task<()> + 'static,
{
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let BracketStream {
            acquire,
            use_fn,
            release,
        } = *self;
        let resource = acquire
            .run()
            .map_err(|error| error.with_kind(ErrorKind::Acquisition))?;
        let inner = use_fn(&resource);
        let scope = ReleaseScope::arm(resource, release);
        Box::new(Guarded { inner, scope }).pull()
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        // Never acquired, so nothing is owed.
        Ok(())
    }
}

/// The forced stage: the resource is held and the release is armed.
struct Guarded<A> {
    inner: Stream<A>,
    scope: ReleaseScope,
}

impl<A: 'static> StreamCore<A> for Guarded<A> {
    fn pull(self: Box<Self>) -> Result<Step<A>, StreamError> {
        let Guarded { inner, scope } = *self;
        match inner.pull() {
            Ok(Step::Emit(element, tail)) => Ok(Step::Emit(
                element,
                Stream::from_core(Box::new(Guarded { inner: tail, scope })),
            )),
            Ok(Step::Done) => {
                // Release failure on an otherwise clean end is the primary
                // error.
                scope.settle()?;
                Ok(Step::Done)
            }
            Err(mut error) => {
                if let Err(release_error) = scope.settle() {
                    error.suppress(release_error);
                }
                Err(error)
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), StreamError> {
        let Guarded { inner, scope } = *self;
        // Inner stages settle before this scope's release runs.
        combine_cleanup(inner.close_now(), scope.settle())
    }
}

/// Single-use guard around a release effect.
///
/// The `settled` flag flips exactly once via compare-and-set; the winner
/// takes the release thunk out of its slot and runs it, losers observe the
/// flipped flag and do nothing.
struct ReleaseScope {
    state: Arc<ScopeState>,
}

type ReleaseThunk = Box<dyn FnOnce() -> Result<(), StreamError>>;

struct ScopeState {
    settled: AtomicBool,
    release: Mutex<Option<ReleaseThunk>>,
}

impl ReleaseScope {
    fn arm<R, Rel>(resource: R, release: Rel) -> Self
    where
        R: 'static,
        Rel: FnOnce(R) -> Task<()> + 'static,
    {
        let thunk: ReleaseThunk = Box::new(move || {
            release(resource)
                .run()
                .map_err(|error| error.with_kind(ErrorKind::Release))
        });
        Self {
            state: Arc::new(ScopeState {
                settled: AtomicBool::new(false),
                release: Mutex::new(Some(thunk)),
            }),
        }
    }

    fn settle(&self) -> Result<(), StreamError> {
        if self
            .state
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        match self.state.release.lock().take() {
            Some(thunk) => thunk(),
            None => Ok(()),
        }
    }
}
