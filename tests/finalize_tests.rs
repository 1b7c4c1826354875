//! Finalizer chain tests for `Stream::on_finalize`.
//!
//! Covers attachment ordering, exactly-once firing across every termination
//! path, explicit close, and the error precedence rules for failing
//! finalizers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use rill::effect::Task;
use rill::error::{ErrorKind, StreamError};
use rill::stream::{Step, Stream};

type EventLog = Arc<Mutex<Vec<String>>>;

fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn logged_finalizer(log: &EventLog, name: &'static str) -> Task<()> {
    let log = log.clone();
    Task::exec(move || log.lock().push(name.to_string()))
}

// ===== Ordering =====

#[test]
fn finalizers_run_in_attachment_order() {
    let log = event_log();
    let stream = Stream::from_iter(vec![1, 2])
        .on_finalize(logged_finalizer(&log, "first"))
        .on_finalize(logged_finalizer(&log, "second"));

    assert_eq!(stream.to_vec().run(), Ok(vec![1, 2]));
    assert_eq!(*log.lock(), vec!["first", "second"]);
}

#[test]
fn finalizers_run_after_the_last_element() {
    let log = event_log();
    let element_log = log.clone();
    let stream = Stream::from_iter(vec![1, 2])
        .peek(move |x| element_log.lock().push(format!("element {x}")))
        .on_finalize(logged_finalizer(&log, "finalize"));

    stream.drain().run().unwrap();
    assert_eq!(*log.lock(), vec!["element 1", "element 2", "finalize"]);
}

#[test]
fn long_chain_preserves_order() {
    let log = event_log();
    let mut stream = Stream::from_iter(vec![0]);
    for name in ["a", "b", "c", "d", "e"] {
        stream = stream.on_finalize(logged_finalizer(&log, name));
    }

    stream.drain().run().unwrap();
    assert_eq!(*log.lock(), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn inner_bracket_releases_before_outer_finalizer() {
    let log = event_log();
    let release_log = log.clone();
    let stream = Stream::bracket(
        Task::succeed(()),
        |_| Stream::from_iter(vec![1, 2]),
        move |()| Task::exec(move || release_log.lock().push("release".to_string())),
    )
    .on_finalize(logged_finalizer(&log, "finalize"));

    stream.drain().run().unwrap();
    assert_eq!(*log.lock(), vec!["release", "finalize"]);
}

// ===== Exactly-once across termination paths =====

#[test]
fn finalizer_fires_on_failure() {
    let log = event_log();
    let stream = Stream::from_iter(vec![1])
        .concat(Stream::fail(StreamError::production("boom")))
        .on_finalize(logged_finalizer(&log, "finalize"));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.message(), "boom");
    assert_eq!(*log.lock(), vec!["finalize"]);
}

#[test]
fn finalizer_fires_once_under_early_stop() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let stream = Stream::from_iter(vec![1, 2, 3])
        .on_finalize(Task::exec(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .take(1);

    assert_eq!(stream.to_vec().run(), Ok(vec![1]));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn finalizer_fires_on_empty_stream() {
    let log = event_log();
    let stream = Stream::<i32>::empty().on_finalize(logged_finalizer(&log, "finalize"));

    assert_eq!(stream.to_vec().run(), Ok(vec![]));
    assert_eq!(*log.lock(), vec!["finalize"]);
}

#[test]
fn explicit_close_fires_finalizers_without_consumption() {
    let log = event_log();
    let stream = Stream::from_iter(vec![1, 2, 3])
        .on_finalize(logged_finalizer(&log, "first"))
        .on_finalize(logged_finalizer(&log, "second"));

    stream.close().run().unwrap();
    assert_eq!(*log.lock(), vec!["first", "second"]);
}

#[test]
fn close_after_partial_consumption_fires_once() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let stream = Stream::from_iter(vec![1, 2, 3]).on_finalize(Task::exec(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let Ok(Step::Emit(first, rest)) = stream.pull() else {
        panic!("expected an element");
    };
    assert_eq!(first, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    rest.close().run().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn head_option_fires_the_finalizer_of_the_abandoned_tail() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let stream = Stream::from_iter(vec![1, 2, 3]).on_finalize(Task::exec(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(stream.head_option().run(), Ok(Some(1)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

// ===== Error precedence =====

#[test]
fn finalizer_failure_on_clean_end_becomes_primary() {
    let stream = Stream::from_iter(vec![1, 2])
        .on_finalize(Task::fail(StreamError::production("finalizer broke")));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Finalizer);
    assert_eq!(error.message(), "finalizer broke");
}

#[test]
fn finalizer_failure_is_suppressed_onto_a_stream_failure() {
    let stream = Stream::<i32>::fail(StreamError::production("io-error"))
        .on_finalize(Task::fail(StreamError::production("finalizer broke")));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.message(), "io-error");
    assert_eq!(error.kind(), ErrorKind::Production);
    assert_eq!(error.suppressed().len(), 1);
    assert_eq!(error.suppressed()[0].message(), "finalizer broke");
    assert_eq!(error.suppressed()[0].kind(), ErrorKind::Finalizer);
}

#[test]
fn multiple_finalizer_failures_all_surface() {
    let stream = Stream::from_iter(vec![1])
        .on_finalize(Task::fail(StreamError::production("first broke")))
        .on_finalize(Task::fail(StreamError::production("second broke")));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.message(), "first broke");
    assert_eq!(error.suppressed().len(), 1);
    assert_eq!(error.suppressed()[0].message(), "second broke");
}

#[test]
fn failing_finalizer_does_not_stop_later_finalizers() {
    let log = event_log();
    let stream = Stream::from_iter(vec![1])
        .on_finalize(Task::fail(StreamError::production("first broke")))
        .on_finalize(logged_finalizer(&log, "second"));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.message(), "first broke");
    assert_eq!(*log.lock(), vec!["second"]);
}

#[test]
fn release_failure_and_finalizer_both_attach_to_a_stream_failure() {
    let stream = Stream::bracket(
        Task::succeed(()),
        |_| Stream::<i32>::fail(StreamError::production("io-error")),
        |()| Task::fail(StreamError::production("close-error")),
    )
    .on_finalize(Task::fail(StreamError::production("finalizer broke")));

    let error = stream.to_vec().run().unwrap_err();
    assert_eq!(error.message(), "io-error");
    let suppressed: Vec<_> = error
        .suppressed()
        .iter()
        .map(|failure| failure.message())
        .collect();
    assert_eq!(suppressed, vec!["close-error", "finalizer broke"]);
}
