//! Metrics sink boundary.
//!
//! Execution logic MUST NOT depend on any concrete metrics backend.
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`;
//! a sink is installed per execution scope by the session, and emitting
//! with no sink installed is a no-op. Result semantics never depend on it.

use std::cell::Cell;

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Save,
    Delete,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    ExecStart {
        kind: ExecKind,
        entity: &'static str,
    },
    ExecFinish {
        kind: ExecKind,
        entity: &'static str,
        rows: u64,
    },
    RowsScanned {
        entity: &'static str,
        rows: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

thread_local! {
    static CURRENT_SINK: Cell<Option<&'static dyn MetricsSink>> = const { Cell::new(None) };
}

/// Install `sink` for the duration of `f`, restoring the previous sink on
/// every exit path.
pub fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Restore(Option<&'static dyn MetricsSink>);

    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_SINK.with(|cell| cell.set(self.0));
        }
    }

    let _restore = Restore(CURRENT_SINK.with(|cell| cell.replace(Some(sink))));

    f()
}

/// Report one event to the currently installed sink, if any.
pub(crate) fn emit(event: MetricsEvent) {
    CURRENT_SINK.with(|cell| {
        if let Some(sink) = cell.get() {
            sink.record(event);
        }
    });
}
