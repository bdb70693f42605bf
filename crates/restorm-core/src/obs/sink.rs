//! Metrics sink boundary.
//!
//! Translator and executor code MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::obs::metrics::{self, EventReport};
use std::{cell::RefCell, sync::Arc, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Arc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Insert,
    Update,
    Delete,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        table: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        table: &'a str,
        rows: u64,
        elapsed_micros: u64,
    },
    TranslationFallback {
        table: &'a str,
        reason: &'a str,
    },
    DeleteElided {
        table: &'a str,
    },
    RequestFailed {
        kind: ExecKind,
        table: &'a str,
        status: Option<u16>,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default sink writing into the thread's counter state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, table } => {
                metrics::with_state_mut(|m| {
                    let ops = &mut m.ops;
                    let calls = match kind {
                        ExecKind::Load => &mut ops.load_calls,
                        ExecKind::Insert => &mut ops.insert_calls,
                        ExecKind::Update => &mut ops.update_calls,
                        ExecKind::Delete => &mut ops.delete_calls,
                    };
                    *calls = calls.saturating_add(1);

                    let entry = m.tables.entry(table.to_string()).or_default();
                    if kind == ExecKind::Load {
                        entry.load_calls = entry.load_calls.saturating_add(1);
                    } else {
                        entry.write_calls = entry.write_calls.saturating_add(1);
                    }
                });
            }

            MetricsEvent::ExecFinish {
                kind,
                table,
                rows,
                elapsed_micros,
            } => {
                metrics::with_state_mut(|m| {
                    let entry = m.tables.entry(table.to_string()).or_default();
                    if kind == ExecKind::Load {
                        m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows);
                        entry.rows_loaded = entry.rows_loaded.saturating_add(rows);
                        metrics::add_micros(
                            &mut m.perf.load_micros_total,
                            &mut m.perf.load_micros_max,
                            elapsed_micros,
                        );
                    } else {
                        m.ops.rows_written = m.ops.rows_written.saturating_add(rows);
                        entry.rows_written = entry.rows_written.saturating_add(rows);
                        metrics::add_micros(
                            &mut m.perf.write_micros_total,
                            &mut m.perf.write_micros_max,
                            elapsed_micros,
                        );
                    }
                });
            }

            MetricsEvent::TranslationFallback { table, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.translation_fallbacks = m.ops.translation_fallbacks.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.translation_fallbacks = entry.translation_fallbacks.saturating_add(1);
                });
            }

            MetricsEvent::DeleteElided { table } => {
                metrics::with_state_mut(|m| {
                    m.ops.deletes_elided = m.ops.deletes_elided.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.deletes_elided = entry.deletes_elided.saturating_add(1);
                });
            }

            MetricsEvent::RequestFailed { table, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.requests_failed = m.ops.requests_failed.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.requests_failed = entry.requests_failed.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current thread's metrics state.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state (counters + perf).
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: Arc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Arc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one executor call.
/// Ensures finish accounting happens even on early return or unwind.

pub(crate) struct Span {
    kind: ExecKind,
    table: String,
    start: Instant,
    rows: u64,
    finished: bool,
}

impl Span {
    #[must_use]
    /// Start a metrics span for a specific table and executor kind.
    pub(crate) fn new(kind: ExecKind, table: &str) -> Self {
        record(MetricsEvent::ExecStart { kind, table });

        Self {
            kind,
            table: table.to_string(),
            start: Instant::now(),
            rows: 0,
            finished: false,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }

    fn finish_inner(&self) {
        let elapsed_micros = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);

        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            table: &self.table,
            rows: self.rows,
            elapsed_micros,
        });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.finished {
            self.finish_inner();
            self.finished = true;
        }
    }
}

///
/// TESTS
///
