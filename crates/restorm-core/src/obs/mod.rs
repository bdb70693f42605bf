//! Observability: in-process counters behind a sink abstraction.
//!
//! Executors and the translator only emit `MetricsEvent`s; nothing outside
//! `sink` touches the counter state.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EventOps, EventPerf, EventReport, EventState};
pub use sink::{
    ExecKind, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink,
};
