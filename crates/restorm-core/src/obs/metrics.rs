use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters and simple perf totals for operations.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub perf: EventPerf,
    pub tables: BTreeMap<String, EntityCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            perf: EventPerf::default(),
            tables: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Executor entrypoints
    pub load_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,

    // Rows
    pub rows_loaded: u64,
    pub rows_written: u64,

    // Translation and dispatch outcomes
    pub translation_fallbacks: u64,
    pub deletes_elided: u64,
    pub requests_failed: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntityCounters {
    pub load_calls: u64,
    pub write_calls: u64,
    pub rows_loaded: u64,
    pub rows_written: u64,
    pub translation_fallbacks: u64,
    pub deletes_elided: u64,
    pub requests_failed: u64,
}

///
/// EventPerf
/// Wall-clock totals per executor kind, in microseconds.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventPerf {
    pub load_micros_total: u128,
    pub write_micros_total: u128,

    pub load_micros_max: u64,
    pub write_micros_max: u64,
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Counters since `window_start_ms`; `None` when the window is newer
    /// than the requested start.
    pub counters: Option<EventState>,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    with_state(|m| {
        let include = window_start_ms.is_none_or(|start| start <= m.window_start_ms);

        EventReport {
            counters: include.then(|| m.clone()),
        }
    })
}

/// Accumulate a duration and track the max.
pub(crate) fn add_micros(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}
