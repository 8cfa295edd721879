// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use parking_lot::Mutex;

/// Outcome of a drift resolution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriftKind {
    FalseAlarm,
    Background,
    Recurring,
}

impl DriftKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FalseAlarm => "false_alarm",
            Self::Background => "background",
            Self::Recurring => "recurring",
        }
    }
}

/// Typed occurrences emitted by the drift core for external logging.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum DriftEvent {
    WarningOpened {
        position: usize,
        instances_seen: u64,
        error_before_warning: f64,
    },
    WarningWindowReset {
        position: usize,
        instances_seen: u64,
        buffered_instances: usize,
    },
    DriftResolved {
        position: usize,
        instances_seen: u64,
        kind: DriftKind,
        history_index: Option<usize>,
        active_error: Option<f64>,
        background_error: Option<f64>,
    },
    TrainExample {
        position: usize,
        instances_seen: u64,
        correct: bool,
    },
}

impl DriftEvent {
    pub fn position(&self) -> usize {
        match self {
            Self::WarningOpened { position, .. }
            | Self::WarningWindowReset { position, .. }
            | Self::DriftResolved { position, .. }
            | Self::TrainExample { position, .. } => *position,
        }
    }

    pub fn instances_seen(&self) -> u64 {
        match self {
            Self::WarningOpened { instances_seen, .. }
            | Self::WarningWindowReset { instances_seen, .. }
            | Self::DriftResolved { instances_seen, .. }
            | Self::TrainExample { instances_seen, .. } => *instances_seen,
        }
    }
}

/// Receiver of drift events. Implementations must tolerate calls from worker threads.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &DriftEvent);
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn on_event(&self, _event: &DriftEvent) {}
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<DriftEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<DriftEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<DriftEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn on_event(&self, event: &DriftEvent) {
        self.events.lock().push(event.clone());
    }
}
