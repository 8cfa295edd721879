// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::events::DriftKind;

/// Diagnostics schema version for ensemble run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Per-position warning and drift counters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotCounters {
    pub warnings_detected: u64,
    pub drifts_detected: u64,
    pub false_alarms: u64,
    pub background_drifts: u64,
    pub recurring_drifts: u64,
    pub warning_window_resets: u64,
}

impl SlotCounters {
    pub fn record_resolution(&mut self, kind: DriftKind) {
        match kind {
            DriftKind::FalseAlarm => self.false_alarms += 1,
            DriftKind::Background => self.background_drifts += 1,
            DriftKind::Recurring => self.recurring_drifts += 1,
        }
    }

    pub fn merge(&mut self, other: &SlotCounters) {
        self.warnings_detected += other.warnings_detected;
        self.drifts_detected += other.drifts_detected;
        self.false_alarms += other.false_alarms;
        self.background_drifts += other.background_drifts;
        self.recurring_drifts += other.recurring_drifts;
        self.warning_window_resets += other.warning_window_resets;
    }
}

/// Structured diagnostics captured from an ensemble run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleDiagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub ensemble_size: usize,
    pub worker_count: usize,
    pub instances_seen: u64,
    pub instances_skipped: u64,
    pub counters: SlotCounters,
    pub history_concepts: usize,
    pub history_groups: usize,
}

impl EnsembleDiagnostics {
    pub fn warnings_detected(&self) -> u64 {
        self.counters.warnings_detected
    }

    pub fn drifts_detected(&self) -> u64 {
        self.counters.drifts_detected
    }
}

impl Default for EnsembleDiagnostics {
    fn default() -> Self {
        Self {
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            ensemble_size: 0,
            worker_count: 1,
            instances_seen: 0,
            instances_skipped: 0,
            counters: SlotCounters::default(),
            history_concepts: 0,
            history_groups: 0,
        }
    }
}
