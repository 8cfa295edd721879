// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod events;
pub mod instance;
pub mod learner;
pub mod window;

pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, EnsembleDiagnostics, SlotCounters};
pub use error::RcdError;
pub use events::{CollectingEventSink, DriftEvent, DriftKind, EventSink, NoopEventSink};
pub use instance::{Instance, argmax, euclidean_distance};
pub use learner::{ChangeDetector, Classifier, PerformanceEvaluator, TopologyLearner};
pub use window::{ResizePolicy, WindowConfig};

/// Core shared types and traits for recurring concept drift ensembles.
pub fn crate_name() -> &'static str {
    "rcd-core"
}
