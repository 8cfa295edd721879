// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod drift_metrics;
pub mod generator;
pub mod prequential;

pub use drift_metrics::{DriftDetectionMetrics, alert_steps_from_events, drift_detection_metrics};
pub use generator::{RecurringStreamGenerator, StreamConfig};
pub use prequential::{CurvePoint, PrequentialEvaluator, PrequentialReport, run_prequential};

/// Evaluation utilities crate name helper.
pub fn crate_name() -> &'static str {
    let _ = rcd_online::crate_name();
    "rcd-eval"
}
