// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod dynamic_window;
pub mod ensemble;
pub mod evaluator;
pub mod history;
pub mod model;
pub mod selection;
pub mod slot;

pub use config::{EnsembleConfig, HistoryConfig};
pub use dynamic_window::{DynamicWindowEvaluator, WindowedEvaluator};
pub use ensemble::{RecurringConceptEnsemble, SkipReason, TrainOutcome};
pub use evaluator::BasicEvaluator;
pub use history::{Concept, ConceptHistory, ConceptSnapshot, Group, HistoryState};
pub use model::{LearnerModel, ModelRole};
pub use selection::{DriftDecision, DriftDecisionMechanism, best_historical, select};
pub use slot::{BaseLearnerSlot, LearnerParts, SlotContext, SlotOptions, SlotState, WarningWindow};

/// Recurring concept drift ensemble namespace.
pub fn crate_name() -> &'static str {
    let _ = (rcd_core::crate_name(), rcd_learners::crate_name());
    "rcd-online"
}
