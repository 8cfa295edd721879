// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::instance::{Instance, argmax};
use std::fmt::Debug;

/// Incremental classifier contract consumed by ensemble slots.
///
/// `copy` must return a fully independent model: the drift core snapshots live
/// classifiers into the concept history and relies on the snapshot never
/// observing later training of the original.
pub trait Classifier: Send + Sync + Debug {
    fn train(&mut self, instance: &Instance, weight: f64);
    fn votes(&self, instance: &Instance) -> Vec<f64>;
    fn reset_learning(&mut self);
    fn copy(&self) -> Box<dyn Classifier>;

    fn correctly_classifies(&self, instance: &Instance) -> bool {
        match instance.label {
            Some(label) => argmax(&self.votes(instance)) == Some(label),
            None => false,
        }
    }
}

/// Change-detector contract fed with 0/1 error signals.
pub trait ChangeDetector: Send + Sync + Debug {
    fn input(&mut self, value: f64);
    /// True when the most recent `input` signalled a change.
    fn detected_change(&self) -> bool;
    fn reset(&mut self);
    fn copy(&self) -> Box<dyn ChangeDetector>;
}

/// Clustering learner that summarises the feature-space region of a concept.
pub trait TopologyLearner: Send + Sync + Debug {
    fn train(&mut self, instance: &Instance);
    fn prototypes(&self) -> Vec<Vec<f64>>;
    fn prototypes_created(&self) -> usize;
    fn reset(&mut self);
    fn copy(&self) -> Box<dyn TopologyLearner>;
}

/// Cumulative performance evaluator contract.
pub trait PerformanceEvaluator {
    fn add_result(&mut self, instance: &Instance, votes: &[f64]);
    fn reset(&mut self);
    fn fraction_incorrectly_classified(&self) -> f64;
}
