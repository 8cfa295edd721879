// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{Instance, RcdError};
use rcd_online::{RecurringConceptEnsemble, TrainOutcome};
use std::collections::VecDeque;

/// Windowed accuracy sampled after `instances` evaluated instances.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CurvePoint {
    pub instances: u64,
    pub windowed_accuracy: f64,
}

/// Summary of a test-then-train run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PrequentialReport {
    pub instances: u64,
    pub skipped: u64,
    pub accuracy: f64,
    pub kappa: f64,
    pub curve: Vec<CurvePoint>,
}

/// Accumulates test-then-train outcomes: overall accuracy, Cohen's kappa and
/// a sliding-window accuracy curve sampled every `window` instances.
#[derive(Clone, Debug)]
pub struct PrequentialEvaluator {
    window: usize,
    recent: VecDeque<bool>,
    recent_correct: usize,
    instances: u64,
    skipped: u64,
    total_weight: f64,
    correct_weight: f64,
    true_class_weight: Vec<f64>,
    predicted_class_weight: Vec<f64>,
    curve: Vec<CurvePoint>,
}

impl PrequentialEvaluator {
    pub fn new(window: usize) -> Result<Self, RcdError> {
        if window == 0 {
            return Err(RcdError::invalid_input(
                "prequential window must be >= 1; got 0",
            ));
        }
        Ok(Self {
            window,
            recent: VecDeque::with_capacity(window),
            recent_correct: 0,
            instances: 0,
            skipped: 0,
            total_weight: 0.0,
            correct_weight: 0.0,
            true_class_weight: Vec::new(),
            predicted_class_weight: Vec::new(),
            curve: Vec::new(),
        })
    }

    pub fn instances(&self) -> u64 {
        self.instances
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Records one prediction for an instance whose true class is `label`.
    pub fn record(&mut self, label: usize, predicted: Option<usize>, weight: f64) {
        let correct = predicted == Some(label);
        self.instances += 1;
        self.total_weight += weight;
        if correct {
            self.correct_weight += weight;
        }
        add_weight(&mut self.true_class_weight, label, weight);
        if let Some(predicted) = predicted {
            add_weight(&mut self.predicted_class_weight, predicted, weight);
        }

        self.recent.push_back(correct);
        if correct {
            self.recent_correct += 1;
        }
        if self.recent.len() > self.window && self.recent.pop_front() == Some(true) {
            self.recent_correct -= 1;
        }
        if self.instances % self.window as u64 == 0 {
            self.curve.push(CurvePoint {
                instances: self.instances,
                windowed_accuracy: self.windowed_accuracy(),
            });
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_weight > 0.0 {
            self.correct_weight / self.total_weight
        } else {
            0.0
        }
    }

    /// Accuracy over the last `window` recorded instances.
    pub fn windowed_accuracy(&self) -> f64 {
        if self.recent.is_empty() {
            0.0
        } else {
            self.recent_correct as f64 / self.recent.len() as f64
        }
    }

    /// Cohen's kappa; 0 when chance agreement is already total.
    pub fn kappa(&self) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let observed = self.accuracy();
        let chance: f64 = self
            .true_class_weight
            .iter()
            .zip(&self.predicted_class_weight)
            .map(|(truth, predicted)| (truth / self.total_weight) * (predicted / self.total_weight))
            .sum();
        if chance >= 1.0 {
            return 0.0;
        }
        (observed - chance) / (1.0 - chance)
    }

    pub fn report(&self) -> PrequentialReport {
        PrequentialReport {
            instances: self.instances,
            skipped: self.skipped,
            accuracy: self.accuracy(),
            kappa: self.kappa(),
            curve: self.curve.clone(),
        }
    }
}

fn add_weight(weights: &mut Vec<f64>, class: usize, weight: f64) {
    if class >= weights.len() {
        weights.resize(class + 1, 0.0);
    }
    weights[class] += weight;
}

/// Test-then-train over `stream`: each labelled, finite instance is first
/// predicted, then used for training. Skipped instances are only counted.
pub fn run_prequential<I>(
    ensemble: &mut RecurringConceptEnsemble,
    stream: I,
    window: usize,
) -> Result<PrequentialReport, RcdError>
where
    I: IntoIterator<Item = Instance>,
{
    let mut evaluator = PrequentialEvaluator::new(window)?;
    for instance in stream {
        let predicted = ensemble.predict(&instance);
        match ensemble.train_on_instance(&instance)? {
            TrainOutcome::Trained => {
                if let Some(label) = instance.label {
                    evaluator.record(label, predicted, instance.weight);
                }
            }
            TrainOutcome::Skipped(_) => evaluator.record_skip(),
        }
    }
    Ok(evaluator.report())
}
