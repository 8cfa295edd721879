// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{Instance, PerformanceEvaluator, argmax};

/// Weighted cumulative accuracy since creation or the last reset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicEvaluator {
    weight_observed: f64,
    weight_correct: f64,
}

impl BasicEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight_observed(&self) -> f64 {
        self.weight_observed
    }

    pub fn accuracy(&self) -> f64 {
        if self.weight_observed > 0.0 {
            self.weight_correct / self.weight_observed
        } else {
            0.0
        }
    }
}

impl PerformanceEvaluator for BasicEvaluator {
    fn add_result(&mut self, instance: &Instance, votes: &[f64]) {
        let Some(label) = instance.label else {
            return;
        };
        let weight = instance.weight;
        if !weight.is_finite() || weight <= 0.0 {
            return;
        }
        self.weight_observed += weight;
        if argmax(votes) == Some(label) {
            self.weight_correct += weight;
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zero until something has been observed.
    fn fraction_incorrectly_classified(&self) -> f64 {
        if self.weight_observed > 0.0 {
            1.0 - self.accuracy()
        } else {
            0.0
        }
    }
}
