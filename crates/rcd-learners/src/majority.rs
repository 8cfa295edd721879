// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{Classifier, Instance};

/// Predicts the class with the largest accumulated training weight.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MajorityClass {
    class_weights: Vec<f64>,
}

impl MajorityClass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for MajorityClass {
    fn train(&mut self, instance: &Instance, weight: f64) {
        let Some(label) = instance.label else {
            return;
        };
        if weight.is_nan() || weight <= 0.0 {
            return;
        }
        if label >= self.class_weights.len() {
            self.class_weights.resize(label + 1, 0.0);
        }
        self.class_weights[label] += weight;
    }

    fn votes(&self, _instance: &Instance) -> Vec<f64> {
        let total: f64 = self.class_weights.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.class_weights.len()];
        }
        self.class_weights.iter().map(|w| w / total).collect()
    }

    fn reset_learning(&mut self) {
        self.class_weights.clear();
    }

    fn copy(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
