// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{Classifier, Instance};

const VARIANCE_FLOOR: f64 = 1e-6;
const LOG_2PI: f64 = 1.8378770664093453;

/// Weighted running mean/variance (West's incremental update).
#[derive(Clone, Debug, Default, PartialEq)]
struct RunningGaussian {
    weight_sum: f64,
    mean: f64,
    m2: f64,
}

impl RunningGaussian {
    fn update(&mut self, x: f64, weight: f64) {
        let next_weight = self.weight_sum + weight;
        let delta = x - self.mean;
        self.mean += delta * weight / next_weight;
        self.m2 += weight * delta * (x - self.mean);
        self.weight_sum = next_weight;
    }

    fn variance(&self) -> f64 {
        if self.weight_sum > 1.0 {
            (self.m2 / (self.weight_sum - 1.0)).max(VARIANCE_FLOOR)
        } else {
            VARIANCE_FLOOR
        }
    }

    fn log_density(&self, x: f64) -> f64 {
        if self.weight_sum <= 0.0 {
            return 0.0;
        }
        let var = self.variance();
        let centered = x - self.mean;
        -0.5 * (LOG_2PI + var.ln()) - centered * centered / (2.0 * var)
    }
}

/// Gaussian naive Bayes over numeric features with a growing class set.
#[derive(Clone, Debug, Default)]
pub struct GaussianNaiveBayes {
    class_weights: Vec<f64>,
    stats: Vec<Vec<RunningGaussian>>,
    total_weight: f64,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_classes(&self) -> usize {
        self.class_weights.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    fn ensure_class(&mut self, label: usize) {
        if label >= self.class_weights.len() {
            self.class_weights.resize(label + 1, 0.0);
            self.stats.resize_with(label + 1, Vec::new);
        }
    }
}

impl Classifier for GaussianNaiveBayes {
    fn train(&mut self, instance: &Instance, weight: f64) {
        let Some(label) = instance.label else {
            return;
        };
        if weight.is_nan() || weight <= 0.0 || !instance.has_finite_features() {
            return;
        }
        self.ensure_class(label);
        self.class_weights[label] += weight;
        self.total_weight += weight;

        let per_feature = &mut self.stats[label];
        if per_feature.len() < instance.features.len() {
            per_feature.resize_with(instance.features.len(), RunningGaussian::default);
        }
        for (stat, &x) in per_feature.iter_mut().zip(instance.features.iter()) {
            stat.update(x, weight);
        }
    }

    fn votes(&self, instance: &Instance) -> Vec<f64> {
        let mut votes = vec![0.0; self.class_weights.len()];
        if self.total_weight <= 0.0 {
            return votes;
        }

        let mut log_posteriors = vec![f64::NEG_INFINITY; self.class_weights.len()];
        for (class, &class_weight) in self.class_weights.iter().enumerate() {
            if class_weight <= 0.0 {
                continue;
            }
            let mut log_p = (class_weight / self.total_weight).ln();
            for (stat, &x) in self.stats[class].iter().zip(instance.features.iter()) {
                log_p += stat.log_density(x);
            }
            log_posteriors[class] = log_p;
        }

        let max_log = log_posteriors
            .iter()
            .copied()
            .filter(|value| value.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if !max_log.is_finite() {
            return votes;
        }

        let mut norm = 0.0;
        for (vote, &log_p) in votes.iter_mut().zip(log_posteriors.iter()) {
            if log_p.is_finite() {
                *vote = (log_p - max_log).exp();
                norm += *vote;
            }
        }
        if norm > 0.0 {
            for vote in &mut votes {
                *vote /= norm;
            }
        }
        votes
    }

    fn reset_learning(&mut self) {
        *self = Self::default();
    }

    fn copy(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::GaussianNaiveBayes;
    use proptest::prelude::*;
    use rcd_core::{Classifier, Instance, argmax};

    fn trained_two_cluster_model() -> GaussianNaiveBayes {
        let mut model = GaussianNaiveBayes::new();
        for i in 0..50 {
            let jitter = (i % 5) as f64 * 0.1;
            model.train(&Instance::new(vec![0.0 + jitter, 0.0 - jitter], 0), 1.0);
            model.train(&Instance::new(vec![5.0 + jitter, 5.0 - jitter], 1), 1.0);
        }
        model
    }

    #[test]
    fn separates_well_spaced_clusters() {
        let model = trained_two_cluster_model();
        assert_eq!(model.num_classes(), 2);
        assert_eq!(argmax(&model.votes(&Instance::unlabeled(vec![0.1, 0.1]))), Some(0));
        assert_eq!(argmax(&model.votes(&Instance::unlabeled(vec![4.9, 5.2]))), Some(1));
        assert!(model.correctly_classifies(&Instance::new(vec![5.0, 5.0], 1)));
    }

    #[test]
    fn untrained_model_returns_no_votes() {
        let model = GaussianNaiveBayes::new();
        assert!(model.votes(&Instance::unlabeled(vec![1.0])).is_empty());
        assert!(!model.correctly_classifies(&Instance::new(vec![1.0], 0)));
    }

    #[test]
    fn zero_weight_and_unlabeled_training_is_ignored() {
        let mut model = GaussianNaiveBayes::new();
        model.train(&Instance::new(vec![1.0], 0), 0.0);
        model.train(&Instance::unlabeled(vec![1.0]), 3.0);
        model.train(&Instance::new(vec![f64::NAN], 0), 1.0);
        assert_eq!(model.total_weight(), 0.0);
    }

    #[test]
    fn copy_is_independent_and_reset_clears_state() {
        let mut model = trained_two_cluster_model();
        let snapshot = model.copy();
        let probe = Instance::unlabeled(vec![2.0, 2.0]);
        let before = snapshot.votes(&probe);

        for _ in 0..200 {
            model.train(&Instance::new(vec![2.0, 2.0], 1), 1.0);
        }
        assert_eq!(snapshot.votes(&probe), before);

        model.reset_learning();
        assert_eq!(model.num_classes(), 0);
        assert_eq!(model.total_weight(), 0.0);
    }

    proptest! {
        #[test]
        fn votes_form_a_distribution(
            points in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0, 0usize..4), 1..60),
            probe in (-100.0f64..100.0, -100.0f64..100.0),
        ) {
            let mut model = GaussianNaiveBayes::new();
            for (x, y, label) in &points {
                model.train(&Instance::new(vec![*x, *y], *label), 1.0);
            }
            let votes = model.votes(&Instance::unlabeled(vec![probe.0, probe.1]));
            let sum: f64 = votes.iter().sum();
            prop_assert!(votes.iter().all(|v| v.is_finite() && *v >= 0.0));
            prop_assert!((sum - 1.0).abs() < 1e-9, "votes sum to {sum}");
        }
    }
}
