// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rcd_core::{Instance, RcdError};

/// Synthetic stream made of segments, each drawn from one of `num_concepts`
/// random hyperplane concepts in the order given by `schedule`.
///
/// Concept normals are mutually orthogonal when `num_concepts <= num_features`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    pub num_features: usize,
    pub num_concepts: usize,
    /// Concept id per segment; ids may repeat to create recurrences.
    pub schedule: Vec<usize>,
    pub segment_length: usize,
    /// Probability of flipping each label.
    pub label_noise: f64,
    /// Offset added to every feature of concept `c`, times `c`. Zero keeps all
    /// concepts on the same input distribution.
    pub concept_shift: f64,
    pub seed: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            num_features: 2,
            num_concepts: 2,
            schedule: vec![0, 1, 0, 1],
            segment_length: 1_000,
            label_noise: 0.0,
            concept_shift: 0.0,
            seed: 7,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if self.num_features == 0 {
            return Err(RcdError::invalid_input(
                "stream.num_features must be >= 1; got 0",
            ));
        }
        if self.num_concepts == 0 {
            return Err(RcdError::invalid_input(
                "stream.num_concepts must be >= 1; got 0",
            ));
        }
        if self.segment_length == 0 {
            return Err(RcdError::invalid_input(
                "stream.segment_length must be >= 1; got 0",
            ));
        }
        if let Some(bad) = self.schedule.iter().find(|&&id| id >= self.num_concepts) {
            return Err(RcdError::invalid_input(format!(
                "stream.schedule refers to concept {bad} but num_concepts={}",
                self.num_concepts
            )));
        }
        if !(0.0..0.5).contains(&self.label_noise) {
            return Err(RcdError::invalid_input(format!(
                "stream.label_noise must be in [0, 0.5); got {}",
                self.label_noise
            )));
        }
        if !self.concept_shift.is_finite() {
            return Err(RcdError::invalid_input(format!(
                "stream.concept_shift must be finite; got {}",
                self.concept_shift
            )));
        }
        Ok(())
    }
}

/// Deterministic recurring-concept stream.
#[derive(Clone, Debug)]
pub struct RecurringStreamGenerator {
    config: StreamConfig,
    hyperplanes: Vec<Vec<f64>>,
    rng: ChaCha8Rng,
    emitted: usize,
}

impl RecurringStreamGenerator {
    pub fn new(config: StreamConfig) -> Result<Self, RcdError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut hyperplanes: Vec<Vec<f64>> = Vec::with_capacity(config.num_concepts);
        for _ in 0..config.num_concepts {
            let normal = random_normal(&mut rng, &hyperplanes, config.num_features);
            hyperplanes.push(normal);
        }
        Ok(Self {
            config,
            hyperplanes,
            rng,
            emitted: 0,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.config.schedule.len() * self.config.segment_length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based index of the first instance of every segment whose concept
    /// differs from the previous segment's.
    pub fn drift_points(&self) -> Vec<usize> {
        self.config
            .schedule
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0] != pair[1])
            .map(|(segment, _)| (segment + 1) * self.config.segment_length)
            .collect()
    }

    /// Concept generating the instance at zero-based `index`.
    pub fn concept_at(&self, index: usize) -> Option<usize> {
        self.config
            .schedule
            .get(index / self.config.segment_length)
            .copied()
    }
}

impl Iterator for RecurringStreamGenerator {
    type Item = Instance;

    fn next(&mut self) -> Option<Instance> {
        let concept = self.concept_at(self.emitted)?;
        self.emitted += 1;

        let offset = self.config.concept_shift * concept as f64;
        let raw: Vec<f64> = (0..self.config.num_features)
            .map(|_| self.rng.gen_range(-1.0..1.0))
            .collect();
        let score: f64 = raw
            .iter()
            .zip(&self.hyperplanes[concept])
            .map(|(x, w)| x * w)
            .sum();
        let mut label = usize::from(score > 0.0);
        if self.config.label_noise > 0.0 && self.rng.gen_bool(self.config.label_noise) {
            label = 1 - label;
        }
        let features = raw.into_iter().map(|x| x + offset).collect();
        Some(Instance::new(features, label))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len().saturating_sub(self.emitted);
        (remaining, Some(remaining))
    }
}

/// Random unit normal, orthogonal to `previous` while the dimension allows it
/// so that distinct concepts disagree on a large share of the input space.
fn random_normal(rng: &mut ChaCha8Rng, previous: &[Vec<f64>], dimension: usize) -> Vec<f64> {
    loop {
        let mut candidate: Vec<f64> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
        if previous.len() < dimension {
            for basis in previous {
                let projection: f64 = candidate.iter().zip(basis).map(|(x, b)| x * b).sum();
                candidate
                    .iter_mut()
                    .zip(basis)
                    .for_each(|(x, b)| *x -= projection * b);
            }
        }
        let norm = candidate.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-3 {
            return candidate.into_iter().map(|x| x / norm).collect();
        }
    }
}
