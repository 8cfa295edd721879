// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{Instance, RcdError, TopologyLearner, euclidean_distance};

/// Growing prototype topology configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrototypeTopologyConfig {
    /// Points farther than this from every prototype seed a new prototype.
    pub distance_threshold: f64,
    pub learning_rate: f64,
    pub max_prototypes: usize,
}

impl Default for PrototypeTopologyConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 1.0,
            learning_rate: 0.05,
            max_prototypes: 50,
        }
    }
}

impl PrototypeTopologyConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(RcdError::invalid_input(format!(
                "topology distance_threshold must be finite and > 0; got {}",
                self.distance_threshold
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 || self.learning_rate > 1.0 {
            return Err(RcdError::invalid_input(format!(
                "topology learning_rate must be in (0, 1]; got {}",
                self.learning_rate
            )));
        }
        if self.max_prototypes == 0 {
            return Err(RcdError::invalid_input(
                "topology max_prototypes must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Threshold quantizer: the winning prototype moves toward each point that
/// falls within `distance_threshold`; other points seed new prototypes until
/// `max_prototypes` is reached.
#[derive(Clone, Debug)]
pub struct PrototypeTopology {
    config: PrototypeTopologyConfig,
    prototypes: Vec<Vec<f64>>,
    created: usize,
}

impl PrototypeTopology {
    pub fn new(config: PrototypeTopologyConfig) -> Result<Self, RcdError> {
        config.validate()?;
        Ok(Self {
            config,
            prototypes: Vec::new(),
            created: 0,
        })
    }

    pub fn config(&self) -> &PrototypeTopologyConfig {
        &self.config
    }

    fn nearest(&self, point: &[f64]) -> Option<(usize, f64)> {
        self.prototypes
            .iter()
            .enumerate()
            .map(|(idx, proto)| (idx, euclidean_distance(proto, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl TopologyLearner for PrototypeTopology {
    fn train(&mut self, instance: &Instance) {
        if !instance.has_finite_features() || instance.features.is_empty() {
            return;
        }
        let point = &instance.features;
        match self.nearest(point) {
            Some((idx, distance))
                if distance <= self.config.distance_threshold
                    || self.prototypes.len() >= self.config.max_prototypes =>
            {
                let rate = self.config.learning_rate;
                let proto = &mut self.prototypes[idx];
                if proto.len() < point.len() {
                    proto.resize(point.len(), 0.0);
                }
                for (coord, &x) in proto.iter_mut().zip(point.iter()) {
                    *coord += rate * (x - *coord);
                }
            }
            _ => {
                self.prototypes.push(point.clone());
                self.created += 1;
            }
        }
    }

    fn prototypes(&self) -> Vec<Vec<f64>> {
        self.prototypes.clone()
    }

    fn prototypes_created(&self) -> usize {
        self.created
    }

    fn reset(&mut self) {
        self.prototypes.clear();
        self.created = 0;
    }

    fn copy(&self) -> Box<dyn TopologyLearner> {
        Box::new(self.clone())
    }
}
