// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// One labelled (or unlabelled) observation flowing through the stream.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub features: Vec<f64>,
    pub label: Option<usize>,
    pub weight: f64,
}

impl Instance {
    pub fn new(features: Vec<f64>, label: usize) -> Self {
        Self {
            features,
            label: Some(label),
            weight: 1.0,
        }
    }

    pub fn unlabeled(features: Vec<f64>) -> Self {
        Self {
            features,
            label: None,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Returns true when every feature value is finite.
    pub fn has_finite_features(&self) -> bool {
        self.features.iter().all(|value| value.is_finite())
    }
}

/// Index of the largest vote; ties resolve to the lowest index.
///
/// Returns `None` for an empty vote vector or when any vote is NaN.
pub fn argmax(votes: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &vote) in votes.iter().enumerate() {
        if vote.is_nan() {
            return None;
        }
        match best {
            Some((_, best_vote)) if vote <= best_vote => {}
            _ => best = Some((idx, vote)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Euclidean distance over the shared prefix of two points.
///
/// Missing trailing coordinates are treated as zero so that points recorded
/// before a feature was first observed remain comparable.
pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    let len = lhs.len().max(rhs.len());
    let mut sum_sq = 0.0;
    for idx in 0..len {
        let a = lhs.get(idx).copied().unwrap_or(0.0);
        let b = rhs.get(idx).copied().unwrap_or(0.0);
        let diff = a - b;
        sum_sq += diff * diff;
    }
    sum_sq.sqrt()
}
