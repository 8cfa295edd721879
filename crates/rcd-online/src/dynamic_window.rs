// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{RcdError, ResizePolicy, WindowConfig};
use std::collections::{BTreeMap, VecDeque};

/// Evaluator operations the drift core needs from a windowed comparator.
pub trait WindowedEvaluator {
    /// Registers (or overwrites) a tracked index with its own baseline and size.
    fn add_model(&mut self, index: usize, prior_error: f64, window_size: usize);
    fn remove_model(&mut self, index: usize);
    fn contains_index(&self, index: usize) -> bool;
    fn estimation(&self, index: usize) -> Result<f64, RcdError>;
    fn fraction_incorrect(&self, index: usize) -> Result<f64, RcdError>;
    fn window_size(&self, index: usize) -> Result<usize, RcdError>;
    fn tracked_count(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq)]
struct TrackedWindow {
    size: usize,
    default_size: usize,
    prior_error: f64,
}

/// One shared ring of correctness observations compared over per-index windows.
///
/// After every `add`, the ring is trimmed to
/// `max(default_size, tracked sizes) + increment` observations.
#[derive(Clone, Debug)]
pub struct DynamicWindowEvaluator {
    config: WindowConfig,
    ring: VecDeque<f64>,
    tracked: BTreeMap<usize, TrackedWindow>,
    total_added: u64,
}

impl DynamicWindowEvaluator {
    pub fn new(config: WindowConfig) -> Result<Self, RcdError> {
        config.validate()?;
        Ok(Self {
            ring: VecDeque::with_capacity(config.default_size + config.increment),
            config,
            tracked: BTreeMap::new(),
            total_added: 0,
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    pub fn tracked_indices(&self) -> Vec<usize> {
        self.tracked.keys().copied().collect()
    }

    pub fn default_size(&self, index: usize) -> Result<usize, RcdError> {
        self.tracked_window(index).map(|tracked| tracked.default_size)
    }

    pub fn prior_error(&self, index: usize) -> Result<f64, RcdError> {
        self.tracked_window(index).map(|tracked| tracked.prior_error)
    }

    /// Number of observations the ring keeps after trimming.
    pub fn capacity(&self) -> usize {
        let widest = self
            .tracked
            .values()
            .map(|tracked| tracked.size)
            .max()
            .unwrap_or(0)
            .max(self.config.default_size);
        widest + self.config.increment
    }

    /// Records one prediction outcome.
    pub fn add_correctness(&mut self, correct: bool) {
        self.add(if correct { 1.0 } else { 0.0 });
    }

    /// Appends an observation, resizes every tracked window, then trims the ring.
    pub fn add(&mut self, observation: f64) {
        self.ring.push_back(observation);
        self.total_added = self.total_added.saturating_add(1);

        if self.config.resize_enabled {
            let growth_limit = self.growth_limit();
            let config = &self.config;
            let ring = &self.ring;
            for tracked in self.tracked.values_mut() {
                tracked.size = next_size(config, ring, tracked, growth_limit);
            }
        }

        let capacity = self.capacity();
        while self.ring.len() > capacity {
            self.ring.pop_front();
        }
    }

    /// Widest size a window may grow to on this step. Unbounded while the ring
    /// still holds every observation; afterwards one increment short of the
    /// ring, so the trimmed ring keeps `size + increment` observations.
    fn growth_limit(&self) -> Option<usize> {
        let held = self.ring.len();
        if held as u64 >= self.total_added {
            None
        } else {
            Some(held.saturating_sub(self.config.increment))
        }
    }

    fn tracked_window(&self, index: usize) -> Result<&TrackedWindow, RcdError> {
        self.tracked.get(&index).ok_or_else(|| {
            RcdError::invalid_state(format!(
                "dynamic window evaluator does not track index {index}"
            ))
        })
    }
}

/// Mean of the trailing `size` observations, or of everything held when fewer exist.
fn trailing_mean(ring: &VecDeque<f64>, size: usize) -> f64 {
    let take = size.min(ring.len());
    if take == 0 {
        return 0.0;
    }
    let sum: f64 = ring.iter().rev().take(take).sum();
    sum / take as f64
}

/// Resize step for one window. The delta policies compare the windowed error
/// with the prior error; the three-way policy moves toward the most accurate
/// of the three candidate windows.
fn next_size(
    config: &WindowConfig,
    ring: &VecDeque<f64>,
    tracked: &TrackedWindow,
    growth_limit: Option<usize>,
) -> usize {
    let size = tracked.size;
    let mut grown = size.saturating_add(config.increment);
    if let Some(limit) = growth_limit {
        grown = grown.min(limit.max(size));
    }
    let shrunk = size.saturating_sub(config.increment);
    let estimation = trailing_mean(ring, size);
    let error = 1.0 - estimation;

    let proposed = match config.resize_policy {
        ResizePolicy::ErrorDelta => {
            if error < tracked.prior_error {
                grown
            } else {
                shrunk
            }
        }
        ResizePolicy::ThresholdedErrorDelta => {
            if error - tracked.prior_error <= config.decision_threshold {
                grown
            } else {
                shrunk
            }
        }
        ResizePolicy::ThreeWayCandidate => {
            let large = trailing_mean(ring, grown);
            let small = trailing_mean(ring, shrunk.max(1));
            if large > estimation && large > small {
                grown
            } else if small > estimation && small > large {
                shrunk
            } else {
                size
            }
        }
    };
    proposed.max(config.min_size)
}

impl WindowedEvaluator for DynamicWindowEvaluator {
    fn add_model(&mut self, index: usize, prior_error: f64, window_size: usize) {
        self.tracked.insert(
            index,
            TrackedWindow {
                size: window_size.max(self.config.min_size),
                default_size: window_size,
                prior_error,
            },
        );
    }

    fn remove_model(&mut self, index: usize) {
        self.tracked.remove(&index);
    }

    fn contains_index(&self, index: usize) -> bool {
        self.tracked.contains_key(&index)
    }

    fn estimation(&self, index: usize) -> Result<f64, RcdError> {
        let tracked = self.tracked_window(index)?;
        Ok(trailing_mean(&self.ring, tracked.size))
    }

    fn fraction_incorrect(&self, index: usize) -> Result<f64, RcdError> {
        Ok(1.0 - self.estimation(index)?)
    }

    fn window_size(&self, index: usize) -> Result<usize, RcdError> {
        self.tracked_window(index).map(|tracked| tracked.size)
    }

    fn tracked_count(&self) -> usize {
        self.tracked.len()
    }
}
