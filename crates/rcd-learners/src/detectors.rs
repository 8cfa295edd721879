// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{ChangeDetector, RcdError};
use std::collections::VecDeque;

const ADWIN_MAX_BUCKETS: usize = 5;
const ADWIN_CLOCK: u64 = 32;
const ADWIN_MIN_WINDOW: usize = 10;
const ADWIN_MIN_SUBWINDOW: usize = 5;

/// ADWIN detector configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdwinConfig {
    pub delta: f64,
}

impl Default for AdwinConfig {
    fn default() -> Self {
        Self { delta: 0.002 }
    }
}

impl AdwinConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if !self.delta.is_finite() || self.delta <= 0.0 || self.delta >= 1.0 {
            return Err(RcdError::invalid_input(format!(
                "ADWIN delta must be finite and in (0, 1); got {}",
                self.delta
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Bucket {
    total: f64,
    variance: f64,
}

/// Adaptive windowing over an exponential histogram of buckets.
///
/// Row `i` holds buckets summarising `2^i` observations; within a row the
/// front bucket is the newest. The last row holds the oldest observations.
#[derive(Clone, Debug)]
pub struct Adwin {
    config: AdwinConfig,
    rows: Vec<VecDeque<Bucket>>,
    width: usize,
    total: f64,
    variance: f64,
    ticks: u64,
    change: bool,
}

impl Adwin {
    pub fn new(config: AdwinConfig) -> Result<Self, RcdError> {
        config.validate()?;
        Ok(Self {
            config,
            rows: vec![VecDeque::new()],
            width: 0,
            total: 0.0,
            variance: 0.0,
            ticks: 0,
            change: false,
        })
    }

    pub fn config(&self) -> &AdwinConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn mean(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.total / self.width as f64
        }
    }

    fn bucket_size(row: usize) -> usize {
        1usize << row
    }

    fn insert(&mut self, value: f64) {
        self.width += 1;
        if self.width > 1 {
            let n = self.width as f64;
            let prev_mean = self.total / (n - 1.0);
            self.variance += (n - 1.0) * (value - prev_mean) * (value - prev_mean) / n;
        }
        self.total += value;
        self.rows[0].push_front(Bucket {
            total: value,
            variance: 0.0,
        });
        self.compress();
    }

    fn compress(&mut self) {
        let mut row = 0;
        while row < self.rows.len() {
            if self.rows[row].len() <= ADWIN_MAX_BUCKETS {
                break;
            }
            let (Some(oldest), Some(second)) = (self.rows[row].pop_back(), self.rows[row].pop_back())
            else {
                break;
            };
            let n = Self::bucket_size(row) as f64;
            let mean_gap = oldest.total / n - second.total / n;
            let merged = Bucket {
                total: oldest.total + second.total,
                variance: oldest.variance + second.variance + n * n * mean_gap * mean_gap / (2.0 * n),
            };
            if row + 1 == self.rows.len() {
                self.rows.push(VecDeque::new());
            }
            self.rows[row + 1].push_front(merged);
            row += 1;
        }
    }

    fn delete_oldest(&mut self) {
        let Some(last_row) = self.rows.len().checked_sub(1) else {
            return;
        };
        let Some(bucket) = self.rows[last_row].pop_back() else {
            return;
        };
        let n1 = Self::bucket_size(last_row) as f64;
        self.width -= Self::bucket_size(last_row);
        self.total -= bucket.total;
        if self.width > 0 {
            let remaining = self.width as f64;
            let gap = bucket.total / n1 - self.total / remaining;
            self.variance -= bucket.variance + n1 * remaining * gap * gap / (n1 + remaining);
            self.variance = self.variance.max(0.0);
        } else {
            self.total = 0.0;
            self.variance = 0.0;
        }
        if self.rows[last_row].is_empty() && last_row > 0 {
            self.rows.pop();
        }
    }

    fn cut_detected(&self, n0: f64, n1: f64, u0: f64, u1: f64) -> bool {
        let n = self.width as f64;
        let dd = (2.0 * n.ln() / self.config.delta).ln();
        let v = self.variance / n;
        let min_sub = ADWIN_MIN_SUBWINDOW as f64;
        let m = 1.0 / (n0 - min_sub + 1.0) + 1.0 / (n1 - min_sub + 1.0);
        let epsilon = (2.0 * m * v * dd).sqrt() + 2.0 / 3.0 * dd * m;
        (u0 / n0 - u1 / n1).abs() > epsilon
    }

    /// Bucket sizes and totals from oldest to newest.
    fn buckets_oldest_first(&self) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        for (row_idx, row) in self.rows.iter().enumerate().rev() {
            for bucket in row.iter().rev() {
                out.push((Self::bucket_size(row_idx), bucket.total));
            }
        }
        out
    }

    fn shrink_on_change(&mut self) -> bool {
        let mut changed = false;
        loop {
            let buckets = self.buckets_oldest_first();
            let mut n0 = 0usize;
            let mut n1 = self.width;
            let mut u0 = 0.0;
            let mut u1 = self.total;
            let mut cut = false;
            for &(size, total) in buckets.iter().take(buckets.len().saturating_sub(1)) {
                n0 += size;
                n1 -= size;
                u0 += total;
                u1 -= total;
                if n0 >= ADWIN_MIN_SUBWINDOW
                    && n1 >= ADWIN_MIN_SUBWINDOW
                    && self.cut_detected(n0 as f64, n1 as f64, u0, u1)
                {
                    cut = true;
                    break;
                }
            }
            if !cut || self.width == 0 {
                return changed;
            }
            changed = true;
            self.delete_oldest();
        }
    }
}

impl ChangeDetector for Adwin {
    fn input(&mut self, value: f64) {
        self.change = false;
        if !value.is_finite() {
            return;
        }
        self.insert(value);
        self.ticks += 1;
        if self.ticks % ADWIN_CLOCK == 0 && self.width > ADWIN_MIN_WINDOW {
            self.change = self.shrink_on_change();
        }
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        self.rows = vec![VecDeque::new()];
        self.width = 0;
        self.total = 0.0;
        self.variance = 0.0;
        self.ticks = 0;
        self.change = false;
    }

    fn copy(&self) -> Box<dyn ChangeDetector> {
        Box::new(self.clone())
    }
}

/// DDM (drift detection method) configuration.
///
/// The detector signals when `p + s > p_min + out_control_level * s_min`;
/// use a lower level for a warning detector.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DdmConfig {
    pub min_instances: usize,
    pub out_control_level: f64,
}

impl Default for DdmConfig {
    fn default() -> Self {
        Self {
            min_instances: 30,
            out_control_level: 3.0,
        }
    }
}

impl DdmConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if self.min_instances == 0 {
            return Err(RcdError::invalid_input(
                "DDM min_instances must be >= 1; got 0",
            ));
        }
        if !self.out_control_level.is_finite() || self.out_control_level <= 0.0 {
            return Err(RcdError::invalid_input(format!(
                "DDM out_control_level must be finite and > 0; got {}",
                self.out_control_level
            )));
        }
        Ok(())
    }
}

/// Drift detection method over a Bernoulli error stream.
#[derive(Clone, Debug)]
pub struct Ddm {
    config: DdmConfig,
    n: usize,
    p: f64,
    s: f64,
    p_min: f64,
    s_min: f64,
    ps_min: f64,
    change: bool,
}

impl Ddm {
    pub fn new(config: DdmConfig) -> Result<Self, RcdError> {
        config.validate()?;
        Ok(Self {
            config,
            n: 1,
            p: 1.0,
            s: 0.0,
            p_min: f64::MAX,
            s_min: f64::MAX,
            ps_min: f64::MAX,
            change: false,
        })
    }

    pub fn error_rate(&self) -> f64 {
        self.p
    }

    fn clear(&mut self) {
        self.n = 1;
        self.p = 1.0;
        self.s = 0.0;
        self.p_min = f64::MAX;
        self.s_min = f64::MAX;
        self.ps_min = f64::MAX;
    }
}

impl ChangeDetector for Ddm {
    fn input(&mut self, value: f64) {
        if self.change {
            self.clear();
        }
        self.change = false;
        if !value.is_finite() {
            return;
        }

        let n = self.n as f64;
        self.p += (value - self.p) / n;
        self.s = (self.p * (1.0 - self.p) / n).max(0.0).sqrt();
        self.n += 1;

        if self.n < self.config.min_instances {
            return;
        }
        if self.p + self.s <= self.ps_min {
            self.p_min = self.p;
            self.s_min = self.s;
            self.ps_min = self.p + self.s;
        }
        self.change = self.p + self.s > self.p_min + self.config.out_control_level * self.s_min;
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        self.clear();
        self.change = false;
    }

    fn copy(&self) -> Box<dyn ChangeDetector> {
        Box::new(self.clone())
    }
}

/// Page-Hinkley detector configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageHinkleyConfig {
    pub delta: f64,
    pub threshold: f64,
    pub min_instances: usize,
}

impl Default for PageHinkleyConfig {
    fn default() -> Self {
        Self {
            delta: 0.005,
            threshold: 50.0,
            min_instances: 30,
        }
    }
}

impl PageHinkleyConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if !self.delta.is_finite() || self.delta < 0.0 {
            return Err(RcdError::invalid_input(format!(
                "Page-Hinkley delta must be finite and >= 0; got {}",
                self.delta
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(RcdError::invalid_input(format!(
                "Page-Hinkley threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Page-Hinkley test for upward shifts in the mean of the error signal.
#[derive(Clone, Debug)]
pub struct PageHinkley {
    config: PageHinkleyConfig,
    n: usize,
    running_mean: f64,
    cumulative_sum: f64,
    cumulative_min: f64,
    change: bool,
}

impl PageHinkley {
    pub fn new(config: PageHinkleyConfig) -> Result<Self, RcdError> {
        config.validate()?;
        Ok(Self {
            config,
            n: 0,
            running_mean: 0.0,
            cumulative_sum: 0.0,
            cumulative_min: 0.0,
            change: false,
        })
    }

    pub fn score(&self) -> f64 {
        (self.cumulative_sum - self.cumulative_min).max(0.0)
    }

    fn clear(&mut self) {
        self.n = 0;
        self.running_mean = 0.0;
        self.cumulative_sum = 0.0;
        self.cumulative_min = 0.0;
    }
}

impl ChangeDetector for PageHinkley {
    fn input(&mut self, value: f64) {
        if self.change {
            self.clear();
        }
        self.change = false;
        if !value.is_finite() {
            return;
        }

        self.n += 1;
        self.running_mean += (value - self.running_mean) / self.n as f64;
        self.cumulative_sum += value - self.running_mean - self.config.delta;
        self.cumulative_min = self.cumulative_min.min(self.cumulative_sum);

        if self.n >= self.config.min_instances {
            self.change = self.score() > self.config.threshold;
        }
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        self.clear();
        self.change = false;
    }

    fn copy(&self) -> Box<dyn ChangeDetector> {
        Box::new(self.clone())
    }
}
