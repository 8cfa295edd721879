// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::RcdError;

/// Strategy used by dynamic window evaluators to grow or shrink a window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Grow while the windowed error stays below the prior error.
    #[default]
    ErrorDelta,
    /// Grow while the windowed error exceeds the prior error by at most the decision threshold.
    ThresholdedErrorDelta,
    /// Compare the current, larger and smaller windows and move toward the most accurate.
    ThreeWayCandidate,
}

/// Window sizing configuration for dynamic window evaluators.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct WindowConfig {
    pub default_size: usize,
    pub increment: usize,
    pub min_size: usize,
    pub resize_policy: ResizePolicy,
    pub decision_threshold: f64,
    pub resize_enabled: bool,
    pub remember_size_on_retrieval: bool,
    pub apply_to_historical_models: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_size: 10,
            increment: 1,
            min_size: 5,
            resize_policy: ResizePolicy::ErrorDelta,
            decision_threshold: 0.65,
            resize_enabled: true,
            remember_size_on_retrieval: true,
            apply_to_historical_models: true,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if self.min_size == 0 {
            return Err(RcdError::invalid_input(
                "window.min_size must be >= 1; got 0",
            ));
        }
        if self.min_size > self.default_size {
            return Err(RcdError::invalid_input(format!(
                "window.min_size={} cannot exceed window.default_size={}",
                self.min_size, self.default_size
            )));
        }
        if self.increment == 0 {
            return Err(RcdError::invalid_input(
                "window.increment must be >= 1; got 0",
            ));
        }
        if !self.decision_threshold.is_finite() {
            return Err(RcdError::invalid_input(format!(
                "window.decision_threshold must be finite; got {}",
                self.decision_threshold
            )));
        }
        Ok(())
    }

    /// Copy of this configuration used for evaluators attached to archived concepts.
    pub fn for_historical_models(&self) -> Self {
        Self {
            resize_enabled: self.resize_enabled && self.apply_to_historical_models,
            ..self.clone()
        }
    }
}
