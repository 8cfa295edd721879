// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::selection::DriftDecisionMechanism;
use rcd_core::{RcdError, WindowConfig};
use rcd_learners::{ChangeDetectorSpec, ClassifierSpec, TopologySpec};

/// Concept history grouping configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryConfig {
    /// A group matches only when its mean nearest-prototype distance is below this.
    pub max_distance_threshold: f64,
    /// Prototypes averaged per point when measuring group distance.
    pub neighbors: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_distance_threshold: 2.0,
            neighbors: 1,
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if !self.max_distance_threshold.is_finite() || self.max_distance_threshold <= 0.0 {
            return Err(RcdError::invalid_input(format!(
                "history.max_distance_threshold must be finite and > 0; got {}",
                self.max_distance_threshold
            )));
        }
        if self.neighbors == 0 {
            return Err(RcdError::invalid_input(
                "history.neighbors must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Recurring concept ensemble configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleConfig {
    pub ensemble_size: usize,
    /// Poisson rate for online bagging weights.
    pub lambda: f64,
    pub seed: u64,
    /// 0 or 1 runs positions sequentially; more uses a worker pool.
    pub workers: usize,
    pub weighted_vote: bool,
    pub disable_drift_detection: bool,
    pub disable_background_learner: bool,
    pub disable_recurring_drifts: bool,
    pub drift_decision: DriftDecisionMechanism,
    /// Buffered instances allowed in one warning window before it is reset.
    pub warning_window_cap: usize,
    pub log_train_examples: bool,
    pub window: WindowConfig,
    pub history: HistoryConfig,
    pub classifier: ClassifierSpec,
    pub warning_detector: ChangeDetectorSpec,
    pub drift_detector: ChangeDetectorSpec,
    pub topology: TopologySpec,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            ensemble_size: 10,
            lambda: 6.0,
            seed: 1,
            workers: 1,
            weighted_vote: true,
            disable_drift_detection: false,
            disable_background_learner: false,
            disable_recurring_drifts: false,
            drift_decision: DriftDecisionMechanism::WithFalseAlarms,
            warning_window_cap: 1_000,
            log_train_examples: false,
            window: WindowConfig::default(),
            history: HistoryConfig::default(),
            classifier: ClassifierSpec::default(),
            warning_detector: ChangeDetectorSpec::default_warning(),
            drift_detector: ChangeDetectorSpec::default_drift(),
            topology: TopologySpec::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<(), RcdError> {
        if self.ensemble_size == 0 {
            return Err(RcdError::invalid_input(
                "ensemble_size must be >= 1; got 0",
            ));
        }
        if !self.lambda.is_finite() || self.lambda <= 0.0 {
            return Err(RcdError::invalid_input(format!(
                "lambda must be finite and > 0; got {}",
                self.lambda
            )));
        }
        if self.warning_window_cap == 0 {
            return Err(RcdError::invalid_input(
                "warning_window_cap must be >= 1; got 0",
            ));
        }
        self.window.validate()?;
        self.history.validate()?;
        self.warning_detector.validate()?;
        self.drift_detector.validate()?;
        self.topology.validate()?;
        Ok(())
    }

    /// Worker threads actually used; 0 and 1 both mean sequential.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{EnsembleConfig, HistoryConfig};
    use rcd_core::WindowConfig;
    use rcd_learners::{AdwinConfig, ChangeDetectorSpec};

    #[test]
    fn default_config_is_valid() {
        let config = EnsembleConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.ensemble_size, 10);
        assert_eq!(config.lambda, 6.0);
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn validation_names_the_offending_field() {
        let cases = [
            (
                EnsembleConfig {
                    ensemble_size: 0,
                    ..EnsembleConfig::default()
                },
                "ensemble_size",
            ),
            (
                EnsembleConfig {
                    lambda: f64::NAN,
                    ..EnsembleConfig::default()
                },
                "lambda",
            ),
            (
                EnsembleConfig {
                    warning_window_cap: 0,
                    ..EnsembleConfig::default()
                },
                "warning_window_cap",
            ),
            (
                EnsembleConfig {
                    window: WindowConfig {
                        increment: 0,
                        ..WindowConfig::default()
                    },
                    ..EnsembleConfig::default()
                },
                "window.increment",
            ),
            (
                EnsembleConfig {
                    history: HistoryConfig {
                        neighbors: 0,
                        ..HistoryConfig::default()
                    },
                    ..EnsembleConfig::default()
                },
                "history.neighbors",
            ),
            (
                EnsembleConfig {
                    drift_detector: ChangeDetectorSpec::Adwin(AdwinConfig { delta: -1.0 }),
                    ..EnsembleConfig::default()
                },
                "ADWIN delta",
            ),
        ];
        for (config, needle) in cases {
            let err = config.validate().expect_err("invalid config must fail");
            assert!(
                err.to_string().contains(needle),
                "expected {needle:?} in {err}"
            );
        }
    }

    #[test]
    fn zero_workers_means_sequential() {
        let config = EnsembleConfig {
            workers: 0,
            ..EnsembleConfig::default()
        };
        assert_eq!(config.effective_workers(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let config: EnsembleConfig = serde_json::from_str(
            r#"{
                "ensemble_size": 3,
                "drift_decision": "background_vs_history",
                "window": {"default_size": 25},
                "warning_detector": {"kind": "ddm", "min_instances": 30, "out_control_level": 2.0}
            }"#,
        )
        .expect("partial config should deserialize");
        assert_eq!(config.ensemble_size, 3);
        assert_eq!(config.window.default_size, 25);
        assert_eq!(config.window.min_size, WindowConfig::default().min_size);
        assert_eq!(config.lambda, 6.0);
        config.validate().expect("deserialized config should validate");
    }
}
