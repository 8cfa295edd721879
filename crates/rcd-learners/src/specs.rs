// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::detectors::{Adwin, AdwinConfig, Ddm, DdmConfig, PageHinkley, PageHinkleyConfig};
use crate::majority::MajorityClass;
use crate::naive_bayes::GaussianNaiveBayes;
use crate::topology::{PrototypeTopology, PrototypeTopologyConfig};
use rcd_core::{ChangeDetector, Classifier, RcdError, TopologyLearner};

/// Base classifier selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassifierSpec {
    #[default]
    NaiveBayes,
    MajorityClass,
}

impl ClassifierSpec {
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            Self::NaiveBayes => Box::new(GaussianNaiveBayes::new()),
            Self::MajorityClass => Box::new(MajorityClass::new()),
        }
    }
}

/// Change detector selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChangeDetectorSpec {
    Adwin(AdwinConfig),
    Ddm(DdmConfig),
    PageHinkley(PageHinkleyConfig),
}

impl ChangeDetectorSpec {
    /// More sensitive default used to open warning windows.
    pub fn default_warning() -> Self {
        Self::Adwin(AdwinConfig { delta: 0.01 })
    }

    pub fn default_drift() -> Self {
        Self::Adwin(AdwinConfig { delta: 0.001 })
    }

    pub fn validate(&self) -> Result<(), RcdError> {
        match self {
            Self::Adwin(config) => config.validate(),
            Self::Ddm(config) => config.validate(),
            Self::PageHinkley(config) => config.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn ChangeDetector>, RcdError> {
        Ok(match self {
            Self::Adwin(config) => Box::new(Adwin::new(*config)?),
            Self::Ddm(config) => Box::new(Ddm::new(*config)?),
            Self::PageHinkley(config) => Box::new(PageHinkley::new(*config)?),
        })
    }
}

/// Topology learner selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TopologySpec {
    Prototype(PrototypeTopologyConfig),
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::Prototype(PrototypeTopologyConfig::default())
    }
}

impl TopologySpec {
    pub fn validate(&self) -> Result<(), RcdError> {
        match self {
            Self::Prototype(config) => config.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn TopologyLearner>, RcdError> {
        match self {
            Self::Prototype(config) => Ok(Box::new(PrototypeTopology::new(*config)?)),
        }
    }
}
