// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod detectors;
pub mod majority;
pub mod naive_bayes;
pub mod specs;
pub mod topology;

pub use detectors::{Adwin, AdwinConfig, Ddm, DdmConfig, PageHinkley, PageHinkleyConfig};
pub use majority::MajorityClass;
pub use naive_bayes::GaussianNaiveBayes;
pub use specs::{ChangeDetectorSpec, ClassifierSpec, TopologySpec};
pub use topology::{PrototypeTopology, PrototypeTopologyConfig};

/// Built-in collaborator namespace.
pub fn crate_name() -> &'static str {
    let _ = rcd_core::crate_name();
    "rcd-learners"
}
