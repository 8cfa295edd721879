// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use rcd_core::{ChangeDetector, Classifier, Instance, TopologyLearner};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Step counter shared by every scripted collaborator of one test.
#[derive(Clone, Debug, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, step: u64) {
        self.0.store(step, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Classifier that answers correctly except at scripted steps.
///
/// `reset_learning` swaps in `after_reset` once, so a background candidate
/// spawned from this classifier follows its own script.
#[derive(Clone, Debug)]
pub struct ScriptedClassifier {
    id: String,
    clock: TestClock,
    wrong_steps: Arc<BTreeSet<u64>>,
    after_reset: Option<(String, Arc<BTreeSet<u64>>)>,
}

impl ScriptedClassifier {
    pub fn new(id: impl Into<String>, clock: &TestClock, wrong_steps: BTreeSet<u64>) -> Self {
        Self {
            id: id.into(),
            clock: clock.clone(),
            wrong_steps: Arc::new(wrong_steps),
            after_reset: None,
        }
    }

    pub fn with_reset_script(mut self, id: impl Into<String>, wrong_steps: BTreeSet<u64>) -> Self {
        self.after_reset = Some((id.into(), Arc::new(wrong_steps)));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Classifier for ScriptedClassifier {
    fn train(&mut self, _instance: &Instance, _weight: f64) {}

    fn votes(&self, instance: &Instance) -> Vec<f64> {
        let Some(label) = instance.label else {
            return Vec::new();
        };
        let predicted = if self.wrong_steps.contains(&self.clock.now()) {
            label + 1
        } else {
            label
        };
        let mut votes = vec![0.0; label + 2];
        votes[predicted] = 1.0;
        votes
    }

    fn reset_learning(&mut self) {
        if let Some((id, wrong_steps)) = self.after_reset.take() {
            self.id = id;
            self.wrong_steps = wrong_steps;
        }
    }

    fn copy(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

/// Detector that reports a change right after its n-th input for each
/// scripted n. `reset` clears the flag but keeps counting.
#[derive(Clone, Debug)]
pub struct ManualDetector {
    fire_at: Arc<BTreeSet<u64>>,
    inputs: u64,
    change: bool,
}

impl ManualDetector {
    pub fn firing_at(fire_at: impl IntoIterator<Item = u64>) -> Self {
        Self {
            fire_at: Arc::new(fire_at.into_iter().collect()),
            inputs: 0,
            change: false,
        }
    }

    pub fn never() -> Self {
        Self::firing_at([])
    }

    pub fn inputs(&self) -> u64 {
        self.inputs
    }
}

impl ChangeDetector for ManualDetector {
    fn input(&mut self, _value: f64) {
        self.inputs += 1;
        self.change = self.fire_at.contains(&self.inputs);
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        self.change = false;
    }

    fn copy(&self) -> Box<dyn ChangeDetector> {
        Box::new(self.clone())
    }
}

/// Topology whose prototypes never move.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedTopology {
    prototypes: Vec<Vec<f64>>,
}

impl FixedTopology {
    pub fn new(prototypes: Vec<Vec<f64>>) -> Self {
        Self { prototypes }
    }

    pub fn at(point: &[f64]) -> Self {
        Self::new(vec![point.to_vec()])
    }
}

impl TopologyLearner for FixedTopology {
    fn train(&mut self, _instance: &Instance) {}

    fn prototypes(&self) -> Vec<Vec<f64>> {
        self.prototypes.clone()
    }

    fn prototypes_created(&self) -> usize {
        self.prototypes.len()
    }

    fn reset(&mut self) {}

    fn copy(&self) -> Box<dyn TopologyLearner> {
        Box::new(self.clone())
    }
}

/// `count` steps starting at `from`, `stride` apart.
pub fn spread_steps(from: u64, count: usize, stride: u64) -> BTreeSet<u64> {
    (0..count as u64).map(|i| from + i * stride).collect()
}
