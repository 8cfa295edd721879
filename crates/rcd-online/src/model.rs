// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::dynamic_window::{DynamicWindowEvaluator, WindowedEvaluator};
use crate::evaluator::BasicEvaluator;
use rcd_core::{Classifier, Instance, PerformanceEvaluator, RcdError, WindowConfig};

/// Role a model currently plays for its ensemble position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRole {
    Active,
    Background,
    Archived,
}

/// A classifier together with its evaluators and bookkeeping.
///
/// Ownership moves between roles: a background model is promoted by value,
/// an archived model is extracted from the history by value.
#[derive(Debug)]
pub struct LearnerModel {
    classifier: Box<dyn Classifier>,
    evaluator: BasicEvaluator,
    internal_evaluator: Option<DynamicWindowEvaluator>,
    window_default_size: usize,
    created_on: u64,
    role: ModelRole,
}

impl LearnerModel {
    pub fn new(
        classifier: Box<dyn Classifier>,
        window_default_size: usize,
        created_on: u64,
        role: ModelRole,
    ) -> Self {
        Self {
            classifier,
            evaluator: BasicEvaluator::new(),
            internal_evaluator: None,
            window_default_size,
            created_on,
            role,
        }
    }

    /// Fresh background candidate: same classifier kind, learning reset.
    pub fn spawn_background(&self, window_default_size: usize, created_on: u64) -> Self {
        let mut classifier = self.classifier.copy();
        classifier.reset_learning();
        Self::new(
            classifier,
            window_default_size,
            created_on,
            ModelRole::Background,
        )
    }

    /// Independent frozen copy for the concept history.
    pub fn snapshot(&self) -> Self {
        Self {
            classifier: self.classifier.copy(),
            evaluator: self.evaluator.clone(),
            internal_evaluator: None,
            window_default_size: self.window_default_size,
            created_on: self.created_on,
            role: ModelRole::Archived,
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn evaluator(&self) -> &BasicEvaluator {
        &self.evaluator
    }

    pub fn internal_evaluator(&self) -> Option<&DynamicWindowEvaluator> {
        self.internal_evaluator.as_ref()
    }

    pub(crate) fn internal_evaluator_mut(&mut self) -> Option<&mut DynamicWindowEvaluator> {
        self.internal_evaluator.as_mut()
    }

    pub fn window_default_size(&self) -> usize {
        self.window_default_size
    }

    pub fn created_on(&self) -> u64 {
        self.created_on
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub(crate) fn set_role(&mut self, role: ModelRole) {
        self.role = role;
    }

    pub(crate) fn set_window_default_size(&mut self, size: usize) {
        self.window_default_size = size;
    }

    pub fn cumulative_error(&self) -> f64 {
        self.evaluator.fraction_incorrectly_classified()
    }

    /// Allocates an internal window evaluator tracking `position`.
    pub(crate) fn attach_internal_evaluator(
        &mut self,
        config: &WindowConfig,
        position: usize,
        prior_error: f64,
    ) -> Result<(), RcdError> {
        let mut evaluator = DynamicWindowEvaluator::new(config.clone())?;
        evaluator.add_model(position, prior_error, self.window_default_size);
        self.internal_evaluator = Some(evaluator);
        Ok(())
    }

    pub(crate) fn detach_internal_evaluator(&mut self) -> Option<DynamicWindowEvaluator> {
        self.internal_evaluator.take()
    }

    /// Windowed error at `position`; fails when no internal evaluator tracks it.
    pub fn windowed_error(&self, position: usize) -> Result<f64, RcdError> {
        self.internal_evaluator
            .as_ref()
            .ok_or_else(|| {
                RcdError::invalid_state(format!(
                    "{:?} model at position {position} has no internal window evaluator",
                    self.role
                ))
            })?
            .fraction_incorrect(position)
    }

    /// Prequential step: evaluate on `instance`, then report whether it was correct.
    pub(crate) fn evaluate(&mut self, instance: &Instance) -> bool {
        let votes = self.classifier.votes(instance);
        self.evaluator.add_result(instance, &votes);
        let correct = instance.label.is_some() && rcd_core::argmax(&votes) == instance.label;
        if let Some(internal) = self.internal_evaluator.as_mut() {
            internal.add_correctness(correct);
        }
        correct
    }

    /// Feeds only the internal window evaluator; used for archived concepts.
    pub(crate) fn record_windowed(&mut self, instance: &Instance) -> Option<bool> {
        let internal = self.internal_evaluator.as_mut()?;
        let correct = self.classifier.correctly_classifies(instance);
        internal.add_correctness(correct);
        Some(correct)
    }

    pub(crate) fn train(&mut self, instance: &Instance, weight: f64) {
        debug_assert!(
            self.role != ModelRole::Archived,
            "archived models never train"
        );
        if self.role != ModelRole::Archived {
            self.classifier.train(instance, weight);
        }
    }

    /// Forgets everything learned and restarts bookkeeping at `created_on`.
    pub(crate) fn reset(&mut self, window_default_size: usize, created_on: u64) {
        self.classifier.reset_learning();
        self.evaluator.reset();
        self.internal_evaluator = None;
        self.window_default_size = window_default_size;
        self.created_on = created_on;
    }
}
