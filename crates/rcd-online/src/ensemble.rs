// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::EnsembleConfig;
use crate::history::ConceptHistory;
use crate::slot::{BaseLearnerSlot, LearnerParts, SlotContext, SlotOptions};
use rayon::prelude::*;
use rcd_core::{
    EnsembleDiagnostics, EventSink, Instance, NoopEventSink, RcdError, SlotCounters, argmax,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Why an instance was not used for training.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingLabel,
    NonFiniteFeatures,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainOutcome {
    Trained,
    Skipped(SkipReason),
}

/// Online bagging ensemble that detects drift per position and reuses
/// archived concepts when a past regime comes back.
pub struct RecurringConceptEnsemble {
    config: EnsembleConfig,
    options: SlotOptions,
    members: Vec<BaseLearnerSlot>,
    history: Arc<ConceptHistory>,
    sink: Arc<dyn EventSink>,
    pool: Option<rayon::ThreadPool>,
    instances_seen: u64,
    instances_skipped: u64,
}

impl fmt::Debug for RecurringConceptEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurringConceptEnsemble")
            .field("config", &self.config)
            .field("members", &self.members.len())
            .field("instances_seen", &self.instances_seen)
            .field("instances_skipped", &self.instances_skipped)
            .finish_non_exhaustive()
    }
}

impl RecurringConceptEnsemble {
    /// Builds every member from the learner specs in `config`.
    pub fn new(config: EnsembleConfig) -> Result<Self, RcdError> {
        config.validate()?;
        let parts = LearnerParts::from_config(&config)?;
        Self::from_parts(config, parts)
    }

    /// Builds every member from copies of `parts`; the specs in `config` are ignored.
    pub fn from_parts(config: EnsembleConfig, parts: LearnerParts) -> Result<Self, RcdError> {
        config.validate()?;
        let options = SlotOptions::from_config(&config);
        let history = Arc::new(ConceptHistory::new(config.history.clone(), &config.window)?);

        let mut members = Vec::with_capacity(config.ensemble_size);
        for position in 0..config.ensemble_size {
            members.push(BaseLearnerSlot::new(
                position,
                parts.copy(),
                &options,
                config.seed.wrapping_add(position as u64),
            )?);
        }

        let workers = config.effective_workers();
        let pool = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|index| format!("rcd-worker-{index}"))
                .build()
                .map_err(|err| {
                    RcdError::resource_limit(format!(
                        "failed to build a worker pool with {workers} threads: {err}"
                    ))
                })?;
            Some(pool)
        } else {
            None
        };

        debug!(
            ensemble_size = config.ensemble_size,
            workers,
            recurring = !config.disable_recurring_drifts,
            "ensemble initialized"
        );

        Ok(Self {
            config,
            options,
            members,
            history,
            sink: Arc::new(NoopEventSink),
            pool,
            instances_seen: 0,
            instances_skipped: 0,
        })
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the concept history this ensemble archives into and recalls
    /// from, e.g. to warm-start from concepts archived by an earlier run.
    ///
    /// Only valid before the first trained instance, and only with a history
    /// that has no open warnings, since no member has one yet.
    pub fn with_history(mut self, history: Arc<ConceptHistory>) -> Result<Self, RcdError> {
        if self.instances_seen > 0 {
            return Err(RcdError::invalid_state(format!(
                "concept history can only be replaced before training; {} instances already seen",
                self.instances_seen
            )));
        }
        let open = history.open_warning_count();
        if open > 0 {
            return Err(RcdError::invalid_state(format!(
                "injected concept history has {open} open warnings; expected none"
            )));
        }
        self.history = history;
        Ok(self)
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn members(&self) -> &[BaseLearnerSlot] {
        &self.members
    }

    pub fn history(&self) -> &Arc<ConceptHistory> {
        &self.history
    }

    pub fn instances_seen(&self) -> u64 {
        self.instances_seen
    }

    /// Runs one prequential step on every member.
    ///
    /// Unlabelled instances and instances with non-finite features are
    /// counted and skipped without touching any model.
    pub fn train_on_instance(&mut self, instance: &Instance) -> Result<TrainOutcome, RcdError> {
        let reason = if instance.label.is_none() {
            Some(SkipReason::MissingLabel)
        } else if !instance.has_finite_features() {
            Some(SkipReason::NonFiniteFeatures)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.instances_skipped += 1;
            trace!(?reason, "instance skipped");
            return Ok(TrainOutcome::Skipped(reason));
        }

        self.instances_seen += 1;
        if !self.options.disable_recurring_drifts {
            self.history.update_evaluators(instance);
        }

        let ctx = SlotContext {
            history: &self.history,
            sink: self.sink.as_ref(),
            instances_seen: self.instances_seen,
            options: &self.options,
        };
        let members = &mut self.members;
        match &self.pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .try_for_each(|member| member.process(instance, &ctx).map(drop))
            }),
            None => members
                .iter_mut()
                .try_for_each(|member| member.process(instance, &ctx).map(drop)),
        }?;
        Ok(TrainOutcome::Trained)
    }

    /// Combined class votes of all members, normalised to sum to one.
    ///
    /// With weighted voting each member counts by its cumulative accuracy;
    /// when no member has any accuracy yet every member counts equally.
    pub fn votes(&self, instance: &Instance) -> Vec<f64> {
        let member_votes: Vec<(f64, Vec<f64>)> = self
            .members
            .iter()
            .map(|member| (member.model().evaluator().accuracy(), member.votes(instance)))
            .collect();
        let use_weights = self.config.weighted_vote
            && member_votes.iter().any(|(accuracy, _)| *accuracy > 0.0);

        let mut combined: Vec<f64> = Vec::new();
        for (accuracy, votes) in &member_votes {
            let total: f64 = votes.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                continue;
            }
            let weight = if use_weights { *accuracy } else { 1.0 };
            if combined.len() < votes.len() {
                combined.resize(votes.len(), 0.0);
            }
            for (slot, vote) in combined.iter_mut().zip(votes) {
                *slot += weight * vote / total;
            }
        }

        let total: f64 = combined.iter().sum();
        if total > 0.0 {
            combined.iter_mut().for_each(|vote| *vote /= total);
        }
        combined
    }

    /// Index of the highest combined vote, or `None` before any training.
    pub fn predict(&self, instance: &Instance) -> Option<usize> {
        let votes = self.votes(instance);
        if votes.iter().all(|vote| *vote <= 0.0) {
            return None;
        }
        argmax(&votes)
    }

    pub fn diagnostics(&self) -> EnsembleDiagnostics {
        let mut counters = SlotCounters::default();
        for member in &self.members {
            counters.merge(member.counters());
        }
        EnsembleDiagnostics {
            ensemble_size: self.members.len(),
            worker_count: self.config.effective_workers(),
            instances_seen: self.instances_seen,
            instances_skipped: self.instances_skipped,
            counters,
            history_concepts: self.history.concept_count(),
            history_groups: self.history.group_count(),
            ..EnsembleDiagnostics::default()
        }
    }
}
