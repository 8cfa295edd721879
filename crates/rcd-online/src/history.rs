// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::HistoryConfig;
use crate::dynamic_window::WindowedEvaluator;
use crate::model::{LearnerModel, ModelRole};
use parking_lot::Mutex;
use rcd_core::{Classifier, Instance, RcdError, TopologyLearner, WindowConfig, euclidean_distance};
use std::collections::{BTreeMap, BTreeSet};

/// Pre-warning copy of an active model waiting to be archived.
#[derive(Debug)]
pub struct ConceptSnapshot {
    pub ensemble_index: usize,
    pub error_before_warning: f64,
    pub model: LearnerModel,
    /// Topology of the phase the model learned; used to pick its group.
    pub topology: Box<dyn TopologyLearner>,
}

impl ConceptSnapshot {
    pub fn new(
        ensemble_index: usize,
        error_before_warning: f64,
        model: &LearnerModel,
        topology: &dyn TopologyLearner,
    ) -> Self {
        Self {
            ensemble_index,
            error_before_warning,
            model: model.snapshot(),
            topology: topology.copy(),
        }
    }
}

/// An archived, never-training model.
#[derive(Debug)]
pub struct Concept {
    history_index: usize,
    group_id: usize,
    ensemble_index: usize,
    instances_seen_at_archival: u64,
    error_before_warning: f64,
    model: LearnerModel,
}

impl Concept {
    pub fn history_index(&self) -> usize {
        self.history_index
    }

    pub fn group_id(&self) -> usize {
        self.group_id
    }

    pub fn ensemble_index(&self) -> usize {
        self.ensemble_index
    }

    pub fn created_on(&self) -> u64 {
        self.model.created_on()
    }

    pub fn instances_seen_at_archival(&self) -> u64 {
        self.instances_seen_at_archival
    }

    pub fn error_before_warning(&self) -> f64 {
        self.error_before_warning
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.model.classifier()
    }

    pub fn model(&self) -> &LearnerModel {
        &self.model
    }

    pub fn has_evaluator(&self) -> bool {
        self.model.internal_evaluator().is_some()
    }

    pub fn into_model(self) -> LearnerModel {
        self.model
    }
}

/// Concepts sharing one topology summary.
#[derive(Debug)]
pub struct Group {
    id: usize,
    topology: Box<dyn TopologyLearner>,
    concepts: BTreeMap<usize, Concept>,
}

impl Group {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn topology(&self) -> &dyn TopologyLearner {
        self.topology.as_ref()
    }

    pub fn concept_indices(&self) -> Vec<usize> {
        self.concepts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

/// Unsynchronised history state. [`ConceptHistory`] wraps it in a lock;
/// [`ConceptHistory::with_state`] runs several operations atomically.
#[derive(Debug)]
pub struct HistoryState {
    config: HistoryConfig,
    window: WindowConfig,
    groups: BTreeMap<usize, Group>,
    open_warnings: BTreeSet<usize>,
    next_group_id: usize,
    next_history_index: usize,
}

impl HistoryState {
    fn new(config: HistoryConfig, window: WindowConfig) -> Self {
        Self {
            config,
            window,
            groups: BTreeMap::new(),
            open_warnings: BTreeSet::new(),
            next_group_id: 0,
            next_history_index: 0,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Mean over `points` of the mean distance to the `k` nearest prototypes.
    pub fn group_distance(&self, group_id: usize, points: &[Vec<f64>]) -> Option<f64> {
        let group = self.groups.get(&group_id)?;
        mean_nearest_distance(&group.topology.prototypes(), points, self.config.neighbors)
    }

    /// Closest group strictly within `max_distance_threshold`, if any.
    pub fn find_nearest_group(&self, points: &[Vec<f64>]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &group_id in self.groups.keys() {
            let Some(distance) = self.group_distance(group_id, points) else {
                continue;
            };
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((group_id, distance)),
            }
        }
        best.filter(|(_, distance)| *distance < self.config.max_distance_threshold)
            .map(|(group_id, _)| group_id)
    }

    pub fn create_group(&mut self, topology: Box<dyn TopologyLearner>) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        self.groups.insert(
            id,
            Group {
                id,
                topology,
                concepts: BTreeMap::new(),
            },
        );
        id
    }

    /// Stores `snapshot` under `group_id` with the next history index.
    ///
    /// Positions whose warning is already open are not registered on the new concept.
    pub fn archive_concept(
        &mut self,
        group_id: usize,
        snapshot: ConceptSnapshot,
        instances_seen: u64,
    ) -> Result<usize, RcdError> {
        let group = self.groups.get_mut(&group_id).ok_or_else(|| {
            RcdError::invalid_state(format!("concept history has no group {group_id}"))
        })?;
        let history_index = self.next_history_index;
        self.next_history_index += 1;

        let mut model = snapshot.model;
        model.set_role(ModelRole::Archived);
        model.detach_internal_evaluator();
        group.concepts.insert(
            history_index,
            Concept {
                history_index,
                group_id,
                ensemble_index: snapshot.ensemble_index,
                instances_seen_at_archival: instances_seen,
                error_before_warning: snapshot.error_before_warning,
                model,
            },
        );
        Ok(history_index)
    }

    /// Archives into the group nearest to the snapshot's topology, creating
    /// a group from that topology when none is close enough.
    pub fn archive(
        &mut self,
        snapshot: ConceptSnapshot,
        instances_seen: u64,
    ) -> Result<(usize, usize), RcdError> {
        let prototypes = snapshot.topology.prototypes();
        let group_id = match self.find_nearest_group(&prototypes) {
            Some(group_id) => group_id,
            None => self.create_group(snapshot.topology.copy()),
        };
        let history_index = self.archive_concept(group_id, snapshot, instances_seen)?;
        Ok((group_id, history_index))
    }

    /// Removes and returns a concept; the caller takes ownership of its model.
    pub fn extract_concept(
        &mut self,
        group_id: usize,
        history_index: usize,
    ) -> Result<Concept, RcdError> {
        self.groups
            .get_mut(&group_id)
            .and_then(|group| group.concepts.remove(&history_index))
            .ok_or_else(|| {
                RcdError::invalid_state(format!(
                    "concept history has no concept {history_index} in group {group_id}"
                ))
            })
    }

    /// Registers `position` on every archived concept's window evaluator,
    /// allocating evaluators where none exist yet.
    pub fn on_warning_opened(&mut self, position: usize, prior_error: f64) -> Result<(), RcdError> {
        self.open_warnings.insert(position);
        for concept in self.groups.values_mut().flat_map(|g| g.concepts.values_mut()) {
            let size = concept.model.window_default_size();
            match concept.model.internal_evaluator_mut() {
                Some(evaluator) => evaluator.add_model(position, prior_error, size),
                None => concept
                    .model
                    .attach_internal_evaluator(&self.window, position, prior_error)?,
            }
        }
        Ok(())
    }

    /// Deregisters `position`; evaluators left with no tracked position are dropped.
    pub fn on_warning_closed(&mut self, position: usize) {
        self.open_warnings.remove(&position);
        for concept in self.groups.values_mut().flat_map(|g| g.concepts.values_mut()) {
            let now_idle = match concept.model.internal_evaluator_mut() {
                Some(evaluator) => {
                    evaluator.remove_model(position);
                    evaluator.tracked_count() == 0
                }
                None => false,
            };
            if now_idle {
                concept.model.detach_internal_evaluator();
            }
        }
    }

    /// Classifies `instance` with every concept that has an evaluator. Never trains.
    pub fn update_evaluators(&mut self, instance: &Instance) {
        if self.open_warnings.is_empty() || instance.label.is_none() {
            return;
        }
        for concept in self.groups.values_mut().flat_map(|g| g.concepts.values_mut()) {
            concept.model.record_windowed(instance);
        }
    }

    /// Windowed error at `position` for each concept in `group_id` tracking it.
    pub fn rank_applicable(&self, group_id: usize, position: usize) -> BTreeMap<usize, f64> {
        let Some(group) = self.groups.get(&group_id) else {
            return BTreeMap::new();
        };
        group
            .concepts
            .iter()
            .filter_map(|(&history_index, concept)| {
                let evaluator = concept.model.internal_evaluator()?;
                if !evaluator.contains_index(position) {
                    return None;
                }
                evaluator
                    .fraction_incorrect(position)
                    .ok()
                    .map(|error| (history_index, error))
            })
            .collect()
    }

    pub fn concept(&self, history_index: usize) -> Option<&Concept> {
        self.groups
            .values()
            .find_map(|group| group.concepts.get(&history_index))
    }

    pub fn group(&self, group_id: usize) -> Option<&Group> {
        self.groups.get(&group_id)
    }

    pub fn group_ids(&self) -> Vec<usize> {
        self.groups.keys().copied().collect()
    }

    pub fn concept_count(&self) -> usize {
        self.groups.values().map(Group::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn has_open_warning(&self, position: usize) -> bool {
        self.open_warnings.contains(&position)
    }

    pub fn open_warning_count(&self) -> usize {
        self.open_warnings.len()
    }
}

fn mean_nearest_distance(prototypes: &[Vec<f64>], points: &[Vec<f64>], k: usize) -> Option<f64> {
    if prototypes.is_empty() || points.is_empty() {
        return None;
    }
    let k = k.min(prototypes.len());
    let mut total = 0.0;
    let mut distances = Vec::with_capacity(prototypes.len());
    for point in points {
        distances.clear();
        distances.extend(prototypes.iter().map(|proto| euclidean_distance(proto, point)));
        distances.sort_by(f64::total_cmp);
        total += distances[..k].iter().sum::<f64>() / k as f64;
    }
    Some(total / points.len() as f64)
}

/// Registry of archived concepts shared by every ensemble position.
///
/// All mutation goes through one coarse lock; contention is limited to
/// positions with an open warning.
#[derive(Debug)]
pub struct ConceptHistory {
    state: Mutex<HistoryState>,
}

impl ConceptHistory {
    /// `window` is the ensemble window configuration; concepts use its
    /// historical-model variant.
    pub fn new(config: HistoryConfig, window: &WindowConfig) -> Result<Self, RcdError> {
        config.validate()?;
        window.validate()?;
        Ok(Self {
            state: Mutex::new(HistoryState::new(config, window.for_historical_models())),
        })
    }

    /// Runs `f` with the history locked for its whole duration.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut HistoryState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn find_nearest_group(&self, points: &[Vec<f64>]) -> Option<usize> {
        self.state.lock().find_nearest_group(points)
    }

    pub fn create_group(&self, topology: Box<dyn TopologyLearner>) -> usize {
        self.state.lock().create_group(topology)
    }

    pub fn archive_concept(
        &self,
        group_id: usize,
        snapshot: ConceptSnapshot,
        instances_seen: u64,
    ) -> Result<usize, RcdError> {
        self.state
            .lock()
            .archive_concept(group_id, snapshot, instances_seen)
    }

    pub fn archive(
        &self,
        snapshot: ConceptSnapshot,
        instances_seen: u64,
    ) -> Result<(usize, usize), RcdError> {
        self.state.lock().archive(snapshot, instances_seen)
    }

    pub fn extract_concept(&self, group_id: usize, history_index: usize) -> Result<Concept, RcdError> {
        self.state.lock().extract_concept(group_id, history_index)
    }

    pub fn on_warning_opened(&self, position: usize, prior_error: f64) -> Result<(), RcdError> {
        self.state.lock().on_warning_opened(position, prior_error)
    }

    pub fn on_warning_closed(&self, position: usize) {
        self.state.lock().on_warning_closed(position);
    }

    pub fn update_evaluators(&self, instance: &Instance) {
        self.state.lock().update_evaluators(instance);
    }

    pub fn rank_applicable(&self, group_id: usize, position: usize) -> BTreeMap<usize, f64> {
        self.state.lock().rank_applicable(group_id, position)
    }

    /// Calls `f` with the concept stored under `history_index`, if present.
    pub fn inspect_concept<R>(&self, history_index: usize, f: impl FnOnce(&Concept) -> R) -> Option<R> {
        self.state.lock().concept(history_index).map(f)
    }

    pub fn concept_indices(&self, group_id: usize) -> Vec<usize> {
        self.state
            .lock()
            .group(group_id)
            .map(Group::concept_indices)
            .unwrap_or_default()
    }

    pub fn group_ids(&self) -> Vec<usize> {
        self.state.lock().group_ids()
    }

    pub fn concept_count(&self) -> usize {
        self.state.lock().concept_count()
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().group_count()
    }

    pub fn has_open_warning(&self, position: usize) -> bool {
        self.state.lock().has_open_warning(position)
    }

    pub fn open_warning_count(&self) -> usize {
        self.state.lock().open_warning_count()
    }
}
