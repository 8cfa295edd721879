// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::EnsembleConfig;
use crate::dynamic_window::WindowedEvaluator;
use crate::history::{Concept, ConceptHistory, ConceptSnapshot};
use crate::model::{LearnerModel, ModelRole};
use crate::selection::{DriftDecision, DriftDecisionMechanism, select};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use rcd_core::{
    ChangeDetector, Classifier, DriftEvent, DriftKind, EventSink, Instance, RcdError,
    SlotCounters, TopologyLearner, WindowConfig,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-position behaviour switches shared by every slot of an ensemble.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotOptions {
    pub lambda: f64,
    pub window: WindowConfig,
    pub drift_decision: DriftDecisionMechanism,
    pub disable_drift_detection: bool,
    pub disable_background_learner: bool,
    pub disable_recurring_drifts: bool,
    pub warning_window_cap: usize,
    pub log_train_examples: bool,
}

impl SlotOptions {
    pub fn from_config(config: &EnsembleConfig) -> Self {
        Self {
            lambda: config.lambda,
            window: config.window.clone(),
            drift_decision: config.drift_decision,
            disable_drift_detection: config.disable_drift_detection,
            disable_background_learner: config.disable_background_learner,
            disable_recurring_drifts: config.disable_recurring_drifts,
            warning_window_cap: config.warning_window_cap,
            log_train_examples: config.log_train_examples,
        }
    }
}

/// Collaborators one slot is built from.
#[derive(Debug)]
pub struct LearnerParts {
    pub classifier: Box<dyn Classifier>,
    pub warning_detector: Box<dyn ChangeDetector>,
    pub drift_detector: Box<dyn ChangeDetector>,
    pub topology: Box<dyn TopologyLearner>,
}

impl LearnerParts {
    pub fn from_config(config: &EnsembleConfig) -> Result<Self, RcdError> {
        Ok(Self {
            classifier: config.classifier.build(),
            warning_detector: config.warning_detector.build()?,
            drift_detector: config.drift_detector.build()?,
            topology: config.topology.build()?,
        })
    }

    /// Independent copies of every collaborator.
    pub fn copy(&self) -> Self {
        Self {
            classifier: self.classifier.copy(),
            warning_detector: self.warning_detector.copy(),
            drift_detector: self.drift_detector.copy(),
            topology: self.topology.copy(),
        }
    }
}

/// Shared, read-mostly context handed to a slot for one instance.
#[derive(Clone, Copy)]
pub struct SlotContext<'a> {
    pub history: &'a ConceptHistory,
    pub sink: &'a dyn EventSink,
    pub instances_seen: u64,
    pub options: &'a SlotOptions,
}

/// State kept between a warning and its resolution.
#[derive(Debug)]
pub struct WarningWindow {
    background: LearnerModel,
    pending: Option<ConceptSnapshot>,
    buffer: Vec<Instance>,
    opened_at: u64,
    error_before_warning: f64,
}

impl WarningWindow {
    pub fn background(&self) -> &LearnerModel {
        &self.background
    }

    pub fn pending(&self) -> Option<&ConceptSnapshot> {
        self.pending.as_ref()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn opened_at(&self) -> u64 {
        self.opened_at
    }

    pub fn error_before_warning(&self) -> f64 {
        self.error_before_warning
    }
}

#[derive(Debug)]
pub enum SlotState {
    Active,
    WarningOpen(Box<WarningWindow>),
}

struct Resolution {
    kind: DriftKind,
    history_index: Option<usize>,
    active_error: Option<f64>,
    background_error: Option<f64>,
}

/// One ensemble position: the active model, its detectors, its topology
/// summary and, while a warning is open, the background candidate.
#[derive(Debug)]
pub struct BaseLearnerSlot {
    position: usize,
    model: LearnerModel,
    state: SlotState,
    warning_detector: Box<dyn ChangeDetector>,
    drift_detector: Box<dyn ChangeDetector>,
    topology: Box<dyn TopologyLearner>,
    rng: ChaCha8Rng,
    poisson: Poisson<f64>,
    counters: SlotCounters,
}

impl BaseLearnerSlot {
    /// `seed` feeds this position's own bagging RNG.
    pub fn new(
        position: usize,
        parts: LearnerParts,
        options: &SlotOptions,
        seed: u64,
    ) -> Result<Self, RcdError> {
        let poisson = Poisson::new(options.lambda).map_err(|err| {
            RcdError::invalid_input(format!(
                "lambda must be finite and > 0; got {} ({err})",
                options.lambda
            ))
        })?;
        Ok(Self {
            position,
            model: LearnerModel::new(
                parts.classifier,
                options.window.default_size,
                0,
                ModelRole::Active,
            ),
            state: SlotState::Active,
            warning_detector: parts.warning_detector,
            drift_detector: parts.drift_detector,
            topology: parts.topology,
            rng: ChaCha8Rng::seed_from_u64(seed),
            poisson,
            counters: SlotCounters::default(),
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn model(&self) -> &LearnerModel {
        &self.model
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.model.classifier()
    }

    pub fn created_on(&self) -> u64 {
        self.model.created_on()
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn has_open_warning(&self) -> bool {
        matches!(self.state, SlotState::WarningOpen(_))
    }

    pub fn warning_window(&self) -> Option<&WarningWindow> {
        match &self.state {
            SlotState::WarningOpen(window) => Some(window),
            SlotState::Active => None,
        }
    }

    pub fn background(&self) -> Option<&LearnerModel> {
        self.warning_window().map(WarningWindow::background)
    }

    pub fn topology(&self) -> &dyn TopologyLearner {
        self.topology.as_ref()
    }

    pub fn counters(&self) -> &SlotCounters {
        &self.counters
    }

    pub fn votes(&self, instance: &Instance) -> Vec<f64> {
        self.model.classifier().votes(instance)
    }

    /// Prequential step for one labelled instance: evaluate, train, then feed
    /// the detectors and run any warning or drift transition they signal.
    ///
    /// Returns whether the active model classified the instance correctly
    /// before training on it.
    pub fn process(&mut self, instance: &Instance, ctx: &SlotContext<'_>) -> Result<bool, RcdError> {
        let options = ctx.options;
        let correct = self.model.evaluate(instance);
        if let SlotState::WarningOpen(window) = &mut self.state {
            window.background.evaluate(instance);
        }
        if options.log_train_examples {
            ctx.sink.on_event(&DriftEvent::TrainExample {
                position: self.position,
                instances_seen: ctx.instances_seen,
                correct,
            });
        }

        // Only the active model is bagged; the background sees every instance.
        let k: f64 = self.poisson.sample(&mut self.rng);
        if k > 0.0 {
            self.model.train(instance, k * instance.weight);
        }
        if let SlotState::WarningOpen(window) = &mut self.state {
            window.background.train(instance, instance.weight);
        }

        match &mut self.state {
            SlotState::Active => self.topology.train(instance),
            SlotState::WarningOpen(window) => window.buffer.push(instance.clone()),
        }

        if options.disable_drift_detection {
            return Ok(correct);
        }

        let signal = if self.model.classifier().correctly_classifies(instance) {
            0.0
        } else {
            1.0
        };

        if !options.disable_background_learner {
            let over_cap = self
                .warning_window()
                .is_some_and(|window| window.buffered() > options.warning_window_cap);
            if over_cap {
                self.reset_warning_window(ctx);
            }
            self.warning_detector.input(signal);
            if self.warning_detector.detected_change() && !self.has_open_warning() {
                self.open_warning(ctx)?;
            }
        }

        self.drift_detector.input(signal);
        if self.drift_detector.detected_change() {
            self.resolve_drift(ctx)?;
        }
        Ok(correct)
    }

    /// Opens a warning window: snapshot the active model, spawn a background
    /// candidate and register this position with the concept history.
    pub fn open_warning(&mut self, ctx: &SlotContext<'_>) -> Result<(), RcdError> {
        if self.has_open_warning() {
            return Err(RcdError::invalid_state(format!(
                "position {} already has an open warning window",
                self.position
            )));
        }
        let options = ctx.options;
        let position = self.position;
        let error_before_warning = self.model.cumulative_error();

        let pending = (!options.disable_recurring_drifts).then(|| {
            ConceptSnapshot::new(
                position,
                error_before_warning,
                &self.model,
                self.topology.as_ref(),
            )
        });
        self.model
            .attach_internal_evaluator(&options.window, position, error_before_warning)?;
        let mut background = self
            .model
            .spawn_background(options.window.default_size, ctx.instances_seen);
        background.attach_internal_evaluator(&options.window, position, error_before_warning)?;
        if !options.disable_recurring_drifts {
            ctx.history.on_warning_opened(position, error_before_warning)?;
        }

        self.state = SlotState::WarningOpen(Box::new(WarningWindow {
            background,
            pending,
            buffer: Vec::new(),
            opened_at: ctx.instances_seen,
            error_before_warning,
        }));
        self.counters.warnings_detected += 1;

        debug!(
            position,
            instances_seen = ctx.instances_seen,
            error_before_warning,
            "warning window opened"
        );
        ctx.sink.on_event(&DriftEvent::WarningOpened {
            position,
            instances_seen: ctx.instances_seen,
            error_before_warning,
        });
        Ok(())
    }

    /// Discards the background candidate and pending snapshot without a drift.
    pub fn reset_warning_window(&mut self, ctx: &SlotContext<'_>) {
        let SlotState::WarningOpen(window) = std::mem::replace(&mut self.state, SlotState::Active)
        else {
            return;
        };
        let buffered_instances = window.buffer.len();
        if !ctx.options.disable_recurring_drifts {
            ctx.history.on_warning_closed(self.position);
        }
        self.model.detach_internal_evaluator();
        self.flush_buffer(&window.buffer);
        self.warning_detector.reset();
        self.counters.warning_window_resets += 1;

        debug!(
            position = self.position,
            instances_seen = ctx.instances_seen,
            buffered_instances,
            "warning window reset"
        );
        ctx.sink.on_event(&DriftEvent::WarningWindowReset {
            position: self.position,
            instances_seen: ctx.instances_seen,
            buffered_instances,
        });
    }

    /// Handles a confirmed drift and returns how it was resolved.
    pub fn resolve_drift(&mut self, ctx: &SlotContext<'_>) -> Result<DriftKind, RcdError> {
        self.counters.drifts_detected += 1;
        let resolution = match std::mem::replace(&mut self.state, SlotState::Active) {
            SlotState::Active => self.drift_without_background(ctx)?,
            // confirmed on the instance that opened the warning: nothing to compare yet
            SlotState::WarningOpen(window) if window.buffered() == 0 => {
                if !ctx.options.disable_recurring_drifts {
                    ctx.history.on_warning_closed(self.position);
                }
                self.model.detach_internal_evaluator();
                self.drift_without_background(ctx)?
            }
            SlotState::WarningOpen(window) => self.resolve_warning(*window, ctx)?,
        };
        self.counters.record_resolution(resolution.kind);
        self.warning_detector.reset();
        self.drift_detector.reset();

        info!(
            position = self.position,
            instances_seen = ctx.instances_seen,
            kind = resolution.kind.as_str(),
            history_index = ?resolution.history_index,
            active_error = ?resolution.active_error,
            background_error = ?resolution.background_error,
            "drift resolved"
        );
        ctx.sink.on_event(&DriftEvent::DriftResolved {
            position: self.position,
            instances_seen: ctx.instances_seen,
            kind: resolution.kind,
            history_index: resolution.history_index,
            active_error: resolution.active_error,
            background_error: resolution.background_error,
        });
        Ok(resolution.kind)
    }

    /// No candidate was trained: archive the current model and start afresh.
    fn drift_without_background(&mut self, ctx: &SlotContext<'_>) -> Result<Resolution, RcdError> {
        let options = ctx.options;
        let active_error = self.model.cumulative_error();
        if !options.disable_recurring_drifts {
            let snapshot = ConceptSnapshot::new(
                self.position,
                active_error,
                &self.model,
                self.topology.as_ref(),
            );
            ctx.history.archive(snapshot, ctx.instances_seen)?;
        }
        self.model
            .reset(options.window.default_size, ctx.instances_seen);
        self.topology.reset();
        Ok(Resolution {
            kind: DriftKind::Background,
            history_index: None,
            active_error: Some(active_error),
            background_error: None,
        })
    }

    fn resolve_warning(
        &mut self,
        window: WarningWindow,
        ctx: &SlotContext<'_>,
    ) -> Result<Resolution, RcdError> {
        let options = ctx.options;
        let position = self.position;
        let WarningWindow {
            mut background,
            pending,
            buffer,
            ..
        } = window;

        let active_error = self.model.windowed_error(position)?;
        let background_error = background.windowed_error(position)?;

        let (decision, retrieved) = if options.disable_recurring_drifts {
            let decision = select(
                options.drift_decision,
                active_error,
                Some(background_error),
                &BTreeMap::new(),
            );
            (decision, None)
        } else {
            let points: Vec<Vec<f64>> = buffer.iter().map(|inst| inst.features.clone()).collect();
            ctx.history.with_state(|history| {
                let nearest = history.find_nearest_group(&points);
                let ranking = nearest
                    .map(|group_id| history.rank_applicable(group_id, position))
                    .unwrap_or_default();
                let decision = select(
                    options.drift_decision,
                    active_error,
                    Some(background_error),
                    &ranking,
                );

                let retrieved = match (decision, nearest) {
                    (DriftDecision::Recurring { history_index, .. }, Some(group_id)) => {
                        Some(history.extract_concept(group_id, history_index)?)
                    }
                    _ => None,
                };
                history.on_warning_closed(position);
                if decision != DriftDecision::FalseAlarm {
                    if let Some(snapshot) = pending {
                        history.archive(snapshot, ctx.instances_seen)?;
                    }
                }
                Ok::<_, RcdError>((decision, retrieved))
            })?
        };

        match decision {
            DriftDecision::FalseAlarm => {
                self.model.detach_internal_evaluator();
            }
            DriftDecision::Background => {
                background.detach_internal_evaluator();
                background.set_role(ModelRole::Active);
                self.model = background;
                self.topology.reset();
            }
            DriftDecision::Recurring { history_index, .. } => {
                let concept = retrieved.ok_or_else(|| {
                    RcdError::invalid_state(format!(
                        "selected concept {history_index} was not retrieved for position {position}"
                    ))
                })?;
                self.model = self.adopt_concept(concept, &options.window);
                self.topology.reset();
            }
        }
        self.flush_buffer(&buffer);

        Ok(Resolution {
            kind: decision.kind(),
            history_index: decision.history_index(),
            active_error: Some(active_error),
            background_error: Some(background_error),
        })
    }

    fn adopt_concept(&self, concept: Concept, window: &WindowConfig) -> LearnerModel {
        let remembered = concept
            .model()
            .internal_evaluator()
            .and_then(|evaluator| evaluator.window_size(self.position).ok());
        let mut model = concept.into_model();
        model.detach_internal_evaluator();
        model.set_role(ModelRole::Active);
        if window.remember_size_on_retrieval {
            if let Some(size) = remembered {
                model.set_window_default_size(size);
            }
        }
        model
    }

    fn flush_buffer(&mut self, buffer: &[Instance]) {
        for instance in buffer {
            self.topology.train(instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BaseLearnerSlot, LearnerParts, SlotContext, SlotOptions};
    use crate::config::{EnsembleConfig, HistoryConfig};
    use crate::history::ConceptHistory;
    use rcd_core::{
        Classifier, CollectingEventSink, DriftEvent, DriftKind, Instance, WindowConfig,
    };
    use rcd_learners::{
        ChangeDetectorSpec, ClassifierSpec, DdmConfig, PageHinkleyConfig, TopologySpec,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always-correct classifier that counts its training calls. A reset
    /// marks the copy as a background candidate with its own counter.
    #[derive(Clone, Debug, Default)]
    struct CountingClassifier {
        active_calls: Arc<AtomicUsize>,
        background_calls: Arc<AtomicUsize>,
        background: bool,
    }

    impl Classifier for CountingClassifier {
        fn train(&mut self, _instance: &Instance, _weight: f64) {
            let calls = if self.background {
                &self.background_calls
            } else {
                &self.active_calls
            };
            calls.fetch_add(1, Ordering::SeqCst);
        }

        fn votes(&self, instance: &Instance) -> Vec<f64> {
            let label = instance.label.unwrap_or(0);
            let mut votes = vec![0.0; label + 1];
            votes[label] = 1.0;
            votes
        }

        fn reset_learning(&mut self) {
            self.background = true;
        }

        fn copy(&self) -> Box<dyn Classifier> {
            Box::new(self.clone())
        }
    }

    fn options(config: &EnsembleConfig) -> SlotOptions {
        SlotOptions::from_config(config)
    }

    fn slot_for(config: &EnsembleConfig) -> BaseLearnerSlot {
        let parts = LearnerParts::from_config(config).expect("valid parts");
        BaseLearnerSlot::new(0, parts, &options(config), 7).expect("valid slot")
    }

    #[test]
    fn invalid_lambda_is_rejected() {
        let config = EnsembleConfig::default();
        let parts = LearnerParts::from_config(&config).expect("valid parts");
        let bad = SlotOptions {
            lambda: 0.0,
            ..options(&config)
        };
        let err = BaseLearnerSlot::new(0, parts, &bad, 1).expect_err("zero lambda must fail");
        assert!(err.to_string().contains("lambda"));
    }

    #[test]
    fn warning_then_false_alarm_round_trip_via_explicit_transitions() {
        let config = EnsembleConfig {
            classifier: ClassifierSpec::MajorityClass,
            ..EnsembleConfig::default()
        };
        let opts = options(&config);
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let mut slot = slot_for(&config);

        let ctx = SlotContext {
            history: &history,
            sink: &sink,
            instances_seen: 5,
            options: &opts,
        };
        slot.open_warning(&ctx).expect("warning should open");
        assert!(slot.has_open_warning());
        assert!(history.has_open_warning(0));
        assert!(slot.open_warning(&ctx).is_err());
        assert_eq!(slot.background().map(|b| b.created_on()), Some(5));

        let next = SlotContext {
            instances_seen: 6,
            ..ctx
        };
        slot.process(&Instance::new(vec![0.0], 0), &next)
            .expect("processing should succeed");
        let kind = slot.resolve_drift(&next).expect("drift should resolve");
        // both candidates missed the only windowed instance
        assert_eq!(kind, DriftKind::FalseAlarm);
        assert!(!slot.has_open_warning());
        assert!(!history.has_open_warning(0));
        assert_eq!(history.concept_count(), 0);
        assert_eq!(slot.counters().false_alarms, 1);

        let events = sink.take();
        assert!(matches!(events[0], DriftEvent::WarningOpened { position: 0, .. }));
        assert!(matches!(
            events[1],
            DriftEvent::DriftResolved {
                kind: DriftKind::FalseAlarm,
                ..
            }
        ));
    }

    #[test]
    fn drift_on_the_warning_instance_skips_the_comparison() {
        let config = EnsembleConfig {
            classifier: ClassifierSpec::MajorityClass,
            ..EnsembleConfig::default()
        };
        let opts = options(&config);
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let mut slot = slot_for(&config);
        let ctx = SlotContext {
            history: &history,
            sink: &sink,
            instances_seen: 9,
            options: &opts,
        };
        slot.open_warning(&ctx).expect("warning should open");
        let kind = slot.resolve_drift(&ctx).expect("drift should resolve");
        assert_eq!(kind, DriftKind::Background);
        assert!(!slot.has_open_warning());
        assert!(!history.has_open_warning(0));
        assert_eq!(history.concept_count(), 1);
        assert_eq!(slot.created_on(), 9);
        assert!(slot.model().internal_evaluator().is_none());
    }

    #[test]
    fn drift_without_background_archives_and_resets() {
        let config = EnsembleConfig {
            classifier: ClassifierSpec::MajorityClass,
            ..EnsembleConfig::default()
        };
        let opts = options(&config);
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let mut slot = slot_for(&config);
        for step in 1..=20u64 {
            let ctx = SlotContext {
                history: &history,
                sink: &sink,
                instances_seen: step,
                options: &opts,
            };
            slot.process(&Instance::new(vec![0.0, 0.0], 1), &ctx)
                .expect("processing should succeed");
        }
        let ctx = SlotContext {
            history: &history,
            sink: &sink,
            instances_seen: 21,
            options: &opts,
        };
        let kind = slot.resolve_drift(&ctx).expect("drift should resolve");
        assert_eq!(kind, DriftKind::Background);
        assert_eq!(slot.created_on(), 21);
        assert_eq!(history.concept_count(), 1);
        assert!(slot.votes(&Instance::unlabeled(vec![0.0, 0.0])).is_empty());
        assert_eq!(slot.counters().background_drifts, 1);
    }

    #[test]
    fn disabled_drift_detection_never_opens_warnings() {
        let config = EnsembleConfig {
            classifier: ClassifierSpec::MajorityClass,
            disable_drift_detection: true,
            warning_detector: ChangeDetectorSpec::Ddm(DdmConfig {
                min_instances: 1,
                out_control_level: 0.0001,
            }),
            ..EnsembleConfig::default()
        };
        let opts = options(&config);
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let mut slot = slot_for(&config);
        for step in 1..=200u64 {
            let ctx = SlotContext {
                history: &history,
                sink: &sink,
                instances_seen: step,
                options: &opts,
            };
            slot.process(&Instance::new(vec![0.0], (step % 2) as usize), &ctx)
                .expect("processing should succeed");
        }
        assert_eq!(slot.counters().warnings_detected, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn train_examples_are_logged_when_enabled() {
        let config = EnsembleConfig {
            classifier: ClassifierSpec::MajorityClass,
            log_train_examples: true,
            drift_detector: ChangeDetectorSpec::PageHinkley(PageHinkleyConfig::default()),
            topology: TopologySpec::default(),
            ..EnsembleConfig::default()
        };
        let opts = options(&config);
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let mut slot = slot_for(&config);
        let ctx = SlotContext {
            history: &history,
            sink: &sink,
            instances_seen: 1,
            options: &opts,
        };
        let correct = slot
            .process(&Instance::new(vec![0.0], 0), &ctx)
            .expect("processing should succeed");
        assert!(!correct);
        assert_eq!(
            sink.snapshot(),
            vec![DriftEvent::TrainExample {
                position: 0,
                instances_seen: 1,
                correct: false,
            }]
        );
    }

    #[test]
    fn background_trains_on_every_instance_while_the_active_model_is_bagged() {
        let classifier = CountingClassifier::default();
        let active_calls = Arc::clone(&classifier.active_calls);
        let background_calls = Arc::clone(&classifier.background_calls);
        let config = EnsembleConfig {
            disable_drift_detection: true,
            ..EnsembleConfig::default()
        };
        let opts = SlotOptions {
            lambda: 0.5,
            warning_window_cap: 1_000,
            ..options(&config)
        };
        let parts = LearnerParts {
            classifier: Box::new(classifier),
            ..LearnerParts::from_config(&config).expect("valid parts")
        };
        let mut slot = BaseLearnerSlot::new(0, parts, &opts, 7).expect("valid slot");
        let history = ConceptHistory::new(HistoryConfig::default(), &WindowConfig::default())
            .expect("valid history");
        let sink = CollectingEventSink::new();
        let ctx = SlotContext {
            history: &history,
            sink: &sink,
            instances_seen: 0,
            options: &opts,
        };
        slot.open_warning(&ctx).expect("warning should open");

        for step in 1..=50u64 {
            let ctx = SlotContext {
                instances_seen: step,
                ..ctx
            };
            slot.process(&Instance::new(vec![0.0], 1), &ctx)
                .expect("processing should succeed");
        }

        assert!(slot.has_open_warning());
        assert_eq!(background_calls.load(Ordering::SeqCst), 50);
        // Poisson(0.5) draws zero for most instances
        assert!(active_calls.load(Ordering::SeqCst) < 50);
    }
}
