// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[path = "support/mock_learners.rs"]
mod mock_learners;

use mock_learners::{FixedTopology, ManualDetector, ScriptedClassifier, TestClock, spread_steps};
use rcd_core::{CollectingEventSink, DriftEvent, DriftKind, Instance, WindowConfig};
use rcd_online::{
    BaseLearnerSlot, ConceptHistory, ConceptSnapshot, DriftDecisionMechanism, EnsembleConfig,
    HistoryConfig, LearnerModel, LearnerParts, ModelRole, SlotContext, SlotOptions,
};
use std::collections::BTreeSet;

const WARNING_AT: u64 = 10;
const DRIFT_AT: u64 = 110;
const WINDOW: usize = 100;

fn window() -> WindowConfig {
    WindowConfig {
        default_size: WINDOW,
        resize_enabled: false,
        ..WindowConfig::default()
    }
}

fn options(configure: impl FnOnce(&mut EnsembleConfig)) -> SlotOptions {
    let mut config = EnsembleConfig {
        ensemble_size: 1,
        window: window(),
        ..EnsembleConfig::default()
    };
    configure(&mut config);
    config.validate().expect("scenario config should validate");
    SlotOptions::from_config(&config)
}

struct Scenario {
    clock: TestClock,
    history: ConceptHistory,
    sink: CollectingEventSink,
    options: SlotOptions,
    slot: BaseLearnerSlot,
}

impl Scenario {
    fn new(
        clock: TestClock,
        options: SlotOptions,
        classifier: ScriptedClassifier,
        warning_at: &[u64],
        drift_at: &[u64],
    ) -> Self {
        let parts = LearnerParts {
            classifier: Box::new(classifier),
            warning_detector: Box::new(ManualDetector::firing_at(warning_at.iter().copied())),
            drift_detector: Box::new(ManualDetector::firing_at(drift_at.iter().copied())),
            topology: Box::new(FixedTopology::at(&[0.0, 0.0])),
        };
        let history =
            ConceptHistory::new(HistoryConfig::default(), &options.window).expect("valid history");
        let slot = BaseLearnerSlot::new(0, parts, &options, 3).expect("valid slot");
        Self {
            clock,
            history,
            sink: CollectingEventSink::new(),
            options,
            slot,
        }
    }

    /// Mirrors one ensemble step per `step`: concept evaluators first, then the slot.
    fn run(&mut self, steps: std::ops::RangeInclusive<u64>) {
        for step in steps {
            self.clock.set(step);
            let instance = Instance::new(vec![0.0, 0.0], 0);
            if !self.options.disable_recurring_drifts {
                self.history.update_evaluators(&instance);
            }
            let ctx = SlotContext {
                history: &self.history,
                sink: &self.sink,
                instances_seen: step,
                options: &self.options,
            };
            self.slot
                .process(&instance, &ctx)
                .expect("scripted step should succeed");
        }
    }

    fn resolutions(&self) -> Vec<DriftEvent> {
        self.sink
            .snapshot()
            .into_iter()
            .filter(|event| matches!(event, DriftEvent::DriftResolved { .. }))
            .collect()
    }
}

fn active_with_background(
    clock: &TestClock,
    active_wrong: BTreeSet<u64>,
    background_wrong: BTreeSet<u64>,
) -> ScriptedClassifier {
    ScriptedClassifier::new("active", clock, active_wrong)
        .with_reset_script("background", background_wrong)
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|value| (value - expected).abs() < 1e-9)
}

#[test]
fn better_active_model_resolves_as_false_alarm() {
    let clock = TestClock::new();
    let classifier =
        active_with_background(&clock, spread_steps(11, 2, 10), spread_steps(11, 5, 10));
    let mut scenario = Scenario::new(clock, options(|_| {}), classifier, &[WARNING_AT], &[DRIFT_AT]);
    scenario.run(1..=DRIFT_AT);

    let events = scenario.sink.snapshot();
    assert!(matches!(
        events[0],
        DriftEvent::WarningOpened {
            position: 0,
            instances_seen: WARNING_AT,
            ..
        }
    ));
    let DriftEvent::DriftResolved {
        kind,
        instances_seen,
        history_index,
        active_error,
        background_error,
        ..
    } = events[1].clone()
    else {
        panic!("expected a drift resolution, got {:?}", events[1]);
    };
    assert_eq!(kind, DriftKind::FalseAlarm);
    assert_eq!(instances_seen, DRIFT_AT);
    assert_eq!(history_index, None);
    assert!(close(active_error, 0.02), "active error {active_error:?}");
    assert!(close(background_error, 0.05), "background error {background_error:?}");

    assert!(format!("{:?}", scenario.slot.classifier()).contains("\"active\""));
    assert_eq!(scenario.slot.created_on(), 0);
    assert!(!scenario.slot.has_open_warning());
    assert!(scenario.slot.model().internal_evaluator().is_none());
    assert_eq!(scenario.history.concept_count(), 0);
    assert!(!scenario.history.has_open_warning(0));
    assert_eq!(scenario.slot.counters().false_alarms, 1);
}

#[test]
fn better_background_model_is_promoted() {
    let clock = TestClock::new();
    let classifier =
        active_with_background(&clock, spread_steps(11, 30, 3), spread_steps(11, 5, 10));
    let mut scenario = Scenario::new(clock, options(|_| {}), classifier, &[WARNING_AT], &[DRIFT_AT]);
    scenario.run(1..=DRIFT_AT);

    let resolutions = scenario.resolutions();
    assert_eq!(resolutions.len(), 1);
    assert!(matches!(
        resolutions[0],
        DriftEvent::DriftResolved {
            kind: DriftKind::Background,
            history_index: None,
            ..
        }
    ));
    assert!(format!("{:?}", scenario.slot.classifier()).contains("\"background\""));
    assert_eq!(scenario.slot.created_on(), WARNING_AT);
    assert_eq!(scenario.slot.model().role(), ModelRole::Active);
    assert_eq!(scenario.slot.model().window_default_size(), WINDOW);

    // the replaced model was archived with its pre-warning error
    assert_eq!(scenario.history.concept_count(), 1);
    let archived = scenario
        .history
        .inspect_concept(0, |concept| {
            (
                concept.ensemble_index(),
                concept.error_before_warning(),
                concept.instances_seen_at_archival(),
            )
        })
        .expect("concept 0 should exist");
    assert_eq!(archived, (0, 0.0, DRIFT_AT));
    assert_eq!(scenario.slot.counters().background_drifts, 1);
}

#[test]
fn best_matching_historical_concept_is_reactivated() {
    let clock = TestClock::new();
    let options = options(|_| {});
    let classifier =
        active_with_background(&clock, spread_steps(11, 30, 3), spread_steps(11, 8, 10));
    let mut scenario =
        Scenario::new(clock.clone(), options, classifier, &[WARNING_AT], &[DRIFT_AT]);

    let near = scenario
        .history
        .create_group(Box::new(FixedTopology::at(&[0.0, 0.0])));
    let far = scenario
        .history
        .create_group(Box::new(FixedTopology::at(&[100.0, 100.0])));
    for index in 0..10usize {
        let (group, wrong) = match index {
            7 => (near, spread_steps(11, 2, 10)),
            9 => (near, spread_steps(11, 10, 10)),
            _ => (far, spread_steps(11, 50, 2)),
        };
        let model = LearnerModel::new(
            Box::new(ScriptedClassifier::new(format!("concept-{index}"), &clock, wrong)),
            WINDOW,
            1_000 + index as u64,
            ModelRole::Archived,
        );
        let topology = FixedTopology::at(&[0.0, 0.0]);
        let snapshot = ConceptSnapshot::new(index, 0.1, &model, &topology);
        let stored = scenario
            .history
            .archive_concept(group, snapshot, 0)
            .expect("group exists");
        assert_eq!(stored, index);
    }

    scenario.run(1..=DRIFT_AT);

    let resolutions = scenario.resolutions();
    let DriftEvent::DriftResolved {
        kind,
        history_index,
        active_error,
        background_error,
        ..
    } = resolutions[0].clone()
    else {
        panic!("expected a drift resolution");
    };
    assert_eq!(kind, DriftKind::Recurring);
    assert_eq!(history_index, Some(7));
    assert!(close(active_error, 0.30));
    assert!(close(background_error, 0.08));

    assert!(format!("{:?}", scenario.slot.classifier()).contains("concept-7"));
    assert_eq!(scenario.slot.created_on(), 1_007);
    assert_eq!(scenario.slot.model().role(), ModelRole::Active);
    assert_eq!(scenario.slot.model().window_default_size(), WINDOW);

    // 7 left the history; the replaced model joined the matching group
    assert_eq!(scenario.history.concept_indices(near), vec![9, 10]);
    assert_eq!(scenario.history.concept_indices(far).len(), 8);
    assert_eq!(
        scenario.history.inspect_concept(10, |c| c.ensemble_index()),
        Some(0)
    );
    assert_eq!(
        scenario.history.inspect_concept(9, |c| c.has_evaluator()),
        Some(false)
    );
    assert!(!scenario.history.has_open_warning(0));
    assert_eq!(scenario.slot.counters().recurring_drifts, 1);
}

#[test]
fn history_is_ignored_when_recurring_drifts_are_disabled() {
    let clock = TestClock::new();
    let options = options(|config| config.disable_recurring_drifts = true);
    let classifier =
        active_with_background(&clock, spread_steps(11, 30, 3), spread_steps(11, 8, 10));
    let mut scenario =
        Scenario::new(clock.clone(), options, classifier, &[WARNING_AT], &[DRIFT_AT]);
    let group = scenario
        .history
        .create_group(Box::new(FixedTopology::at(&[0.0, 0.0])));
    let model = LearnerModel::new(
        Box::new(ScriptedClassifier::new("perfect", &clock, BTreeSet::new())),
        WINDOW,
        5,
        ModelRole::Archived,
    );
    scenario
        .history
        .archive_concept(
            group,
            ConceptSnapshot::new(0, 0.0, &model, &FixedTopology::at(&[0.0, 0.0])),
            0,
        )
        .expect("group exists");

    scenario.run(1..=DRIFT_AT);

    assert!(matches!(
        scenario.resolutions()[0],
        DriftEvent::DriftResolved {
            kind: DriftKind::Background,
            ..
        }
    ));
    assert_eq!(scenario.history.concept_count(), 1);
    assert!(!scenario.history.has_open_warning(0));
}

#[test]
fn background_vs_history_never_keeps_the_active_model() {
    let clock = TestClock::new();
    let options = options(|config| {
        config.drift_decision = DriftDecisionMechanism::BackgroundVsHistory;
    });
    let classifier =
        active_with_background(&clock, spread_steps(11, 2, 10), spread_steps(11, 5, 10));
    let mut scenario = Scenario::new(clock, options, classifier, &[WARNING_AT], &[DRIFT_AT]);
    scenario.run(1..=DRIFT_AT);

    assert!(matches!(
        scenario.resolutions()[0],
        DriftEvent::DriftResolved {
            kind: DriftKind::Background,
            ..
        }
    ));
    assert!(format!("{:?}", scenario.slot.classifier()).contains("\"background\""));
}

#[test]
fn drift_without_background_learner_resets_in_place() {
    let clock = TestClock::new();
    let options = options(|config| config.disable_background_learner = true);
    let classifier = ScriptedClassifier::new("active", &clock, BTreeSet::new());
    let mut scenario = Scenario::new(clock, options, classifier, &[WARNING_AT], &[50]);
    scenario.run(1..=60);

    let events = scenario.sink.snapshot();
    assert_eq!(events.len(), 1, "only the drift should be reported: {events:?}");
    assert!(matches!(
        events[0],
        DriftEvent::DriftResolved {
            kind: DriftKind::Background,
            instances_seen: 50,
            history_index: None,
            background_error: None,
            ..
        }
    ));
    assert_eq!(scenario.slot.created_on(), 50);
    assert_eq!(scenario.slot.counters().warnings_detected, 0);
    assert_eq!(scenario.history.concept_count(), 1);
}

#[test]
fn oversized_warning_window_is_reset() {
    let clock = TestClock::new();
    let options = options(|config| config.warning_window_cap = 20);
    let classifier =
        active_with_background(&clock, spread_steps(11, 2, 10), spread_steps(11, 5, 10));
    let mut scenario = Scenario::new(clock, options, classifier, &[WARNING_AT], &[]);
    scenario.run(1..=40);

    let events = scenario.sink.snapshot();
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(
        events[1],
        DriftEvent::WarningWindowReset {
            position: 0,
            instances_seen: 31,
            buffered_instances: 21,
        }
    );
    assert!(!scenario.slot.has_open_warning());
    assert!(!scenario.history.has_open_warning(0));
    assert!(format!("{:?}", scenario.slot.classifier()).contains("\"active\""));
    assert_eq!(scenario.slot.counters().warning_window_resets, 1);
    assert_eq!(scenario.slot.counters().drifts_detected, 0);
}
