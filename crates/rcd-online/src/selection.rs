// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::DriftKind;
use std::collections::BTreeMap;

/// How a confirmed drift chooses the next active model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriftDecisionMechanism {
    /// The active model may be kept when it still looks best (false alarm).
    #[default]
    WithFalseAlarms,
    /// Only the background model and the best historical concept compete.
    BackgroundVsHistory,
}

/// Outcome of the selection procedure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriftDecision {
    FalseAlarm,
    Background,
    Recurring { history_index: usize, error: f64 },
}

impl DriftDecision {
    pub fn kind(&self) -> DriftKind {
        match self {
            Self::FalseAlarm => DriftKind::FalseAlarm,
            Self::Background => DriftKind::Background,
            Self::Recurring { .. } => DriftKind::Recurring,
        }
    }

    pub fn history_index(&self) -> Option<usize> {
        match self {
            Self::Recurring { history_index, .. } => Some(*history_index),
            _ => None,
        }
    }
}

/// Lowest error in `ranking`; ties resolve to the lowest history index.
pub fn best_historical(ranking: &BTreeMap<usize, f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (&history_index, &error) in ranking {
        match best {
            Some((_, best_error)) if error >= best_error => {}
            _ => best = Some((history_index, error)),
        }
    }
    best
}

/// Chooses between keeping the active model, promoting the background
/// model, and reactivating a historical concept. Every comparison uses `<=`
/// so ties keep the incumbent or the historical concept.
pub fn select(
    mechanism: DriftDecisionMechanism,
    active_error: f64,
    background_error: Option<f64>,
    ranking: &BTreeMap<usize, f64>,
) -> DriftDecision {
    let Some(background_error) = background_error else {
        return DriftDecision::Background;
    };
    let best = best_historical(ranking);
    let recurring = |(history_index, error): (usize, f64)| DriftDecision::Recurring {
        history_index,
        error,
    };

    match mechanism {
        DriftDecisionMechanism::WithFalseAlarms => {
            if active_error <= background_error {
                match best {
                    Some(candidate) if active_error > candidate.1 => recurring(candidate),
                    _ => DriftDecision::FalseAlarm,
                }
            } else {
                match best {
                    Some(candidate) if candidate.1 <= background_error => recurring(candidate),
                    _ => DriftDecision::Background,
                }
            }
        }
        DriftDecisionMechanism::BackgroundVsHistory => match best {
            Some(candidate) if candidate.1 <= background_error => recurring(candidate),
            _ => DriftDecision::Background,
        },
    }
}
