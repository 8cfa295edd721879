// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rcd_core::{DriftEvent, DriftKind, RcdError};

/// Detection quality of ensemble-level drift alerts against known drift points.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DriftDetectionMetrics {
    pub mean_detection_delay: Option<f64>,
    pub false_alarm_rate: f64,
    /// Mean run length between false alerts; infinite when there are none.
    pub arl0: f64,
    pub detected_changes: usize,
    pub missed_changes: usize,
    pub false_alerts: usize,
    pub total_alerts: usize,
}

/// Zero-based stream steps at which any position replaced its model.
///
/// False alarms keep the active model and are not alerts.
pub fn alert_steps_from_events(events: &[DriftEvent]) -> Vec<usize> {
    let mut steps: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            DriftEvent::DriftResolved {
                kind: DriftKind::Background | DriftKind::Recurring,
                instances_seen,
                ..
            } => Some(instances_seen.saturating_sub(1) as usize),
            _ => None,
        })
        .collect();
    steps.sort_unstable();
    steps.dedup();
    steps
}

/// Matches alert steps to true drift points over a stream of `horizon` steps.
///
/// An alert detects the latest drift point at or before it, unless that drift
/// point already has a detection; every other alert is false. Both inputs
/// must be strictly increasing; drift points at or beyond `horizon` are
/// ignored.
pub fn drift_detection_metrics(
    alerts: &[usize],
    true_change_points: &[usize],
    horizon: usize,
) -> Result<DriftDetectionMetrics, RcdError> {
    ensure_strictly_increasing("alerts", alerts)?;
    ensure_strictly_increasing("true_change_points", true_change_points)?;
    if let Some(&last) = alerts.last() {
        if last >= horizon {
            return Err(RcdError::invalid_input(format!(
                "alerts must lie inside the horizon; last alert={last}, horizon={horizon}"
            )));
        }
    }

    let observed = &true_change_points[..true_change_points.partition_point(|&cp| cp < horizon)];
    let mut first_detection: Vec<Option<usize>> = vec![None; observed.len()];
    let mut false_alert_steps = Vec::new();
    for &alert in alerts {
        let preceding = observed.partition_point(|&cp| cp <= alert);
        match preceding.checked_sub(1) {
            Some(drift) if first_detection[drift].is_none() => {
                first_detection[drift] = Some(alert - observed[drift]);
            }
            _ => false_alert_steps.push(alert),
        }
    }

    let delays: Vec<usize> = first_detection.iter().flatten().copied().collect();
    Ok(DriftDetectionMetrics {
        mean_detection_delay: mean_delay(&delays),
        false_alarm_rate: if horizon == 0 {
            0.0
        } else {
            false_alert_steps.len() as f64 / horizon as f64
        },
        arl0: average_run_length(&false_alert_steps),
        detected_changes: delays.len(),
        missed_changes: observed.len() - delays.len(),
        false_alerts: false_alert_steps.len(),
        total_alerts: alerts.len(),
    })
}

fn ensure_strictly_increasing(name: &str, steps: &[usize]) -> Result<(), RcdError> {
    match steps.windows(2).position(|pair| pair[0] >= pair[1]) {
        Some(index) => Err(RcdError::invalid_input(format!(
            "{name} must be strictly increasing; {name}[{index}]={} and {name}[{}]={}",
            steps[index],
            index + 1,
            steps[index + 1],
        ))),
        None => Ok(()),
    }
}

fn mean_delay(delays: &[usize]) -> Option<f64> {
    if delays.is_empty() {
        return None;
    }
    Some(delays.iter().map(|&delay| delay as f64).sum::<f64>() / delays.len() as f64)
}

/// Steps from the stream start to the last false alert, per false alert.
fn average_run_length(false_alert_steps: &[usize]) -> f64 {
    match false_alert_steps.last() {
        Some(&last) => (last + 1) as f64 / false_alert_steps.len() as f64,
        None => f64::INFINITY,
    }
}
