// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use parking_lot::Mutex;
use rcd_core::{CollectingEventSink, DriftEvent, EnsembleDiagnostics, EventSink, Instance};
use rcd_eval::{
    DriftDetectionMetrics, PrequentialReport, alert_steps_from_events, drift_detection_metrics,
    run_prequential,
};
use rcd_online::{EnsembleConfig, RecurringConceptEnsemble};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Reads a headered CSV stream. The label column is `label_column` when given,
/// otherwise the last column; an empty label cell yields an unlabelled
/// instance and an empty feature cell a NaN feature.
pub fn read_instances_csv<R: Read>(reader: R, label_column: Option<&str>) -> Result<Vec<Instance>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().context("failed to read CSV header")?.clone();
    if headers.len() < 2 {
        bail!("CSV needs at least one feature column and a label column; got {} columns", headers.len());
    }
    let label_index = match label_column {
        Some(name) => headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| anyhow!("label column '{name}' not found in CSV header"))?,
        None => headers.len() - 1,
    };

    let mut instances = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV record {}", row + 1))?;
        let mut features = Vec::with_capacity(record.len().saturating_sub(1));
        let mut label = None;
        for (column, cell) in record.iter().enumerate() {
            if column == label_index {
                label = parse_label(cell)
                    .with_context(|| format!("invalid label '{cell}' in CSV record {}", row + 1))?;
            } else if cell.is_empty() {
                features.push(f64::NAN);
            } else {
                features.push(cell.parse::<f64>().with_context(|| {
                    format!("invalid feature '{cell}' in CSV record {}, column {column}", row + 1)
                })?);
            }
        }
        instances.push(match label {
            Some(label) => Instance::new(features, label),
            None => Instance::unlabeled(features),
        });
    }
    Ok(instances)
}

fn parse_label(cell: &str) -> Result<Option<usize>> {
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(label) = cell.parse::<usize>() {
        return Ok(Some(label));
    }
    let value: f64 = cell.parse()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(Some(value as usize))
    } else {
        bail!("labels must be non-negative class indices")
    }
}

pub fn load_instances_csv(path: &Path, label_column: Option<&str>) -> Result<Vec<Instance>> {
    let file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    read_instances_csv(file, label_column)
        .with_context(|| format!("failed to parse '{}'", path.display()))
}

/// Writes instances as `x0..xN,label`; unlabelled instances get an empty label cell.
pub fn write_instances_csv<W: Write>(writer: W, instances: &[Instance]) -> Result<()> {
    let num_features = instances.first().map_or(0, Instance::num_features);
    let mut writer = csv::Writer::from_writer(writer);
    let mut header: Vec<String> = (0..num_features).map(|i| format!("x{i}")).collect();
    header.push("label".to_string());
    writer.write_record(&header).context("failed to write CSV header")?;

    for (row, instance) in instances.iter().enumerate() {
        if instance.num_features() != num_features {
            bail!(
                "instance {row} has {} features; expected {num_features}",
                instance.num_features()
            );
        }
        let mut record: Vec<String> = instance.features.iter().map(f64::to_string).collect();
        record.push(instance.label.map(|label| label.to_string()).unwrap_or_default());
        writer.write_record(&record).context("failed to write CSV record")?;
    }
    writer.flush().context("failed to flush CSV output")?;
    Ok(())
}

/// Streams every event as one JSON object per line.
///
/// Write failures cannot surface through [`EventSink`]; the first one is kept
/// and returned by [`JsonLinesSink::finish`].
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    error: Mutex<Option<String>>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            error: Mutex::new(None),
        }
    }

    pub fn finish(self) -> Result<W> {
        if let Some(message) = self.error.into_inner() {
            bail!("failed to write event log: {message}");
        }
        let mut writer = self.writer.into_inner();
        writer.flush().context("failed to flush event log")?;
        Ok(writer)
    }

    fn write_event(&self, event: &DriftEvent) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn on_event(&self, event: &DriftEvent) {
        if let Err(err) = self.write_event(event) {
            self.error.lock().get_or_insert_with(|| err.to_string());
        }
    }
}

/// Forwards each event to every inner sink in order.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanOutSink {
    fn on_event(&self, event: &DriftEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Instances per sample of the windowed accuracy curve.
    pub curve_window: usize,
    /// Zero-based indices of known drifts, if any.
    pub drift_points: Option<Vec<usize>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            curve_window: 500,
            drift_points: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub config: EnsembleConfig,
    pub prequential: PrequentialReport,
    pub diagnostics: EnsembleDiagnostics,
    pub drift_detection: Option<DriftDetectionMetrics>,
}

/// Runs the ensemble test-then-train over `instances`, forwarding events to
/// `events` when given.
pub fn run_stream(
    config: EnsembleConfig,
    instances: Vec<Instance>,
    options: &RunOptions,
    events: Option<Arc<dyn EventSink>>,
) -> Result<RunReport> {
    let horizon = instances.len();
    let collected = Arc::new(CollectingEventSink::new());
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![collected.clone() as Arc<dyn EventSink>];
    sinks.extend(events);

    let mut ensemble = RecurringConceptEnsemble::new(config.clone())
        .context("invalid ensemble configuration")?
        .with_event_sink(Arc::new(FanOutSink::new(sinks)));
    let prequential = run_prequential(&mut ensemble, instances, options.curve_window)
        .context("prequential run failed")?;
    let diagnostics = ensemble.diagnostics();

    let drift_detection = match &options.drift_points {
        Some(points) => {
            let alerts = alert_steps_from_events(&collected.snapshot());
            Some(
                drift_detection_metrics(&alerts, points, horizon)
                    .context("invalid drift points")?,
            )
        }
        None => None,
    };

    info!(
        instances = prequential.instances,
        accuracy = prequential.accuracy,
        drifts = diagnostics.drifts_detected(),
        "run finished"
    );
    Ok(RunReport {
        config,
        prequential,
        diagnostics,
        drift_detection,
    })
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse JSON in '{}'", path.display()))
}

/// Serialises `payload` as pretty JSON to `output_path`, or stdout when absent.
pub fn write_json_output<T: Serialize>(payload: &T, output_path: Option<&Path>) -> Result<()> {
    let encoded =
        serde_json::to_string_pretty(payload).context("failed to serialize JSON output")?;
    match output_path {
        Some(path) => std::fs::write(path, format!("{encoded}\n"))
            .with_context(|| format!("failed to write '{}'", path.display())),
        None => {
            println!("{encoded}");
            Ok(())
        }
    }
}

/// CLI namespace.
pub fn crate_name() -> &'static str {
    let _ = (rcd_online::crate_name(), rcd_eval::crate_name());
    "rcd-cli"
}
