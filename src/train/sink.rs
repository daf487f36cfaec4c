//! Metrics sinks: where per-epoch values and best-checkpoint events go.
//!
//! Persistence is external; [`MetricHistory`] keeps records in memory and can
//! be serialized for a reporting layer.

use crate::model::Parameter;
use serde::{Deserialize, Serialize};

/// Receives `(phase, epoch, metric, value)` records.
pub trait MetricsSink: Send {
    fn record(&mut self, phase: &str, epoch: usize, metric: &str, value: f64);

    /// Called whenever the monitored metric improves.
    fn checkpoint(&mut self, _phase: &str, _epoch: usize, _params: &[Parameter]) {}
}

/// One recorded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub phase: String,
    pub epoch: usize,
    pub metric: String,
    pub value: f64,
}

/// Best-model event seen by [`MetricHistory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEvent {
    pub phase: String,
    pub epoch: usize,
}

/// In-memory sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricHistory {
    pub records: Vec<MetricRecord>,
    pub checkpoints: Vec<CheckpointEvent>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(epoch, value)` pairs of one metric within one phase.
    pub fn series(&self, phase: &str, metric: &str) -> Vec<(usize, f64)> {
        self.records
            .iter()
            .filter(|r| r.phase == phase && r.metric == metric)
            .map(|r| (r.epoch, r.value))
            .collect()
    }

    /// Last recorded value of one metric within one phase.
    pub fn last(&self, phase: &str, metric: &str) -> Option<f64> {
        self.records
            .iter()
            .rev()
            .find(|r| r.phase == phase && r.metric == metric)
            .map(|r| r.value)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl MetricsSink for MetricHistory {
    fn record(&mut self, phase: &str, epoch: usize, metric: &str, value: f64) {
        self.records.push(MetricRecord {
            phase: phase.to_string(),
            epoch,
            metric: metric.to_string(),
            value,
        });
    }

    fn checkpoint(&mut self, phase: &str, epoch: usize, _params: &[Parameter]) {
        self.checkpoints.push(CheckpointEvent { phase: phase.to_string(), epoch });
    }
}

/// Emits every record as a `debug` tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&mut self, phase: &str, epoch: usize, metric: &str, value: f64) {
        tracing::debug!(phase, epoch, metric, value, "metric");
    }
}
