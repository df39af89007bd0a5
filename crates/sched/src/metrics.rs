use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Operational counters for one scheduler run, keyed by stage name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepMetrics {
    /// Runs handed to a supervisor, by stage name.
    pub stages_dispatched: HashMap<String, u64>,
    /// Runs that finished with exit code zero.
    pub stages_succeeded: HashMap<String, u64>,
    /// Runs that errored or exited non-zero.
    pub stages_failed: HashMap<String, u64>,
    /// Rolling average wall-clock duration of successful runs.
    pub avg_stage_duration: HashMap<String, Duration>,
    /// Last dispatch time by stage name.
    pub last_dispatch: HashMap<String, DateTime<Utc>>,
    /// Tasks cancelled before their queue drained.
    pub tasks_cancelled: u64,
}

impl SweepMetrics {
    /// Record a run being handed to a supervisor.
    pub fn record_dispatch(&mut self, stage: &str) {
        *self.stages_dispatched.entry(stage.to_string()).or_default() += 1;
        self.last_dispatch.insert(stage.to_string(), Utc::now());
    }

    /// Record a successful run and fold its duration into the average.
    pub fn record_success(&mut self, stage: &str, duration: Duration) {
        *self.stages_succeeded.entry(stage.to_string()).or_default() += 1;

        let count = self.stages_succeeded[stage];
        let prev_avg = self
            .avg_stage_duration
            .get(stage)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_stage_duration.insert(stage.to_string(), new_avg);
    }

    /// Record a failed run and the cancellation it triggers.
    pub fn record_failure(&mut self, stage: &str) {
        *self.stages_failed.entry(stage.to_string()).or_default() += 1;
        self.tasks_cancelled += 1;
    }
}
