use std::sync::Arc;

use sweepbench_job::{Stage, Task};

/// The supervisor record for one dispatched stage: the task it belongs
/// to, the stage being executed, and the core ids exclusively allocated
/// to it. Created at dispatch, dropped once the runner has terminated
/// and the cores are released.
#[derive(Debug)]
pub struct ActiveRun {
    task: Arc<Task>,
    stage: Stage,
    core_ids: Vec<usize>,
    label: String,
}

impl ActiveRun {
    pub fn new(task: Arc<Task>, stage: Stage, core_ids: Vec<usize>) -> Self {
        let label = format!("{}-{}", task.uuid(), stage.name);
        Self {
            task,
            stage,
            core_ids,
            label,
        }
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn core_ids(&self) -> &[usize] {
        &self.core_ids
    }

    /// `"{task-uuid}-{stage-name}"`, the run's identity in logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}
