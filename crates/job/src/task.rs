use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::queue::StageQueue;
use crate::spec::{FileRef, ParamType, Stage};

/// One concrete value for a declared parameter. The value stays a string
/// regardless of type so that task identity never depends on numeric
/// parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamValue {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub value: String,
}

impl ParamValue {
    pub fn new(name: &str, ty: ParamType, value: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            value: value.to_string(),
        }
    }
}

/// One concrete parameter assignment plus its queued stages.
///
/// Tasks are created by expansion and live on the scheduler's wait list
/// until their stage queue drains — either by successful dispatch of
/// every stage or by [`Task::cancel`].
#[derive(Debug)]
pub struct Task {
    params: Vec<ParamValue>,
    inputs: Arc<[FileRef]>,
    outputs: Arc<[FileRef]>,
    stages: StageQueue,
    uuid: OnceLock<String>,
}

impl Task {
    pub fn new(
        params: Vec<ParamValue>,
        inputs: Arc<[FileRef]>,
        outputs: Arc<[FileRef]>,
        stages: &[Stage],
    ) -> Self {
        Self {
            params,
            inputs,
            outputs,
            stages: StageQueue::new(stages),
            uuid: OnceLock::new(),
        }
    }

    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    pub fn inputs(&self) -> &[FileRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FileRef] {
        &self.outputs
    }

    pub fn stages(&self) -> &StageQueue {
        &self.stages
    }

    /// Stable content address of this task: the SHA-256 hex digest of the
    /// `name=value` lines in declaration order. Computed once, on first
    /// use.
    pub fn uuid(&self) -> &str {
        self.uuid.get_or_init(|| {
            let mut hasher = Sha256::new();
            for param in &self.params {
                hasher.update(format!("{}={}\n", param.name, param.value));
            }
            let digest = hasher.finalize();
            format!("{digest:x}")
        })
    }

    /// Cancel the task by dropping every queued stage. The scheduler's
    /// drain check then removes it from the wait list. A stage already
    /// executing runs to completion.
    pub fn cancel(&self) {
        warn!(task = %self.uuid(), "cancelling task and all queued stages");
        self.stages.clear();
    }
}
