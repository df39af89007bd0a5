use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sweepbench_core::{RuntimeConfig, SweepError};

use crate::expand::expand;
use crate::task::Task;

/// Type tag carried alongside every parameter value.
///
/// Values are stored as strings throughout the identity layer; the tag
/// records how a consumer should interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    #[serde(alias = "int")]
    Integer,
}

/// How an integer range advances from `min` towards `max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    /// Arithmetic progression: `min, min+step, min+2*step, …`
    #[default]
    Increment,
    /// Geometric progression: `min, min*step, min*step², …`
    Power,
}

/// One parameter declaration from the job document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub only: Vec<String>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub step: Option<i64>,
    #[serde(default)]
    pub step_mode: StepMode,
}

/// A named input or output path shared by every task of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
}

/// One container run stage. Every task executes the job's stages in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub cores: usize,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub path: String,
}

/// The parsed job document: `params`, `inputs`, `outputs`, `runs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub inputs: Vec<FileRef>,
    #[serde(default)]
    pub outputs: Vec<FileRef>,
    #[serde(default)]
    pub runs: Vec<Stage>,
}

/// A loaded, validated job together with its enumerated tasks.
#[derive(Debug)]
pub struct Job {
    pub spec: JobSpec,
    pub tasks: Vec<Arc<Task>>,
}

impl Job {
    /// Load a job document from a YAML file, validate it against the
    /// runtime config, and enumerate its tasks.
    pub fn load(path: &Path, cfg: &RuntimeConfig) -> Result<Self, SweepError> {
        if path.as_os_str().is_empty() {
            return Err(SweepError::EmptyJobPath);
        }
        if !path.exists() {
            return Err(SweepError::JobFileMissing(path.display().to_string()));
        }

        debug!(file = %path.display(), "reading job configuration");

        let raw = fs::read_to_string(path)?;
        if raw.is_empty() {
            return Err(SweepError::EmptyJobFile(path.display().to_string()));
        }

        let spec: JobSpec =
            serde_yaml::from_str(&raw).map_err(|e| SweepError::Parse(e.to_string()))?;

        Self::from_spec(spec, cfg)
    }

    /// Validate an already-parsed document and enumerate its tasks.
    ///
    /// A stage requesting zero cores is normalized to one; a stage
    /// requesting more cores than the pool is a fatal load error.
    pub fn from_spec(mut spec: JobSpec, cfg: &RuntimeConfig) -> Result<Self, SweepError> {
        for stage in &mut spec.runs {
            if stage.cores > cfg.cpus.len() {
                return Err(SweepError::TooManyCores {
                    stage: stage.name.clone(),
                    requested: stage.cores,
                    pool: cfg.cpus.len(),
                });
            }
            if stage.cores == 0 {
                stage.cores = 1;
            }
        }

        info!("calculating number of tasks");

        let assignments = expand(&spec.params)?;

        let inputs: Arc<[FileRef]> = spec.inputs.clone().into();
        let outputs: Arc<[FileRef]> = spec.outputs.clone().into();

        let tasks: Vec<Arc<Task>> = assignments
            .into_iter()
            .map(|params| {
                Arc::new(Task::new(
                    params,
                    Arc::clone(&inputs),
                    Arc::clone(&outputs),
                    &spec.runs,
                ))
            })
            .collect();

        info!(tasks = tasks.len(), "job enumerated");

        Ok(Self { spec, tasks })
    }
}
