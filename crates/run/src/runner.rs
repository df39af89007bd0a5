use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use thiserror::Error;
use tracing::{debug, info};

use crate::image::{ImageError, ImageRef};

/// Everything a runner needs to execute one dispatched stage: the stage
/// fields plus the core ids the scheduler allocated to it.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// `"{task-uuid}-{stage-name}"`, used for logging and scratch paths.
    pub label: String,
    /// Content address of the owning task.
    pub task: String,
    pub image: String,
    pub cmd: String,
    /// Working path from the stage; empty means a scratch directory.
    pub path: String,
    pub devices: Vec<String>,
    /// Core ids the run is pinned to.
    pub core_ids: Vec<usize>,
}

/// Failures inside a runner, reported back to the supervising thread.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("runner was not started")]
    NotStarted,

    #[error("run failed: {0}")]
    Failed(String),
}

/// One cancellable, exit-code-returning stage execution.
///
/// The scheduler drives exactly one `init → start → wait → destroy` cycle
/// per dispatched stage; `destroy` is called regardless of how `wait`
/// went.
pub trait Runner: Send {
    /// Prepare the execution environment (image validation, work dirs).
    fn init(&mut self) -> Result<(), RunnerError>;

    /// Begin executing the stage command.
    fn start(&mut self) -> Result<(), RunnerError>;

    /// Block until the stage terminates; returns its exit code.
    fn wait(&mut self) -> Result<i32, RunnerError>;

    /// Tear down whatever `init`/`start` set up.
    fn destroy(&mut self) -> Result<(), RunnerError>;
}

/// Provisions one boxed [`Runner`] per dispatched stage. The scheduler
/// only sees this trait, so tests inject recording mocks and the CLI
/// swaps implementations for `--dry-run`.
pub trait RunnerFactory: Send + Sync {
    fn provision(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError>;
}

// ── Process runner ───────────────────────────────────────────────────

/// Executes the stage command as a local child process.
///
/// Image pulling and container isolation are outside this crate; the
/// image reference is still parsed and validated so a bad reference
/// fails the run before anything executes. The allocated core ids are
/// exported through `SWEEPBENCH_CORES` for the command to consume.
pub struct ProcessRunner {
    config: RunnerConfig,
    workdir: PathBuf,
    child: Option<Child>,
}

impl ProcessRunner {
    fn new(config: RunnerConfig, work_root: &Path) -> Self {
        let workdir = if config.path.is_empty() {
            work_root.join(&config.label)
        } else {
            PathBuf::from(&config.path)
        };
        Self {
            config,
            workdir,
            child: None,
        }
    }

    fn core_list(&self) -> String {
        self.config
            .core_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Runner for ProcessRunner {
    fn init(&mut self) -> Result<(), RunnerError> {
        let image = ImageRef::parse(&self.config.image)?;
        info!(run = %self.config.label, image = %image, "preparing run");

        fs::create_dir_all(&self.workdir)?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), RunnerError> {
        if self.config.cmd.is_empty() {
            debug!(run = %self.config.label, "stage has no command");
            return Ok(());
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.config.cmd)
            .current_dir(&self.workdir)
            .env("SWEEPBENCH_CORES", self.core_list())
            .env("SWEEPBENCH_RUN", &self.config.label)
            .spawn()?;

        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self) -> Result<i32, RunnerError> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.wait()?;
                self.child = None;
                // A signal death carries no code; report it as failure.
                Ok(status.code().unwrap_or(-1))
            }
            None if self.config.cmd.is_empty() => Ok(0),
            None => Err(RunnerError::NotStarted),
        }
    }

    fn destroy(&mut self) -> Result<(), RunnerError> {
        if let Some(mut child) = self.child.take() {
            // wait() never ran; don't leave the process behind.
            child.kill()?;
            child.wait()?;
        }
        Ok(())
    }
}

/// Factory for [`ProcessRunner`], rooted at a scratch directory for
/// stages that declare no working path.
pub struct ProcessRunnerFactory {
    work_root: PathBuf,
}

impl ProcessRunnerFactory {
    pub fn new(work_root: PathBuf) -> Self {
        Self { work_root }
    }
}

impl RunnerFactory for ProcessRunnerFactory {
    fn provision(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError> {
        Ok(Box::new(ProcessRunner::new(config, &self.work_root)))
    }
}

// ── Dry runner ───────────────────────────────────────────────────────

/// Logs the run instead of executing it; every stage succeeds.
pub struct DryRunner {
    config: RunnerConfig,
}

impl Runner for DryRunner {
    fn init(&mut self) -> Result<(), RunnerError> {
        let image = ImageRef::parse(&self.config.image)?;
        info!(run = %self.config.label, image = %image, "dry run: skipping image pull");
        Ok(())
    }

    fn start(&mut self) -> Result<(), RunnerError> {
        info!(
            run = %self.config.label,
            cores = ?self.config.core_ids,
            cmd = %self.config.cmd,
            "dry run: skipping execution"
        );
        Ok(())
    }

    fn wait(&mut self) -> Result<i32, RunnerError> {
        Ok(0)
    }

    fn destroy(&mut self) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// Factory for [`DryRunner`].
pub struct DryRunFactory;

impl RunnerFactory for DryRunFactory {
    fn provision(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError> {
        Ok(Box::new(DryRunner { config }))
    }
}
