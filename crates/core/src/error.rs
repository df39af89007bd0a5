use thiserror::Error;

/// Errors shared across the sweepbench crates.
///
/// The load-fatal kinds (job file, parameter declaration, pool sizing)
/// abort before the scheduler starts; the remaining kinds are recovered
/// inside the scheduling loop by cancelling the offending task.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job file path cannot be empty")]
    EmptyJobPath,

    #[error("job file does not exist: {0}")]
    JobFileMissing(String),

    #[error("job file is empty: {0}")]
    EmptyJobFile(String),

    #[error("job parse error: {0}")]
    Parse(String),

    #[error("invalid step for {name}: {step}")]
    InvalidStep { name: String, step: i64 },

    #[error("min can't be greater than max for {name}: {min} > {max}")]
    InvalidRange { name: String, min: i64, max: i64 },

    #[error("min requires max for {name}")]
    MissingBound { name: String },

    #[error("stage has too many cores: {stage}: {requested} > {pool}")]
    TooManyCores {
        stage: String,
        requested: usize,
        pool: usize,
    },

    #[error("invalid syntax for CPU sets: {0}")]
    CpuSet(String),

    #[error("core {0} is not in the configured pool")]
    UnknownCore(usize),

    #[error("core {0} is already occupied")]
    CoreOccupied(usize),

    #[error("could not allocate {requested} cores for stage {stage}")]
    CoreAllocation { stage: String, requested: usize },
}
