//! Job document model and task enumeration.
//!
//! A job declares typed parameters and an ordered list of container run
//! stages. Loading a job expands the parameter declarations into the
//! cartesian product of concrete assignments and materializes one [`Task`]
//! per assignment, each carrying its own FIFO of the job's stages.

pub mod expand;
pub mod queue;
pub mod spec;
pub mod task;

pub use queue::StageQueue;
pub use spec::{FileRef, Job, JobSpec, ParamSpec, ParamType, Stage, StepMode};
pub use task::{ParamValue, Task};
