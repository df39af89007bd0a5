//! Core-aware scheduling of enumerated tasks.
//!
//! A single driver thread walks the wait list of pending tasks, matches
//! each task's next stage against the free cores in the shared core map,
//! and spawns one supervisor thread per dispatched run. At most one run
//! of any given task is active at a time.

pub mod active_run;
pub mod core_map;
pub mod metrics;
pub mod scheduler;
pub mod wait_list;

pub use active_run::ActiveRun;
pub use core_map::CoreMap;
pub use metrics::SweepMetrics;
pub use scheduler::Scheduler;
pub use wait_list::WaitList;
