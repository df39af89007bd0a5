pub mod config;
pub mod error;

pub use config::{parse_cpu_sets, RuntimeConfig};
pub use error::SweepError;
