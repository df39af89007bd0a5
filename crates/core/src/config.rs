use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Runtime configuration for one invocation of the harness.
///
/// `cpus` is the fixed pool of physical core ids that stages are pinned
/// to; its size bounds the largest `cores` any stage may request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Physical core ids available to the scheduler.
    pub cpus: Vec<usize>,
    /// Seconds to sleep at the end of each scheduler iteration.
    #[serde(default = "default_schedule_grace")]
    pub schedule_grace: u64,
    /// Schedule without executing stage commands.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_schedule_grace() -> u64 {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cpus: Vec::new(),
            schedule_grace: default_schedule_grace(),
            dry_run: false,
        }
    }
}

/// Parse a CPU-set expression into a list of core ids.
///
/// Accepts a comma-separated mix of single ids and `a-b` ranges. Ranges
/// are end-exclusive: the conventional default set `1-<ncpu>` leaves
/// core 0 to the OS and stops short of the core count.
pub fn parse_cpu_sets(cpu_sets: &str) -> Result<Vec<usize>, SweepError> {
    let mut cpus = Vec::new();

    for part in cpu_sets.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(SweepError::CpuSet(cpu_sets.to_string()));
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .map_err(|_| SweepError::CpuSet(cpu_sets.to_string()))?;
            let end: usize = end
                .trim()
                .parse()
                .map_err(|_| SweepError::CpuSet(cpu_sets.to_string()))?;
            if end <= start {
                return Err(SweepError::CpuSet(cpu_sets.to_string()));
            }
            cpus.extend(start..end);
        } else {
            let id: usize = part
                .parse()
                .map_err(|_| SweepError::CpuSet(cpu_sets.to_string()))?;
            cpus.push(id);
        }
    }

    Ok(cpus)
}
