use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use sweepbench_core::SweepError;

use crate::active_run::ActiveRun;

/// Shared map from physical core id to the run currently pinned there.
///
/// Keys are fixed at construction to the configured pool; a vacant core
/// holds `None`. All mutation goes through the write lock; multi-entry
/// scans (the exclusion check) take one read lock so they see a
/// consistent snapshot.
#[derive(Debug)]
pub struct CoreMap {
    cores: RwLock<BTreeMap<usize, Option<Arc<ActiveRun>>>>,
}

impl CoreMap {
    /// Build the map with every configured core vacant.
    pub fn new(cpus: &[usize]) -> Self {
        Self {
            cores: RwLock::new(cpus.iter().map(|&id| (id, None)).collect()),
        }
    }

    /// Number of configured cores.
    pub fn len(&self) -> usize {
        self.cores.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.read().unwrap().is_empty()
    }

    /// Snapshot of the vacant core ids, in ascending order.
    pub fn free_cores(&self) -> Vec<usize> {
        self.cores
            .read()
            .unwrap()
            .iter()
            .filter(|(_, slot)| slot.is_none())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Snapshot of the currently active runs, one entry per occupied
    /// core (a run holding several cores appears once per core).
    pub fn active(&self) -> Vec<Arc<ActiveRun>> {
        self.cores
            .read()
            .unwrap()
            .values()
            .filter_map(|slot| slot.clone())
            .collect()
    }

    /// Whether any occupied core belongs to a run of the given task.
    /// Scans under a single read lock, so the answer reflects one
    /// consistent instant.
    pub fn has_active_run_for(&self, task_uuid: &str) -> bool {
        self.cores
            .read()
            .unwrap()
            .values()
            .flatten()
            .any(|run| run.task().uuid() == task_uuid)
    }

    /// Pin `run` to `core_id`. Fails if the id is outside the configured
    /// pool or the core is already occupied.
    pub fn set(&self, core_id: usize, run: Arc<ActiveRun>) -> Result<(), SweepError> {
        let mut cores = self.cores.write().unwrap();
        match cores.get_mut(&core_id) {
            None => Err(SweepError::UnknownCore(core_id)),
            Some(Some(_)) => Err(SweepError::CoreOccupied(core_id)),
            Some(slot) => {
                *slot = Some(run);
                Ok(())
            }
        }
    }

    /// Mark a core vacant. Idempotent; unknown ids are ignored.
    pub fn unset(&self, core_id: usize) {
        if let Some(slot) = self.cores.write().unwrap().get_mut(&core_id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sweepbench_job::{ParamType, ParamValue, Stage, Task};

    fn run_for(value: &str, cores: Vec<usize>) -> Arc<ActiveRun> {
        let task = Arc::new(Task::new(
            vec![ParamValue::new("x", ParamType::String, value)],
            Arc::from([]),
            Arc::from([]),
            &[],
        ));
        let stage = Stage {
            name: "bench".into(),
            image: "ubuntu".into(),
            cores: cores.len(),
            devices: Vec::new(),
            cmd: String::new(),
            path: String::new(),
        };
        Arc::new(ActiveRun::new(task, stage, cores))
    }

    #[test]
    fn starts_fully_vacant() {
        let map = CoreMap::new(&[0, 2, 4]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.free_cores(), vec![0, 2, 4]);
        assert!(map.active().is_empty());
    }

    #[test]
    fn set_occupies_and_unset_vacates() {
        let map = CoreMap::new(&[0, 1]);
        let run = run_for("a", vec![1]);

        map.set(1, Arc::clone(&run)).unwrap();
        assert_eq!(map.free_cores(), vec![0]);
        assert_eq!(map.active().len(), 1);

        map.unset(1);
        assert_eq!(map.free_cores(), vec![0, 1]);
        assert!(map.active().is_empty());
    }

    #[test]
    fn set_rejects_unknown_core() {
        let map = CoreMap::new(&[0]);
        let err = map.set(7, run_for("a", vec![7])).unwrap_err();
        assert!(matches!(err, SweepError::UnknownCore(7)));
    }

    #[test]
    fn set_rejects_occupied_core() {
        let map = CoreMap::new(&[0]);
        map.set(0, run_for("a", vec![0])).unwrap();
        let err = map.set(0, run_for("b", vec![0])).unwrap_err();
        assert!(matches!(err, SweepError::CoreOccupied(0)));
    }

    #[test]
    fn unset_is_idempotent() {
        let map = CoreMap::new(&[0]);
        map.unset(0);
        map.unset(0);
        map.unset(42);
        assert_eq!(map.free_cores(), vec![0]);
    }

    #[test]
    fn exclusion_scan_finds_the_owning_task() {
        let map = CoreMap::new(&[0, 1]);
        let run = run_for("a", vec![0]);
        let uuid = run.task().uuid().to_string();

        map.set(0, Arc::clone(&run)).unwrap();
        assert!(map.has_active_run_for(&uuid));
        assert!(!map.has_active_run_for(run_for("b", vec![1]).task().uuid()));

        map.unset(0);
        assert!(!map.has_active_run_for(&uuid));
    }

    #[test]
    fn free_cores_stay_sorted() {
        let map = CoreMap::new(&[5, 1, 3]);
        assert_eq!(map.free_cores(), vec![1, 3, 5]);
    }
}
