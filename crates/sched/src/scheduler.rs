use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use sweepbench_core::{RuntimeConfig, SweepError};
use sweepbench_job::{Stage, Task};
use sweepbench_run::{RunnerConfig, RunnerError, RunnerFactory};

use crate::active_run::ActiveRun;
use crate::core_map::CoreMap;
use crate::metrics::SweepMetrics;
use crate::wait_list::WaitList;

/// The core-aware scheduler. A single driver thread walks the wait list
/// and dispatches each task's next stage onto free cores; one supervisor
/// thread oversees each dispatched run.
///
/// The driver is the only writer of the wait list and the stage queues.
/// Supervisors touch shared state through the core map's lock and, on
/// failure, through `Task::cancel` (safe against the driver's drain
/// check: the queue serializes internally).
pub struct Scheduler {
    grace: Duration,
    core_map: Arc<CoreMap>,
    wait_list: WaitList,
    factory: Arc<dyn RunnerFactory>,
    metrics: Arc<RwLock<SweepMetrics>>,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler over the given tasks and core pool.
    pub fn new(
        tasks: Vec<Arc<Task>>,
        cfg: &RuntimeConfig,
        factory: Arc<dyn RunnerFactory>,
    ) -> Self {
        Self {
            grace: Duration::from_secs(cfg.schedule_grace),
            core_map: Arc::new(CoreMap::new(&cfg.cpus)),
            wait_list: WaitList::new(tasks),
            factory,
            metrics: Arc::new(RwLock::new(SweepMetrics::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for external shutdown signaling (e.g. a SIGINT handler).
    /// Setting the flag cancels every pending task; stages already
    /// executing run to completion.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Snapshot of the current metrics.
    pub fn metrics(&self) -> SweepMetrics {
        self.metrics.read().unwrap().clone()
    }

    /// Handle to the shared core map.
    pub fn core_map(&self) -> Arc<CoreMap> {
        Arc::clone(&self.core_map)
    }

    /// Run the scheduling loop to completion. Blocks until every task
    /// has drained and every supervisor has finished.
    pub fn run(&mut self) {
        info!(
            tasks = self.wait_list.len(),
            cores = self.core_map.len(),
            "scheduler starting"
        );

        let mut supervisors: Vec<JoinHandle<()>> = Vec::new();
        let mut i: usize = 0;

        while !self.wait_list.is_empty() {
            if self.shutdown.load(Ordering::Relaxed) {
                self.drain_on_shutdown();
                break;
            }

            // Nothing to place a run on; let supervisors make progress.
            let free = self.core_map.free_cores();
            if free.is_empty() {
                self.pause();
                continue;
            }

            let Some(task) = self.wait_list.get(i) else {
                warn!(cursor = i, "wait list shrank beneath cursor");
                i = 0;
                continue;
            };

            if let Some(stage) = task.stages().peek() {
                let fits = free.len() >= stage.cores;
                if fits && !self.core_map.has_active_run_for(task.uuid()) {
                    self.dispatch(&task, stage, free, &mut supervisors);
                }
            }

            self.pause();

            // Drained tasks (completed or cancelled) leave the list.
            let removed = task.stages().is_empty() && self.wait_list.remove(i).is_some();
            if removed {
                if i >= self.wait_list.len() {
                    i = 0;
                }
            } else if self.wait_list.len() == i + 1 {
                i = 0;
            } else {
                i += 1;
            }
        }

        info!(
            supervisors = supervisors.len(),
            "wait list drained; waiting for active runs"
        );
        for handle in supervisors {
            let _ = handle.join();
        }

        info!("scheduler stopped");
    }

    /// Hand the task's next stage to a supervisor on cores taken from
    /// the tail of the free snapshot.
    fn dispatch(
        &self,
        task: &Arc<Task>,
        stage: Stage,
        mut free: Vec<usize>,
        supervisors: &mut Vec<JoinHandle<()>>,
    ) {
        let cores = free.split_off(free.len() - stage.cores);
        let run = Arc::new(ActiveRun::new(Arc::clone(task), stage, cores));

        info!(
            task = %task.uuid(),
            stage = %run.stage().name,
            cores = ?run.core_ids(),
            "scheduling run"
        );

        // Peek-then-dequeue is safe: this driver is the queue's only
        // consumer.
        task.stages().dequeue();

        if let Err(e) = self.claim_cores(&run) {
            error!(task = %task.uuid(), error = %e, "could not allocate cores for run");
            task.cancel();
            return;
        }

        if let Ok(mut m) = self.metrics.write() {
            m.record_dispatch(&run.stage().name);
        }

        supervisors.push(self.spawn_supervisor(run));
    }

    /// Claim every selected core in one bounded pass. A claim failure
    /// releases the cores already taken and fails the dispatch.
    fn claim_cores(&self, run: &Arc<ActiveRun>) -> Result<(), SweepError> {
        let mut claimed: Vec<usize> = Vec::with_capacity(run.core_ids().len());

        for &core_id in run.core_ids() {
            if let Err(e) = self.core_map.set(core_id, Arc::clone(run)) {
                warn!(core = core_id, error = %e, "could not claim core");
                for &id in &claimed {
                    self.core_map.unset(id);
                }
                return Err(SweepError::CoreAllocation {
                    stage: run.stage().name.clone(),
                    requested: run.core_ids().len(),
                });
            }
            claimed.push(core_id);
        }

        Ok(())
    }

    /// Oversee one run on its own thread: drive the runner's lifecycle,
    /// cancel the task's remaining stages on failure, and always release
    /// the claimed cores.
    fn spawn_supervisor(&self, run: Arc<ActiveRun>) -> JoinHandle<()> {
        let core_map = Arc::clone(&self.core_map);
        let metrics = Arc::clone(&self.metrics);
        let factory = Arc::clone(&self.factory);

        thread::spawn(move || {
            let started = Instant::now();

            match drive_runner(factory.as_ref(), &run) {
                Ok(0) => {
                    info!(run = %run.label(), "run finished");
                    if let Ok(mut m) = metrics.write() {
                        m.record_success(&run.stage().name, started.elapsed());
                    }
                }
                Ok(code) => {
                    error!(run = %run.label(), code, "run exited with non-zero code");
                    run.task().cancel();
                    if let Ok(mut m) = metrics.write() {
                        m.record_failure(&run.stage().name);
                    }
                }
                Err(e) => {
                    error!(run = %run.label(), error = %e, "could not complete run");
                    run.task().cancel();
                    if let Ok(mut m) = metrics.write() {
                        m.record_failure(&run.stage().name);
                    }
                }
            }

            for &core_id in run.core_ids() {
                core_map.unset(core_id);
            }
        })
    }

    /// End-of-iteration grace. A zero grace still yields the driver so
    /// supervisors are never starved.
    fn pause(&self) {
        if self.grace.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.grace);
        }
    }

    /// Cancel everything still pending so the loop can exit. Stages
    /// already executing run to completion and release their cores.
    fn drain_on_shutdown(&mut self) {
        warn!(
            pending = self.wait_list.len(),
            "shutdown requested; cancelling pending tasks"
        );
        while let Some(task) = self.wait_list.remove(0) {
            task.stages().clear();
        }
    }
}

/// One full `init → start → wait → destroy` cycle. `destroy` runs even
/// when `wait` fails.
fn drive_runner(factory: &dyn RunnerFactory, run: &ActiveRun) -> Result<i32, RunnerError> {
    let stage = run.stage();
    let mut runner = factory.provision(RunnerConfig {
        label: run.label().to_string(),
        task: run.task().uuid().to_string(),
        image: stage.image.clone(),
        cmd: stage.cmd.clone(),
        path: stage.path.clone(),
        devices: stage.devices.clone(),
        core_ids: run.core_ids().to_vec(),
    })?;

    runner.init()?;
    runner.start()?;
    let waited = runner.wait();
    let destroyed = runner.destroy();

    let code = waited?;
    destroyed?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    use sweepbench_job::{Job, JobSpec, ParamSpec, ParamType, StepMode};
    use sweepbench_run::Runner;

    fn stage(name: &str, cores: usize) -> Stage {
        Stage {
            name: name.into(),
            image: "ubuntu".into(),
            cores,
            devices: Vec::new(),
            cmd: String::new(),
            path: String::new(),
        }
    }

    fn variant_param(values: &[&str]) -> ParamSpec {
        ParamSpec {
            name: "variant".into(),
            ty: ParamType::String,
            default: None,
            only: values.iter().map(|s| s.to_string()).collect(),
            min: None,
            max: None,
            step: None,
            step_mode: StepMode::default(),
        }
    }

    fn job(params: Vec<ParamSpec>, runs: Vec<Stage>, pool: usize) -> Job {
        let cfg = RuntimeConfig {
            cpus: (0..pool).collect(),
            schedule_grace: 0,
            dry_run: false,
        };
        Job::from_spec(
            JobSpec {
                params,
                inputs: Vec::new(),
                outputs: Vec::new(),
                runs,
            },
            &cfg,
        )
        .unwrap()
    }

    fn config(pool: usize) -> RuntimeConfig {
        RuntimeConfig {
            cpus: (0..pool).collect(),
            schedule_grace: 0,
            dry_run: false,
        }
    }

    /// Shared journal the mock runners write into.
    #[derive(Default)]
    struct RunJournal {
        /// (task uuid, stage name, core ids) per executed run.
        events: Mutex<Vec<(String, String, Vec<usize>)>>,
        /// Concurrently executing runs per task uuid.
        active: Mutex<HashMap<String, usize>>,
        /// Set if two runs of one task ever overlapped.
        overlap: AtomicBool,
    }

    impl RunJournal {
        fn events(&self) -> Vec<(String, String, Vec<usize>)> {
            self.events.lock().unwrap().clone()
        }

        fn stages_for(&self, uuid: &str) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|(t, _, _)| t == uuid)
                .map(|(_, s, _)| s)
                .collect()
        }
    }

    /// Scripted runner: sleeps briefly inside `wait`, then reports the
    /// exit code the factory chose for its task.
    struct MockRunner {
        config: RunnerConfig,
        journal: Arc<RunJournal>,
        exit_code: i32,
        delay: Duration,
    }

    impl Runner for MockRunner {
        fn init(&mut self) -> Result<(), RunnerError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), RunnerError> {
            Ok(())
        }

        fn wait(&mut self) -> Result<i32, RunnerError> {
            {
                let mut active = self.journal.active.lock().unwrap();
                let slot = active.entry(self.config.task.clone()).or_default();
                *slot += 1;
                if *slot > 1 {
                    self.journal.overlap.store(true, Ordering::SeqCst);
                }
            }

            thread::sleep(self.delay);

            self.journal.events.lock().unwrap().push((
                self.config.task.clone(),
                self.config.label
                    .strip_prefix(&format!("{}-", self.config.task))
                    .unwrap_or(&self.config.label)
                    .to_string(),
                self.config.core_ids.clone(),
            ));

            *self
                .journal
                .active
                .lock()
                .unwrap()
                .get_mut(&self.config.task)
                .unwrap() -= 1;

            Ok(self.exit_code)
        }

        fn destroy(&mut self) -> Result<(), RunnerError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockFactory {
        journal: Arc<RunJournal>,
        /// (task uuid, stage name) pairs that exit 1.
        fail: HashSet<(String, String)>,
        /// Task uuids whose provisioning fails outright.
        refuse: HashSet<String>,
        delay: Duration,
    }

    impl RunnerFactory for MockFactory {
        fn provision(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError> {
            if self.refuse.contains(&config.task) {
                return Err(RunnerError::Failed("refused by test".into()));
            }
            let stage = config
                .label
                .strip_prefix(&format!("{}-", config.task))
                .unwrap_or(&config.label)
                .to_string();
            let exit_code = i32::from(self.fail.contains(&(config.task.clone(), stage)));
            Ok(Box::new(MockRunner {
                config,
                journal: Arc::clone(&self.journal),
                exit_code,
                delay: self.delay,
            }))
        }
    }

    #[test]
    fn single_task_single_stage_runs_on_the_only_core() {
        let job = job(Vec::new(), vec![stage("bench", 1)], 1);
        let journal = Arc::new(RunJournal::default());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(1), factory);
        scheduler.run();

        let events = journal.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, "bench");
        assert_eq!(events[0].2, vec![0]);

        let metrics = scheduler.metrics();
        assert_eq!(metrics.stages_dispatched["bench"], 1);
        assert_eq!(metrics.stages_succeeded["bench"], 1);
        assert_eq!(scheduler.core_map().free_cores(), vec![0]);
    }

    #[test]
    fn stages_run_in_declared_order_without_same_task_overlap() {
        let job = job(
            vec![variant_param(&["a", "b"])],
            vec![stage("first", 1), stage("second", 1)],
            2,
        );
        let uuids: Vec<String> = job.tasks.iter().map(|t| t.uuid().to_string()).collect();

        let journal = Arc::new(RunJournal::default());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            delay: Duration::from_millis(20),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(2), factory);
        scheduler.run();

        assert!(
            !journal.overlap.load(Ordering::SeqCst),
            "two runs of one task were active at once"
        );
        for uuid in &uuids {
            assert_eq!(journal.stages_for(uuid), vec!["first", "second"]);
        }
        assert_eq!(scheduler.core_map().free_cores(), vec![0, 1]);
    }

    #[test]
    fn multi_core_stage_takes_cores_from_the_snapshot_tail() {
        let job = job(Vec::new(), vec![stage("bench", 2)], 3);
        let journal = Arc::new(RunJournal::default());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(3), factory);
        scheduler.run();

        let events = journal.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].2, vec![1, 2]);
    }

    #[test]
    fn failing_stage_cancels_the_rest_of_its_task_only() {
        let job = job(
            vec![variant_param(&["a", "b"])],
            vec![stage("first", 1), stage("second", 1)],
            2,
        );
        let doomed = job.tasks[0].uuid().to_string();
        let healthy = job.tasks[1].uuid().to_string();

        let journal = Arc::new(RunJournal::default());
        let mut fail = HashSet::new();
        fail.insert((doomed.clone(), "first".to_string()));
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            fail,
            delay: Duration::from_millis(5),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(2), factory);
        scheduler.run();

        assert_eq!(journal.stages_for(&doomed), vec!["first"]);
        assert_eq!(journal.stages_for(&healthy), vec!["first", "second"]);

        let metrics = scheduler.metrics();
        assert_eq!(metrics.stages_failed["first"], 1);
        assert_eq!(metrics.tasks_cancelled, 1);
        assert_eq!(scheduler.core_map().free_cores(), vec![0, 1]);
    }

    #[test]
    fn provision_failure_is_dispatch_local() {
        let job = job(
            vec![variant_param(&["a", "b"])],
            vec![stage("bench", 1)],
            2,
        );
        let refused = job.tasks[0].uuid().to_string();
        let healthy = job.tasks[1].uuid().to_string();

        let journal = Arc::new(RunJournal::default());
        let mut refuse = HashSet::new();
        refuse.insert(refused.clone());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            refuse,
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(2), factory);
        scheduler.run();

        assert!(journal.stages_for(&refused).is_empty());
        assert_eq!(journal.stages_for(&healthy), vec!["bench"]);
        assert_eq!(scheduler.core_map().free_cores(), vec![0, 1]);
    }

    #[test]
    fn shutdown_flag_drains_without_dispatching() {
        let job = job(vec![variant_param(&["a", "b"])], vec![stage("bench", 1)], 1);
        let journal = Arc::new(RunJournal::default());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(1), factory);
        scheduler.shutdown_signal().store(true, Ordering::Relaxed);
        scheduler.run();

        assert!(journal.events().is_empty());
    }

    #[test]
    fn sweep_of_integer_range_completes_every_task() {
        let param = ParamSpec {
            name: "n".into(),
            ty: ParamType::Integer,
            default: None,
            only: Vec::new(),
            min: Some(0),
            max: Some(4),
            step: Some(2),
            step_mode: StepMode::Increment,
        };
        let job = job(vec![param], vec![stage("bench", 1)], 2);
        assert_eq!(job.tasks.len(), 3);

        let journal = Arc::new(RunJournal::default());
        let factory = Arc::new(MockFactory {
            journal: Arc::clone(&journal),
            delay: Duration::from_millis(5),
            ..MockFactory::default()
        });

        let mut scheduler = Scheduler::new(job.tasks, &config(2), factory);
        scheduler.run();

        assert_eq!(journal.events().len(), 3);
        let metrics = scheduler.metrics();
        assert_eq!(metrics.stages_succeeded["bench"], 3);
    }
}
