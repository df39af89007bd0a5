//! End-to-end sweep: parse a job document, enumerate its tasks, and
//! schedule every stage through the dry runner.

use std::sync::Arc;

use sweepbench_core::RuntimeConfig;
use sweepbench_job::{Job, JobSpec};
use sweepbench_run::DryRunFactory;
use sweepbench_sched::Scheduler;

const JOB_DOC: &str = r#"
params:
  - name: threads
    type: integer
    min: 1
    max: 4
    step: 1
  - name: variant
    type: string
    only: [baseline, tuned]
inputs:
  - name: corpus
    path: /data/corpus
outputs:
  - name: results
    path: /data/out
runs:
  - name: warmup
    image: ubuntu:20.04
    cores: 1
    cmd: ./warmup.sh
  - name: bench
    image: ubuntu:20.04
    cores: 2
    cmd: ./bench.sh
"#;

fn runtime(pool: usize) -> RuntimeConfig {
    RuntimeConfig {
        cpus: (0..pool).collect(),
        schedule_grace: 0,
        dry_run: true,
    }
}

#[test]
fn full_sweep_drains_every_task() {
    let spec: JobSpec = serde_yaml::from_str(JOB_DOC).unwrap();
    let job = Job::from_spec(spec, &runtime(3)).unwrap();

    // 4 thread counts x 2 variants
    assert_eq!(job.tasks.len(), 8);

    let mut scheduler = Scheduler::new(job.tasks, &runtime(3), Arc::new(DryRunFactory));
    scheduler.run();

    let metrics = scheduler.metrics();
    assert_eq!(metrics.stages_succeeded["warmup"], 8);
    assert_eq!(metrics.stages_succeeded["bench"], 8);
    assert!(metrics.stages_failed.is_empty());
    assert_eq!(scheduler.core_map().free_cores(), vec![0, 1, 2]);
}

#[test]
fn enumeration_is_reproducible_across_loads() {
    let spec_a: JobSpec = serde_yaml::from_str(JOB_DOC).unwrap();
    let spec_b: JobSpec = serde_yaml::from_str(JOB_DOC).unwrap();

    let job_a = Job::from_spec(spec_a, &runtime(3)).unwrap();
    let job_b = Job::from_spec(spec_b, &runtime(3)).unwrap();

    let uuids_a: Vec<&str> = job_a.tasks.iter().map(|t| t.uuid()).collect();
    let uuids_b: Vec<&str> = job_b.tasks.iter().map(|t| t.uuid()).collect();
    assert_eq!(uuids_a, uuids_b);
}
