use std::sync::Arc;

use sweepbench_job::Task;

/// Ordered collection of tasks awaiting further dispatch.
///
/// Index semantics are position-based: removal shifts subsequent tasks
/// left by one. Only the scheduler driver mutates it.
#[derive(Debug, Default)]
pub struct WaitList {
    tasks: Vec<Arc<Task>>,
}

impl WaitList {
    pub fn new(tasks: Vec<Arc<Task>>) -> Self {
        Self { tasks }
    }

    pub fn add(&mut self, task: Arc<Task>) {
        self.tasks.push(task);
    }

    /// Task at position `i`, if the list still reaches that far.
    pub fn get(&self, i: usize) -> Option<Arc<Task>> {
        self.tasks.get(i).cloned()
    }

    /// Remove and return the task at position `i`.
    pub fn remove(&mut self, i: usize) -> Option<Arc<Task>> {
        if i < self.tasks.len() {
            Some(self.tasks.remove(i))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
