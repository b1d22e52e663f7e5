use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

/// A unit of deferred work submitted across the executor boundary.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where deferred work runs.
///
/// `subscribe_on`/`observe_on` accept anything that can run a
/// zero-argument task. Signal order is preserved only when the executor
/// runs tasks in the order they were submitted (a single queue).
pub trait Executor: Send + Sync {
  fn execute(&self, task: Task);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
  #[inline]
  fn execute(&self, task: Task) { (**self).execute(task) }
}

/// Runs every task immediately on the calling thread.
#[derive(Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
  fn execute(&self, task: Task) { task() }
}

/// Queueing executor driven by hand; clones share one queue. A
/// deterministic stand-in for a thread pool in tests.
#[derive(Clone, Default)]
pub struct ManualExecutor {
  queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualExecutor {
  pub fn new() -> Self { Self::default() }

  pub fn pending(&self) -> usize { self.queue.lock().unwrap().len() }

  /// Runs one queued task. Returns whether one ran.
  pub fn run_one(&self) -> bool {
    let task = self.queue.lock().unwrap().pop_front();
    match task {
      Some(task) => {
        task();
        true
      }
      None => false,
    }
  }

  /// Runs queued tasks, including any they enqueue, until the queue is
  /// empty. Returns how many ran.
  pub fn run(&self) -> usize {
    let mut ran = 0;
    while self.run_one() {
      ran += 1;
    }
    ran
  }
}

impl Executor for ManualExecutor {
  fn execute(&self, task: Task) {
    self.queue.lock().unwrap().push_back(task);
  }
}

#[cfg(feature = "futures-executor")]
impl Executor for futures::executor::ThreadPool {
  fn execute(&self, task: Task) {
    self.spawn_ok(async move { task() });
  }
}
