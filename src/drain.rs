use std::sync::atomic::{AtomicI64, Ordering};

/// Single-owner work loop guard.
///
/// Callers race to run a drain pass: the one that moves the pass counter
/// off zero owns the loop and keeps draining while other callers record
/// additional passes and return immediately, trusting the owner to observe
/// their contribution before it exits.
#[derive(Default)]
pub(crate) struct DrainLoop(AtomicI64);

impl DrainLoop {
  pub fn new() -> Self { DrainLoop(AtomicI64::new(0)) }

  /// Runs `pass` now if this caller wins ownership; otherwise records one
  /// more pass for the current owner and returns.
  pub fn run(&self, mut pass: impl FnMut()) {
    if self.0.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    loop {
      pass();
      if self.0.fetch_sub(1, Ordering::AcqRel) == 1 {
        return;
      }
    }
  }

  /// Records an extra pass. Only meaningful from inside the closure given
  /// to [`run`](Self::run), where an owner is guaranteed to observe it.
  pub fn reschedule(&self) { self.0.fetch_add(1, Ordering::AcqRel); }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn runs_the_pass_once() {
    let drain = DrainLoop::new();
    let runs = Cell::new(0);
    drain.run(|| runs.set(runs.get() + 1));
    assert_eq!(runs.get(), 1);
  }

  #[test]
  fn reentrant_run_is_deferred_to_the_owner() {
    let drain = DrainLoop::new();
    let runs = Cell::new(0);
    drain.run(|| {
      let run = runs.get() + 1;
      runs.set(run);
      if run == 1 {
        // A second entry while the owner runs must not recurse; the owner
        // picks it up as another pass.
        drain.run(|| unreachable!("losing caller must not run the pass"));
      }
    });
    assert_eq!(runs.get(), 2);
  }

  #[test]
  fn reschedule_queues_another_pass() {
    let drain = DrainLoop::new();
    let runs = Cell::new(0);
    drain.run(|| {
      let run = runs.get() + 1;
      runs.set(run);
      if run == 1 {
        drain.reschedule();
      }
    });
    assert_eq!(runs.get(), 2);
  }
}
