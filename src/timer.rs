use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
  thread,
  time::Duration,
};

use crate::executor::Task;

/// Handle to a scheduled deadline. Cancelling is idempotent and
/// best-effort: a deadline observed cancelled never runs its task.
#[derive(Clone, Default)]
pub struct TimerHandle {
  cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.cancelled.store(true, Ordering::SeqCst) }

  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::SeqCst) }
}

/// Deadline scheduling boundary used by the timeout operator.
pub trait Timer: Send + Sync {
  /// Runs `task` once `delay` elapses, unless the returned handle is
  /// cancelled first.
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
    (**self).schedule(delay, task)
  }
}

/// Spawns a sleeping thread per deadline.
#[derive(Clone, Copy, Default)]
pub struct ThreadTimer;

impl Timer for ThreadTimer {
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
    let handle = TimerHandle::new();
    let armed = handle.clone();
    thread::spawn(move || {
      thread::sleep(delay);
      if !armed.is_cancelled() {
        task()
      }
    });
    handle
  }
}

/// Virtual-clock timer driven by [`advance`](Self::advance); clones share
/// one clock.
#[derive(Clone, Default)]
pub struct ManualTimer {
  inner: Arc<Mutex<ManualTimerInner>>,
}

#[derive(Default)]
struct ManualTimerInner {
  now: Duration,
  deadlines: Vec<(Duration, TimerHandle, Task)>,
}

impl ManualTimer {
  pub fn new() -> Self { Self::default() }

  /// Moves the clock forward and fires every due, uncancelled deadline in
  /// due order. Tasks run outside the clock lock.
  pub fn advance(&self, by: Duration) {
    let mut due = {
      let mut inner = self.inner.lock().unwrap();
      inner.now += by;
      let now = inner.now;
      let mut due = Vec::new();
      let mut later = Vec::new();
      for entry in inner.deadlines.drain(..) {
        if entry.0 <= now {
          due.push(entry);
        } else {
          later.push(entry);
        }
      }
      inner.deadlines = later;
      due
    };
    due.sort_by_key(|entry| entry.0);
    for (_, handle, task) in due {
      if !handle.is_cancelled() {
        task()
      }
    }
  }

  pub fn pending(&self) -> usize {
    self.inner.lock().unwrap().deadlines.len()
  }
}

impl Timer for ManualTimer {
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
    let handle = TimerHandle::new();
    let mut inner = self.inner.lock().unwrap();
    let due = inner.now + delay;
    inner.deadlines.push((due, handle.clone(), task));
    handle
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn manual_timer_fires_in_due_order() {
    let timer = ManualTimer::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for (label, delay) in [(2, 20), (1, 10), (3, 30)] {
      let order = order.clone();
      timer.schedule(
        Duration::from_millis(delay),
        Box::new(move || order.lock().unwrap().push(label)),
      );
    }
    timer.advance(Duration::from_millis(25));
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    assert_eq!(timer.pending(), 1);
    timer.advance(Duration::from_millis(10));
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn cancelled_deadline_never_fires() {
    let timer = ManualTimer::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let handle = timer.schedule(
      Duration::from_millis(5),
      Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
    );
    handle.cancel();
    timer.advance(Duration::from_millis(10));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn thread_timer_fires() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    ThreadTimer.schedule(
      Duration::from_millis(5),
      Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
    );
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while fired.load(Ordering::SeqCst) == 0
      && std::time::Instant::now() < deadline
    {
      thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }
}
