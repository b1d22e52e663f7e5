use std::{
  sync::{Arc, Condvar, Mutex},
  time::Duration,
};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  error::FlowError,
};

/// Recording consumer for tests and examples.
///
/// Collects every signal it receives and lets a test thread block until a
/// value count or the terminal signal arrives.
pub struct TestSubscriber<T> {
  state: SubscriberState,
  initial: i64,
  recorded: Mutex<Recorded<T>>,
  signal: Condvar,
}

struct Recorded<T> {
  values: Vec<T>,
  completions: u32,
  errors: Vec<FlowError>,
}

impl<T: Send + 'static> TestSubscriber<T> {
  /// A subscriber that requests everything up front.
  pub fn unbounded() -> Arc<Self> {
    Self::with_request(credits::NO_FLOW_CONTROL)
  }

  /// A subscriber that requests `initial` items at subscription time
  /// (zero to drive requests entirely by hand).
  pub fn with_request(initial: i64) -> Arc<Self> {
    Arc::new(TestSubscriber {
      state: SubscriberState::new(),
      initial,
      recorded: Mutex::new(Recorded {
        values: Vec::new(),
        completions: 0,
        errors: Vec::new(),
      }),
      signal: Condvar::new(),
    })
  }

  pub fn values(&self) -> Vec<T>
  where
    T: Clone,
  {
    self.recorded.lock().unwrap().values.clone()
  }

  pub fn value_count(&self) -> usize {
    self.recorded.lock().unwrap().values.len()
  }

  pub fn is_completed(&self) -> bool {
    self.recorded.lock().unwrap().completions > 0
  }

  pub fn error(&self) -> Option<FlowError> {
    self.recorded.lock().unwrap().errors.first().cloned()
  }

  /// Total terminal signals observed; the protocol allows at most one.
  pub fn terminal_count(&self) -> u32 {
    let recorded = self.recorded.lock().unwrap();
    recorded.completions + recorded.errors.len() as u32
  }

  pub fn is_terminated(&self) -> bool { self.terminal_count() > 0 }

  /// Blocks until a terminal signal arrives. Returns false on timeout.
  pub fn await_terminal(&self, timeout: Duration) -> bool {
    let recorded = self.recorded.lock().unwrap();
    let (_guard, result) = self
      .signal
      .wait_timeout_while(recorded, timeout, |recorded| {
        recorded.completions == 0 && recorded.errors.is_empty()
      })
      .unwrap();
    !result.timed_out()
  }

  /// Blocks until at least `count` values arrived. Returns false on
  /// timeout.
  pub fn await_count(&self, count: usize, timeout: Duration) -> bool {
    let recorded = self.recorded.lock().unwrap();
    let (_guard, result) = self
      .signal
      .wait_timeout_while(recorded, timeout, |recorded| {
        recorded.values.len() < count
      })
      .unwrap();
    !result.timed_out()
  }
}

impl<T: Send + 'static> BaseSubscriber for TestSubscriber<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { &self.state }

  fn on_subscribe_impl(&self) {
    if self.initial > 0 {
      self.request(self.initial);
    }
  }

  fn on_next_impl(&self, item: T) {
    self.recorded.lock().unwrap().values.push(item);
    self.signal.notify_all();
  }

  fn on_complete_impl(&self) {
    self.recorded.lock().unwrap().completions += 1;
    self.signal.notify_all();
  }

  fn on_error_impl(&self, error: FlowError) {
    self.recorded.lock().unwrap().errors.push(error);
    self.signal.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscriber::Subscriber;

  #[test]
  fn records_values_and_completion() {
    let consumer = TestSubscriber::unbounded();
    consumer.on_subscribe(crate::subscription::noop());
    consumer.on_next(1);
    consumer.on_next(2);
    consumer.on_complete();
    assert_eq!(consumer.values(), vec![1, 2]);
    assert!(consumer.is_completed());
    assert_eq!(consumer.terminal_count(), 1);
  }

  #[test]
  fn await_terminal_times_out_when_nothing_happens() {
    let consumer = TestSubscriber::<i32>::unbounded();
    assert!(!consumer.await_terminal(Duration::from_millis(10)));
  }

  #[test]
  fn await_count_wakes_on_delivery() {
    let consumer = TestSubscriber::unbounded();
    consumer.on_subscribe(crate::subscription::noop());
    let waiter = consumer.clone();
    let handle = std::thread::spawn(move || {
      waiter.await_count(2, Duration::from_secs(2))
    });
    consumer.on_next(1);
    consumer.on_next(2);
    assert!(handle.join().unwrap());
  }
}
