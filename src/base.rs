use std::sync::{Arc, Mutex};

use crate::{
  error::FlowError, subscriber::Subscriber, subscription::Subscription,
};

enum Lifecycle {
  Unsubscribed,
  Active(Arc<dyn Subscription>),
  Terminated,
}

/// Lifecycle cell every protocol participant embeds:
/// `Unsubscribed -> Active -> Terminated`, with exactly one caller winning
/// the transition into `Terminated`.
pub struct SubscriberState(Mutex<Lifecycle>);

impl SubscriberState {
  pub fn new() -> Self { SubscriberState(Mutex::new(Lifecycle::Unsubscribed)) }

  /// `Unsubscribed -> Active`. False if the state already advanced, which
  /// makes a duplicate `on_subscribe` observable to the caller.
  pub(crate) fn activate(&self, subscription: Arc<dyn Subscription>) -> bool {
    let mut state = self.0.lock().unwrap();
    match *state {
      Lifecycle::Unsubscribed => {
        *state = Lifecycle::Active(subscription);
        true
      }
      _ => false,
    }
  }

  /// Clones the active upstream subscription, if any.
  pub(crate) fn get(&self) -> Option<Arc<dyn Subscription>> {
    match &*self.0.lock().unwrap() {
      Lifecycle::Active(subscription) => Some(subscription.clone()),
      _ => None,
    }
  }

  /// `-> Terminated`. Returns the upstream handle only to the caller that
  /// won the transition from `Active`; a cancel racing a terminal signal
  /// leaves exactly one winner.
  pub(crate) fn terminate(&self) -> Option<Arc<dyn Subscription>> {
    let mut state = self.0.lock().unwrap();
    match std::mem::replace(&mut *state, Lifecycle::Terminated) {
      Lifecycle::Active(subscription) => Some(subscription),
      _ => None,
    }
  }

  pub fn is_active(&self) -> bool {
    matches!(&*self.0.lock().unwrap(), Lifecycle::Active(_))
  }

  pub fn is_terminated(&self) -> bool {
    matches!(&*self.0.lock().unwrap(), Lifecycle::Terminated)
  }
}

impl Default for SubscriberState {
  fn default() -> Self { Self::new() }
}

/// Reusable subscriber state machine.
///
/// Implementors supply the `*_impl` hooks and a [`SubscriberState`]; the
/// blanket [`Subscriber`] impl layers the protocol on top: `on_subscribe`
/// is accepted once, `on_next` only while active, and exactly one of
/// complete/error/cancel runs its side effects no matter how the calls
/// race across threads.
pub trait BaseSubscriber: Send + Sync {
  type Item;

  fn state(&self) -> &SubscriberState;

  fn on_subscribe_impl(&self) {}
  fn on_next_impl(&self, item: Self::Item);
  fn on_complete_impl(&self) {}
  fn on_error_impl(&self, error: FlowError) { let _ = error; }
  /// Runs after whichever terminal transition won, exactly once.
  fn on_terminate_impl(&self) {}

  /// Asks the upstream for `n` more items; a no-op before `on_subscribe`
  /// and after termination.
  fn request(&self, n: i64) {
    if let Some(upstream) = self.state().get() {
      upstream.request(n);
    }
  }

  /// Cancels the upstream. Idempotent; only the winning call cancels the
  /// upstream and runs the terminate hook.
  fn cancel(&self) {
    if let Some(upstream) = self.state().terminate() {
      upstream.cancel();
      self.on_terminate_impl();
    }
  }
}

impl<S: BaseSubscriber> Subscriber for S {
  type Item = S::Item;

  fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
    if self.state().activate(subscription.clone()) {
      self.on_subscribe_impl();
    } else {
      debug_assert!(false, "on_subscribe delivered twice");
      tracing::error!(
        "duplicate on_subscribe; cancelling the offered subscription"
      );
      subscription.cancel();
    }
  }

  fn on_next(&self, item: Self::Item) {
    if self.state().is_active() {
      self.on_next_impl(item);
    }
  }

  fn on_complete(&self) {
    if self.state().terminate().is_some() {
      self.on_complete_impl();
      self.on_terminate_impl();
    }
  }

  fn on_error(&self, error: FlowError) {
    if self.state().terminate().is_some() {
      self.on_error_impl(error);
      self.on_terminate_impl();
    } else {
      tracing::debug!("late on_error ignored: {error}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription;
  use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

  #[derive(Default)]
  struct Probe {
    state: SubscriberState,
    next: AtomicU32,
    completes: AtomicU32,
    errors: AtomicU32,
    terminates: AtomicU32,
  }

  impl BaseSubscriber for Probe {
    type Item = i32;

    fn state(&self) -> &SubscriberState { &self.state }

    fn on_next_impl(&self, _item: i32) {
      self.next.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete_impl(&self) {
      self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error_impl(&self, _error: FlowError) {
      self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_terminate_impl(&self) {
      self.terminates.fetch_add(1, Ordering::SeqCst);
    }
  }

  struct CountingSubscription {
    requested: AtomicI64,
    cancels: AtomicU32,
  }

  impl CountingSubscription {
    fn new() -> Arc<Self> {
      Arc::new(CountingSubscription {
        requested: AtomicI64::new(0),
        cancels: AtomicU32::new(0),
      })
    }
  }

  impl Subscription for CountingSubscription {
    fn request(&self, n: i64) {
      self.requested.fetch_add(n, Ordering::SeqCst);
    }

    fn cancel(&self) {
      self.cancels.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[test]
  fn no_signals_before_on_subscribe() {
    let probe = Probe::default();
    probe.on_next(1);
    assert_eq!(probe.next.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn exactly_one_terminal_between_complete_and_error() {
    let probe = Probe::default();
    probe.on_subscribe(subscription::noop());
    probe.on_complete();
    probe.on_error(FlowError::message("late"));
    probe.on_complete();
    assert_eq!(probe.completes.load(Ordering::SeqCst), 1);
    assert_eq!(probe.errors.load(Ordering::SeqCst), 0);
    assert_eq!(probe.terminates.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn cancel_is_idempotent_and_wins_once() {
    let probe = Probe::default();
    let upstream = CountingSubscription::new();
    probe.on_subscribe(upstream.clone());
    probe.cancel();
    probe.cancel();
    assert_eq!(upstream.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(probe.terminates.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn request_after_cancel_is_noop() {
    let probe = Probe::default();
    let upstream = CountingSubscription::new();
    probe.on_subscribe(upstream.clone());
    probe.cancel();
    probe.request(10);
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn no_next_after_terminal() {
    let probe = Probe::default();
    probe.on_subscribe(subscription::noop());
    probe.on_next(1);
    probe.on_complete();
    probe.on_next(2);
    assert_eq!(probe.next.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn racing_terminals_have_one_winner() {
    for _ in 0..100 {
      let probe = Arc::new(Probe::default());
      let upstream = CountingSubscription::new();
      probe.on_subscribe(upstream.clone());

      let threads: Vec<_> = (0..3)
        .map(|kind| {
          let probe = probe.clone();
          std::thread::spawn(move || match kind {
            0 => probe.on_complete(),
            1 => probe.on_error(FlowError::message("race")),
            _ => BaseSubscriber::cancel(&*probe),
          })
        })
        .collect();
      for thread in threads {
        thread.join().unwrap();
      }

      let completes = probe.completes.load(Ordering::SeqCst);
      let errors = probe.errors.load(Ordering::SeqCst);
      let cancels = upstream.cancels.load(Ordering::SeqCst);
      assert_eq!(completes + errors + cancels, 1);
      assert_eq!(probe.terminates.load(Ordering::SeqCst), 1);
    }
  }
}
