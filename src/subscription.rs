use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// Consumer-facing handle a producer hands out in `on_subscribe`.
///
/// Jointly owned: the producer keeps it to know how much it may emit, the
/// consumer keeps it to ask for more or stop.
pub trait Subscription: Send + Sync {
  /// Adds `n` to the outstanding credit. Values `<= 0` are ignored, never
  /// an error.
  fn request(&self, n: i64);

  /// Stops the stream. Idempotent and callable from any thread, including
  /// from inside a signal callback.
  fn cancel(&self);
}

struct NoopSubscription;

impl Subscription for NoopSubscription {
  fn request(&self, _n: i64) {}
  fn cancel(&self) {}
}

static NOOP: Lazy<Arc<NoopSubscription>> =
  Lazy::new(|| Arc::new(NoopSubscription));

/// The subscription handed to subscribers of sources that terminate during
/// `subscribe` (`empty`, `error`): every signal on it is ignored.
pub fn noop() -> Arc<dyn Subscription> {
  let subscription: Arc<dyn Subscription> = NOOP.clone();
  subscription
}

/// One-shot slot for the downstream half of an active stage.
///
/// `get` clones the current occupant; `take` empties the slot and hands the
/// occupant to exactly one caller. The losers of a racing terminal signal
/// observe `None` and perform no further action, which is the invariant the
/// whole pipeline's exactly-once termination rests on.
pub(crate) struct TerminalSlot<T: ?Sized>(Mutex<Option<Arc<T>>>);

impl<T: ?Sized> TerminalSlot<T> {
  pub fn new(value: Arc<T>) -> Self { TerminalSlot(Mutex::new(Some(value))) }

  pub fn get(&self) -> Option<Arc<T>> { self.0.lock().unwrap().clone() }

  pub fn take(&self) -> Option<Arc<T>> { self.0.lock().unwrap().take() }

  pub fn is_empty(&self) -> bool { self.0.lock().unwrap().is_none() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn noop_subscription_ignores_everything() {
    let subscription = noop();
    subscription.request(10);
    subscription.request(-1);
    subscription.cancel();
    subscription.cancel();
  }

  #[test]
  fn take_has_exactly_one_winner() {
    let slot = TerminalSlot::new(Arc::new(7));
    assert!(slot.get().is_some());
    assert!(slot.take().is_some());
    assert!(slot.take().is_none());
    assert!(slot.get().is_none());
    assert!(slot.is_empty());
  }

  #[test]
  fn racing_takes_yield_a_single_winner() {
    for _ in 0..100 {
      let slot = Arc::new(TerminalSlot::new(Arc::new(0u8)));
      let threads: Vec<_> = (0..4)
        .map(|_| {
          let slot = slot.clone();
          std::thread::spawn(move || slot.take().is_some())
        })
        .collect();
      let winners = threads
        .into_iter()
        .map(|thread| thread.join().unwrap())
        .filter(|won| *won)
        .count();
      assert_eq!(winners, 1);
    }
  }
}
