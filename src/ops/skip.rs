use std::sync::{Arc, Mutex};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Swallows the first `count` items; created by
/// [`FlowableExt::skip`](crate::flowable::FlowableExt::skip).
pub struct SkipOp<S> {
  source: S,
  count: i64,
}

impl<S> SkipOp<S> {
  pub(crate) fn new(source: S, count: i64) -> Self {
    SkipOp { source, count: count.max(0) }
  }
}

impl<S> Flowable for SkipOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let count = self.count;
    let subscription = Arc::new_cyclic(|weak| SkipSubscription {
      stage: Stage::new(subscriber, weak),
      count,
      state: Mutex::new(SkipState { remaining: count, first_request: true }),
    });
    self.source.subscribe(subscription);
  }
}

struct SkipState {
  remaining: i64,
  first_request: bool,
}

struct SkipSubscription<T> {
  stage: Stage<T>,
  count: i64,
  state: Mutex<SkipState>,
}

impl<T: Send + 'static> BaseSubscriber for SkipSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) {
    let swallow = {
      let mut state = self.state.lock().unwrap();
      if state.remaining > 0 {
        state.remaining -= 1;
        true
      } else {
        false
      }
    };
    if !swallow {
      self.stage.forward(item);
    }
  }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T: Send + 'static> Subscription for SkipSubscription<T> {
  fn request(&self, n: i64) {
    if n <= 0 {
      return;
    }
    // Inflate the very first request so the skipped items do not count
    // against the consumer's credit.
    let n = {
      let mut state = self.state.lock().unwrap();
      if state.first_request {
        state.first_request = false;
        credits::add_values(n, self.count)
      } else {
        n
      }
    };
    self.stage.request_upstream(n);
  }

  fn cancel(&self) { self.stage.cancel() }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn skip_zero_is_the_identity() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 4).skip(0).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![0, 1, 2, 3]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn skips_the_prefix() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 6).skip(3).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![3, 4, 5]);
  }

  #[test]
  fn skipping_more_than_the_source_completes_empty() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 3).skip(10).subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    assert!(consumer.is_completed());
  }

  #[test]
  fn skipped_items_do_not_consume_downstream_credit() {
    let consumer = TestSubscriber::with_request(2);
    source::range(0, 10).skip(3).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![3, 4]);
  }
}
