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

/// Folds the stream into a single value; created by
/// [`FlowableExt::reduce`](crate::flowable::FlowableExt::reduce).
pub struct ReduceOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> ReduceOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    ReduceOp { source, func: Arc::new(func) }
  }
}

impl<S, F> Flowable for ReduceOp<S, F>
where
  S: Flowable,
  F: Fn(S::Item, S::Item) -> S::Item + Send + Sync + 'static,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| ReduceSubscription {
      stage: Stage::new(subscriber, weak),
      func,
      acc: Mutex::new(None),
    });
    self.source.subscribe(subscription);
  }
}

struct ReduceSubscription<T, F> {
  stage: Stage<T>,
  func: Arc<F>,
  acc: Mutex<Option<T>>,
}

impl<T, F> BaseSubscriber for ReduceSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) {
    let mut acc = self.acc.lock().unwrap();
    // The first item seeds the accumulator.
    *acc = Some(match acc.take() {
      Some(previous) => (*self.func)(previous, item),
      None => item,
    });
  }

  fn on_complete_impl(&self) {
    if let Some(result) = self.acc.lock().unwrap().take() {
      self.stage.forward(result);
    }
    self.stage.complete_downstream();
  }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T, F> Subscription for ReduceSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  fn request(&self, n: i64) {
    // A result can only exist once the upstream completes: pull
    // everything regardless of the downstream's credit.
    if n > 0 {
      self.stage.request_upstream(credits::NO_FLOW_CONTROL);
    }
  }

  fn cancel(&self) { self.stage.cancel() }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn folds_the_stream() {
    let consumer = TestSubscriber::unbounded();
    source::just_n(vec![1, 2, 3])
      .reduce(|a, b| a + b)
      .subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![6]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn single_item_is_the_result() {
    let consumer = TestSubscriber::unbounded();
    source::just(41).reduce(|a, b| a + b).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![41]);
  }

  #[test]
  fn empty_source_completes_without_a_value() {
    let consumer = TestSubscriber::unbounded();
    source::empty::<i32>()
      .reduce(|a, b| a + b)
      .subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    assert!(consumer.is_completed());
  }

  #[test]
  fn pulls_everything_with_a_single_downstream_request() {
    let consumer = TestSubscriber::with_request(1);
    source::range(1, 100).reduce(|a, b| a + b).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![5050]);
    assert!(consumer.is_completed());
  }
}
