use std::sync::Arc;

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Forwards only the terminal signal; created by
/// [`FlowableExt::ignore_elements`](crate::flowable::FlowableExt::ignore_elements).
pub struct IgnoreElementsOp<S> {
  source: S,
}

impl<S> IgnoreElementsOp<S> {
  pub(crate) fn new(source: S) -> Self { IgnoreElementsOp { source } }
}

impl<S> Flowable for IgnoreElementsOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let subscription = Arc::new_cyclic(|weak| IgnoreElementsSubscription {
      stage: Stage::new(subscriber, weak),
    });
    self.source.subscribe(subscription);
  }
}

struct IgnoreElementsSubscription<T> {
  stage: Stage<T>,
}

impl<T: Send + 'static> BaseSubscriber for IgnoreElementsSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, _item: T) {}

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T: Send + 'static> Subscription for IgnoreElementsSubscription<T> {
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) { self.stage.cancel() }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn swallows_items_and_completes() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 5).ignore_elements().subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    assert!(consumer.is_completed());
  }

  #[test]
  fn errors_still_propagate() {
    let consumer = TestSubscriber::<i32>::unbounded();
    source::error(FlowError::message("bad"))
      .ignore_elements()
      .subscribe(consumer.clone());
    assert!(consumer.error().is_some());
  }
}
