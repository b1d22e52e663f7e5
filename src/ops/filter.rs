use std::sync::Arc;

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Forwards only matching items; created by
/// [`FlowableExt::filter`](crate::flowable::FlowableExt::filter).
pub struct FilterOp<S, F> {
  source: S,
  predicate: Arc<F>,
}

impl<S, F> FilterOp<S, F> {
  pub(crate) fn new(source: S, predicate: F) -> Self {
    FilterOp { source, predicate: Arc::new(predicate) }
  }
}

impl<S, F> Flowable for FilterOp<S, F>
where
  S: Flowable,
  F: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let predicate = self.predicate.clone();
    let subscription = Arc::new_cyclic(|weak| FilterSubscription {
      stage: Stage::new(subscriber, weak),
      predicate,
    });
    self.source.subscribe(subscription);
  }
}

struct FilterSubscription<T, F> {
  stage: Stage<T>,
  predicate: Arc<F>,
}

impl<T, F> BaseSubscriber for FilterSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(&T) -> bool + Send + Sync + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) {
    if (*self.predicate)(&item) {
      self.stage.forward(item);
    } else {
      // The rejected item consumed upstream credit the downstream never
      // sees; refill it.
      self.stage.request_upstream(1);
    }
  }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T, F> Subscription for FilterSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(&T) -> bool + Send + Sync + 'static,
{
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) { self.stage.cancel() }
}
