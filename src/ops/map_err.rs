use std::sync::Arc;

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Rewrites the terminal error; created by
/// [`FlowableExt::map_err`](crate::flowable::FlowableExt::map_err).
pub struct MapErrOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> MapErrOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    MapErrOp { source, func: Arc::new(func) }
  }
}

impl<S, F> Flowable for MapErrOp<S, F>
where
  S: Flowable,
  F: Fn(FlowError) -> FlowError + Send + Sync + 'static,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| MapErrSubscription {
      stage: Stage::new(subscriber, weak),
      func,
    });
    self.source.subscribe(subscription);
  }
}

struct MapErrSubscription<T, F> {
  stage: Stage<T>,
  func: Arc<F>,
}

impl<T, F> BaseSubscriber for MapErrSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(FlowError) -> FlowError + Send + Sync + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) { self.stage.forward(item) }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream((*self.func)(error))
  }
}

impl<T, F> Subscription for MapErrSubscription<T, F>
where
  T: Send + 'static,
  F: Fn(FlowError) -> FlowError + Send + Sync + 'static,
{
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) { self.stage.cancel() }
}
