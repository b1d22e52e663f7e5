use std::{marker::PhantomData, sync::Arc};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Applies a transform to each item; created by
/// [`FlowableExt::map`](crate::flowable::FlowableExt::map).
pub struct MapOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> MapOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    MapOp { source, func: Arc::new(func) }
  }
}

impl<S, D, F> Flowable for MapOp<S, F>
where
  S: Flowable,
  D: Send + 'static,
  F: Fn(S::Item) -> D + Send + Sync + 'static,
{
  type Item = D;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = D>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| MapSubscription {
      stage: Stage::new(subscriber, weak),
      func: move |item: S::Item| -> Result<D, FlowError> {
        Ok((*func)(item))
      },
      _marker: PhantomData,
    });
    self.source.subscribe(subscription);
  }
}

/// Fallible [`MapOp`]; created by
/// [`FlowableExt::try_map`](crate::flowable::FlowableExt::try_map).
pub struct TryMapOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> TryMapOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    TryMapOp { source, func: Arc::new(func) }
  }
}

impl<S, D, F> Flowable for TryMapOp<S, F>
where
  S: Flowable,
  D: Send + 'static,
  F: Fn(S::Item) -> Result<D, FlowError> + Send + Sync + 'static,
{
  type Item = D;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = D>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| MapSubscription {
      stage: Stage::new(subscriber, weak),
      func: move |item: S::Item| -> Result<D, FlowError> { (*func)(item) },
      _marker: PhantomData,
    });
    self.source.subscribe(subscription);
  }
}

pub(crate) struct MapSubscription<U, D, G> {
  stage: Stage<D>,
  func: G,
  _marker: PhantomData<fn(U)>,
}

impl<U, D, G> BaseSubscriber for MapSubscription<U, D, G>
where
  U: Send + 'static,
  D: Send + 'static,
  G: Fn(U) -> Result<D, FlowError> + Send + Sync + 'static,
{
  type Item = U;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: U) {
    match (self.func)(item) {
      Ok(mapped) => self.stage.forward(mapped),
      Err(error) => self.stage.terminate_err(error),
    }
  }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<U, D, G> Subscription for MapSubscription<U, D, G>
where
  U: Send + 'static,
  D: Send + 'static,
  G: Fn(U) -> Result<D, FlowError> + Send + Sync + 'static,
{
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) { self.stage.cancel() }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn maps_every_item() {
    let consumer = TestSubscriber::unbounded();
    source::range(1, 4).map(|v| v * 10).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![10, 20, 30, 40]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn map_respects_downstream_credit() {
    let consumer = TestSubscriber::with_request(2);
    source::range(0, 10).map(|v| v + 1).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![1, 2]);
  }

  #[test]
  fn try_map_failure_is_isolated_to_one_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let consumer = TestSubscriber::unbounded();
    source::range(1, 100)
      .try_map(move |v| {
        if counted.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
          Err(FlowError::message("third call failed"))
        } else {
          Ok(v * 2)
        }
      })
      .subscribe(consumer.clone());

    assert_eq!(consumer.values(), vec![2, 4]);
    assert!(matches!(consumer.error(), Some(FlowError::Message(_))));
    assert_eq!(consumer.terminal_count(), 1);
  }

  #[test]
  fn try_map_error_cancels_upstream() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let counted = cancelled.clone();
    let consumer = TestSubscriber::unbounded();
    source::range(0, 1000)
      .do_on_cancel(move || {
        counted.fetch_add(1, Ordering::SeqCst);
      })
      .try_map(|v| {
        if v == 1 {
          Err(FlowError::message("stop"))
        } else {
          Ok(v)
        }
      })
      .subscribe(consumer.clone());

    assert_eq!(consumer.values(), vec![0]);
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
  }
}
