use std::sync::{Arc, Weak};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  executor::Executor,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Delivers downstream signals on an executor; created by
/// [`FlowableExt::observe_on`](crate::flowable::FlowableExt::observe_on).
///
/// Each signal becomes one task on the executor's queue, which preserves
/// delivery order as long as the executor runs tasks in submission order.
pub struct ObserveOnOp<S> {
  source: S,
  executor: Arc<dyn Executor>,
}

impl<S> ObserveOnOp<S> {
  pub(crate) fn new(source: S, executor: impl Executor + 'static) -> Self {
    ObserveOnOp { source, executor: Arc::new(executor) }
  }
}

impl<S> Flowable for ObserveOnOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let executor = self.executor.clone();
    let subscription = Arc::new_cyclic(|weak| ObserveOnSubscription {
      stage: Stage::new(subscriber, weak),
      executor,
      this: weak.clone(),
    });
    self.source.subscribe(subscription);
  }
}

struct ObserveOnSubscription<T> {
  stage: Stage<T>,
  executor: Arc<dyn Executor>,
  this: Weak<ObserveOnSubscription<T>>,
}

impl<T: Send + 'static> BaseSubscriber for ObserveOnSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) {
    let Some(me) = self.this.upgrade() else { return };
    self.executor.execute(Box::new(move || me.stage.forward(item)));
  }

  fn on_complete_impl(&self) {
    let Some(me) = self.this.upgrade() else { return };
    self.executor.execute(Box::new(move || me.stage.complete_downstream()));
  }

  fn on_error_impl(&self, error: FlowError) {
    let Some(me) = self.this.upgrade() else { return };
    self
      .executor
      .execute(Box::new(move || me.stage.error_downstream(error)));
  }
}

impl<T: Send + 'static> Subscription for ObserveOnSubscription<T> {
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) { self.stage.cancel() }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn delivery_waits_for_the_executor() {
    let executor = ManualExecutor::new();
    let consumer = TestSubscriber::unbounded();
    source::range(0, 3)
      .observe_on(executor.clone())
      .subscribe(consumer.clone());

    assert_eq!(consumer.value_count(), 0);
    executor.run();
    assert_eq!(consumer.values(), vec![0, 1, 2]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn order_is_preserved_through_the_queue() {
    let executor = ManualExecutor::new();
    let consumer = TestSubscriber::unbounded();
    source::range(0, 50)
      .observe_on(executor.clone())
      .subscribe(consumer.clone());
    executor.run();
    assert_eq!(consumer.values(), (0..50).collect::<Vec<_>>());
  }

  #[test]
  fn cancel_drops_queued_deliveries() {
    let executor = ManualExecutor::new();
    let consumer = TestSubscriber::unbounded();
    source::range(0, 5)
      .observe_on(executor.clone())
      .subscribe(consumer.clone());

    consumer.cancel();
    executor.run();
    assert_eq!(consumer.value_count(), 0);
  }

  #[cfg(feature = "futures-executor")]
  #[test]
  fn delivers_on_a_thread_pool() {
    use futures::executor::ThreadPool;
    use std::time::Duration;

    let pool = ThreadPool::builder().pool_size(1).create().unwrap();
    let consumer = TestSubscriber::unbounded();
    source::range(0, 10).observe_on(pool).subscribe(consumer.clone());

    assert!(consumer.await_terminal(Duration::from_secs(5)));
    assert_eq!(consumer.values(), (0..10).collect::<Vec<_>>());
  }
}
