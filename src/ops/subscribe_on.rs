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

/// Moves subscription-time wiring onto an executor; created by
/// [`FlowableExt::subscribe_on`](crate::flowable::FlowableExt::subscribe_on).
///
/// The upstream subscribe call, every `request` and the downstream
/// `cancel` are dispatched as executor tasks, so the upstream's state is
/// only ever touched from the executor.
pub struct SubscribeOnOp<S> {
  source: Arc<S>,
  executor: Arc<dyn Executor>,
}

impl<S> SubscribeOnOp<S> {
  pub(crate) fn new(source: S, executor: impl Executor + 'static) -> Self {
    SubscribeOnOp { source: Arc::new(source), executor: Arc::new(executor) }
  }
}

impl<S> Flowable for SubscribeOnOp<S>
where
  S: Flowable + 'static,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let source = self.source.clone();
    let executor = self.executor.clone();
    self.executor.execute(Box::new(move || {
      let subscription = Arc::new_cyclic(|weak| SubscribeOnSubscription {
        stage: Stage::new(subscriber, weak),
        executor: executor.clone(),
        this: weak.clone(),
      });
      source.subscribe(subscription);
    }));
  }
}

struct SubscribeOnSubscription<T> {
  stage: Stage<T>,
  executor: Arc<dyn Executor>,
  this: Weak<SubscribeOnSubscription<T>>,
}

impl<T: Send + 'static> BaseSubscriber for SubscribeOnSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) { self.stage.handshake() }

  fn on_next_impl(&self, item: T) { self.stage.forward(item) }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T: Send + 'static> Subscription for SubscribeOnSubscription<T> {
  fn request(&self, n: i64) {
    let Some(me) = self.this.upgrade() else { return };
    self.executor.execute(Box::new(move || me.stage.request_upstream(n)));
  }

  fn cancel(&self) {
    let Some(me) = self.this.upgrade() else { return };
    self.executor.execute(Box::new(move || me.stage.cancel()));
  }
}
