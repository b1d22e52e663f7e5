use std::sync::Arc;

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

pub(crate) fn noop0() {}
pub(crate) fn noop_item<T>(_: &T) {}
pub(crate) fn noop_err(_: &FlowError) {}
pub(crate) fn noop_req(_: i64) {}

/// Side-effect taps for every protocol signal; unset slots hold no-op fn
/// pointers.
pub struct DoCallbacks<FSub, FNext, FErr, FComp, FReq, FCan> {
  pub(crate) on_subscribe: FSub,
  pub(crate) on_next: FNext,
  pub(crate) on_error: FErr,
  pub(crate) on_complete: FComp,
  pub(crate) on_request: FReq,
  pub(crate) on_cancel: FCan,
}

/// Invokes side-effect callbacks as signals pass through; created by the
/// `do_on_*` methods on [`FlowableExt`](crate::flowable::FlowableExt).
pub struct DoOp<S, FSub, FNext, FErr, FComp, FReq, FCan> {
  source: S,
  callbacks: Arc<DoCallbacks<FSub, FNext, FErr, FComp, FReq, FCan>>,
}

impl<S, FSub, FNext, FErr, FComp, FReq, FCan>
  DoOp<S, FSub, FNext, FErr, FComp, FReq, FCan>
{
  pub(crate) fn new(
    source: S,
    callbacks: DoCallbacks<FSub, FNext, FErr, FComp, FReq, FCan>,
  ) -> Self {
    DoOp { source, callbacks: Arc::new(callbacks) }
  }
}

impl<S, FSub, FNext, FErr, FComp, FReq, FCan> Flowable
  for DoOp<S, FSub, FNext, FErr, FComp, FReq, FCan>
where
  S: Flowable,
  FSub: Fn() + Send + Sync + 'static,
  FNext: Fn(&S::Item) + Send + Sync + 'static,
  FErr: Fn(&FlowError) + Send + Sync + 'static,
  FComp: Fn() + Send + Sync + 'static,
  FReq: Fn(i64) + Send + Sync + 'static,
  FCan: Fn() + Send + Sync + 'static,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let callbacks = self.callbacks.clone();
    let subscription = Arc::new_cyclic(|weak| DoSubscription {
      stage: Stage::new(subscriber, weak),
      callbacks,
    });
    self.source.subscribe(subscription);
  }
}

struct DoSubscription<T, FSub, FNext, FErr, FComp, FReq, FCan> {
  stage: Stage<T>,
  callbacks: Arc<DoCallbacks<FSub, FNext, FErr, FComp, FReq, FCan>>,
}

impl<T, FSub, FNext, FErr, FComp, FReq, FCan> BaseSubscriber
  for DoSubscription<T, FSub, FNext, FErr, FComp, FReq, FCan>
where
  T: Send + 'static,
  FSub: Fn() + Send + Sync + 'static,
  FNext: Fn(&T) + Send + Sync + 'static,
  FErr: Fn(&FlowError) + Send + Sync + 'static,
  FComp: Fn() + Send + Sync + 'static,
  FReq: Fn(i64) + Send + Sync + 'static,
  FCan: Fn() + Send + Sync + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) {
    (self.callbacks.on_subscribe)();
    self.stage.handshake();
  }

  fn on_next_impl(&self, item: T) {
    (self.callbacks.on_next)(&item);
    self.stage.forward(item);
  }

  fn on_complete_impl(&self) {
    (self.callbacks.on_complete)();
    self.stage.complete_downstream();
  }

  fn on_error_impl(&self, error: FlowError) {
    (self.callbacks.on_error)(&error);
    self.stage.error_downstream(error);
  }
}

impl<T, FSub, FNext, FErr, FComp, FReq, FCan> Subscription
  for DoSubscription<T, FSub, FNext, FErr, FComp, FReq, FCan>
where
  T: Send + 'static,
  FSub: Fn() + Send + Sync + 'static,
  FNext: Fn(&T) + Send + Sync + 'static,
  FErr: Fn(&FlowError) + Send + Sync + 'static,
  FComp: Fn() + Send + Sync + 'static,
  FReq: Fn(i64) + Send + Sync + 'static,
  FCan: Fn() + Send + Sync + 'static,
{
  fn request(&self, n: i64) {
    (self.callbacks.on_request)(n);
    self.stage.request_upstream(n);
  }

  fn cancel(&self) {
    (self.callbacks.on_cancel)();
    self.stage.cancel();
  }
}
