use std::sync::{Arc, Mutex};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Forwards at most `limit` items; created by
/// [`FlowableExt::take`](crate::flowable::FlowableExt::take).
pub struct TakeOp<S> {
  source: S,
  limit: i64,
}

impl<S> TakeOp<S> {
  pub(crate) fn new(source: S, limit: i64) -> Self {
    TakeOp { source, limit }
  }
}

impl<S> Flowable for TakeOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let limit = self.limit;
    let subscription = Arc::new_cyclic(|weak| TakeSubscription {
      stage: Stage::new(subscriber, weak),
      counters: Mutex::new(TakeCounters { remaining: limit, pending: 0 }),
    });
    self.source.subscribe(subscription);
  }
}

struct TakeCounters {
  /// Items still allowed through before self-termination.
  remaining: i64,
  /// Credit already forwarded upstream but not yet delivered.
  pending: i64,
}

struct TakeSubscription<T> {
  stage: Stage<T>,
  counters: Mutex<TakeCounters>,
}

impl<T: Send + 'static> BaseSubscriber for TakeSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) {
    self.stage.handshake();
    if self.counters.lock().unwrap().remaining <= 0 {
      self.stage.terminate();
    }
  }

  fn on_next_impl(&self, item: T) {
    let (forward, last) = {
      let mut counters = self.counters.lock().unwrap();
      if counters.remaining <= 0 {
        (false, false)
      } else {
        counters.remaining -= 1;
        if counters.pending > 0 {
          counters.pending -= 1;
        }
        (true, counters.remaining == 0)
      }
    };
    if forward {
      self.stage.forward(item);
      if last {
        self.stage.terminate();
      }
    }
  }

  fn on_complete_impl(&self) { self.stage.complete_downstream() }

  fn on_error_impl(&self, error: FlowError) {
    self.stage.error_downstream(error)
  }
}

impl<T: Send + 'static> Subscription for TakeSubscription<T> {
  fn request(&self, n: i64) {
    // Never ask upstream for more than the limit still outstanding.
    let delta = {
      let mut counters = self.counters.lock().unwrap();
      let available = counters.remaining - counters.pending;
      let delta = n.min(available);
      if delta > 0 {
        counters.pending += delta;
      }
      delta
    };
    if delta > 0 {
      self.stage.request_upstream(delta);
    }
  }

  fn cancel(&self) { self.stage.cancel() }
}
