use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// What to do when an upstream item arrives without downstream credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackpressureStrategy {
  /// Silently drop the item.
  Drop,
  /// Terminate with [`FlowError::MissingBackpressure`].
  Error,
  /// Hold up to the given number of items, flushing as credit arrives;
  /// overflow terminates with [`FlowError::MissingBackpressure`].
  Buffer(usize),
  /// Deliver anyway, ignoring credit.
  Passthrough,
}

/// Decouples an eager upstream from downstream credit; created by
/// [`FlowableExt::on_backpressure`](crate::flowable::FlowableExt::on_backpressure).
///
/// The upstream is requested without flow control; the strategy decides
/// the fate of items the downstream has no credit for.
pub struct OnBackpressureOp<S> {
  source: S,
  strategy: BackpressureStrategy,
}

impl<S> OnBackpressureOp<S> {
  pub(crate) fn new(source: S, strategy: BackpressureStrategy) -> Self {
    OnBackpressureOp { source, strategy }
  }
}

impl<S> Flowable for OnBackpressureOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let strategy = self.strategy;
    let subscription = Arc::new_cyclic(|weak| BackpressureSubscription {
      stage: Stage::new(subscriber, weak),
      strategy,
      inner: Mutex::new(BackpressureInner {
        credit: 0,
        buffer: VecDeque::new(),
        completed: false,
      }),
    });
    self.source.subscribe(subscription);
  }
}

struct BackpressureInner<T> {
  credit: i64,
  buffer: VecDeque<T>,
  /// Upstream completed while items were still buffered; the completion
  /// is delivered once the buffer drains.
  completed: bool,
}

struct BackpressureSubscription<T> {
  stage: Stage<T>,
  strategy: BackpressureStrategy,
  inner: Mutex<BackpressureInner<T>>,
}

enum Outcome<T> {
  Forward(T),
  Swallowed,
  Overflow,
}

impl<T: Send + 'static> BaseSubscriber for BackpressureSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) {
    self.stage.handshake();
    self.stage.request_upstream(credits::NO_FLOW_CONTROL);
  }

  fn on_next_impl(&self, item: T) {
    let outcome = {
      let mut inner = self.inner.lock().unwrap();
      if inner.credit > 0 {
        if !credits::is_infinite(inner.credit) {
          inner.credit -= 1;
        }
        Outcome::Forward(item)
      } else {
        match self.strategy {
          BackpressureStrategy::Passthrough => Outcome::Forward(item),
          BackpressureStrategy::Drop => Outcome::Swallowed,
          BackpressureStrategy::Error => Outcome::Overflow,
          BackpressureStrategy::Buffer(capacity) => {
            if inner.buffer.len() < capacity {
              inner.buffer.push_back(item);
              Outcome::Swallowed
            } else {
              Outcome::Overflow
            }
          }
        }
      }
    };
    match outcome {
      Outcome::Forward(item) => self.stage.forward(item),
      Outcome::Swallowed => {}
      Outcome::Overflow => {
        self.stage.terminate_err(FlowError::MissingBackpressure)
      }
    }
  }

  fn on_complete_impl(&self) {
    let deliver_now = {
      let mut inner = self.inner.lock().unwrap();
      if inner.buffer.is_empty() {
        true
      } else {
        inner.completed = true;
        false
      }
    };
    if deliver_now {
      self.stage.complete_downstream();
    }
  }

  fn on_error_impl(&self, error: FlowError) {
    self.inner.lock().unwrap().buffer.clear();
    self.stage.error_downstream(error);
  }
}

impl<T: Send + 'static> Subscription for BackpressureSubscription<T> {
  fn request(&self, n: i64) {
    if n <= 0 {
      return;
    }
    let (flush, complete) = {
      let mut inner = self.inner.lock().unwrap();
      inner.credit = credits::add_values(inner.credit, n);
      let mut flush = Vec::new();
      while inner.credit > 0 {
        let Some(item) = inner.buffer.pop_front() else { break };
        if !credits::is_infinite(inner.credit) {
          inner.credit -= 1;
        }
        flush.push(item);
      }
      (flush, inner.completed && inner.buffer.is_empty())
    };
    for item in flush {
      self.stage.forward(item);
    }
    if complete {
      self.stage.complete_downstream();
    }
  }

  fn cancel(&self) {
    self.inner.lock().unwrap().buffer.clear();
    self.stage.cancel();
  }
}
