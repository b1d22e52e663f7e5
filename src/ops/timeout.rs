use std::{
  sync::{Arc, Mutex, Weak},
  time::{Duration, Instant},
};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::Subscription,
  timer::{Timer, TimerHandle},
};

/// Fails the stream when items stop arriving in time; created by
/// [`FlowableExt::timeout`](crate::flowable::FlowableExt::timeout).
///
/// Arms a deadline on subscription (`initial`) and after every delivery
/// (`per_item`); a zero duration disables the corresponding deadline. An
/// item arriving after its deadline logically expired is treated as a
/// timeout even if the timer task has not run yet.
pub struct TimeoutOp<S> {
  source: S,
  timer: Arc<dyn Timer>,
  per_item: Duration,
  initial: Duration,
}

impl<S> TimeoutOp<S> {
  pub(crate) fn new(
    source: S,
    timer: impl Timer + 'static,
    per_item: Duration,
    initial: Duration,
  ) -> Self {
    TimeoutOp { source, timer: Arc::new(timer), per_item, initial }
  }
}

impl<S> Flowable for TimeoutOp<S>
where
  S: Flowable,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = S::Item>>) {
    let timer = self.timer.clone();
    let per_item = self.per_item;
    let initial = self.initial;
    let subscription = Arc::new_cyclic(|weak| TimeoutSubscription {
      stage: Stage::new(subscriber, weak),
      timer,
      per_item,
      initial,
      this: weak.clone(),
      deadline: Mutex::new(DeadlineState {
        at: None,
        handle: None,
        generation: 0,
      }),
    });
    self.source.subscribe(subscription);
  }
}

struct DeadlineState {
  at: Option<Instant>,
  handle: Option<TimerHandle>,
  /// Bumped on every arm/disarm; a fired task that lost the race against
  /// a delivery carries a stale generation and does nothing.
  generation: u64,
}

struct TimeoutSubscription<T> {
  stage: Stage<T>,
  timer: Arc<dyn Timer>,
  per_item: Duration,
  initial: Duration,
  this: Weak<TimeoutSubscription<T>>,
  deadline: Mutex<DeadlineState>,
}

impl<T: Send + 'static> TimeoutSubscription<T> {
  fn arm(&self, delay: Duration) {
    let Some(me) = self.this.upgrade() else { return };
    let mut deadline = self.deadline.lock().unwrap();
    deadline.generation += 1;
    let generation = deadline.generation;
    deadline.at = Some(Instant::now() + delay);
    if let Some(handle) = deadline.handle.take() {
      handle.cancel();
    }
    deadline.handle = Some(
      self.timer.schedule(delay, Box::new(move || me.fire(generation))),
    );
  }

  fn disarm(&self) {
    let mut deadline = self.deadline.lock().unwrap();
    deadline.generation += 1;
    deadline.at = None;
    if let Some(handle) = deadline.handle.take() {
      handle.cancel();
    }
  }

  fn fire(&self, generation: u64) {
    {
      let deadline = self.deadline.lock().unwrap();
      if deadline.generation != generation {
        return;
      }
    }
    self.stage.terminate_err(FlowError::Timeout);
  }
}

impl<T: Send + 'static> BaseSubscriber for TimeoutSubscription<T> {
  type Item = T;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) {
    // Armed before the handshake so the deadline covers the time to the
    // first item from the moment of subscription.
    if self.initial > Duration::ZERO {
      self.arm(self.initial);
    }
    self.stage.handshake();
  }

  fn on_next_impl(&self, item: T) {
    let expired = {
      let deadline = self.deadline.lock().unwrap();
      matches!(deadline.at, Some(at) if Instant::now() >= at)
    };
    if expired {
      self.stage.terminate_err(FlowError::Timeout);
      return;
    }
    self.disarm();
    self.stage.forward(item);
    if self.per_item > Duration::ZERO && self.stage.is_live() {
      self.arm(self.per_item);
    }
  }

  fn on_complete_impl(&self) {
    self.disarm();
    self.stage.complete_downstream();
  }

  fn on_error_impl(&self, error: FlowError) {
    self.disarm();
    self.stage.error_downstream(error);
  }
}

impl<T: Send + 'static> Subscription for TimeoutSubscription<T> {
  fn request(&self, n: i64) { self.stage.request_upstream(n) }

  fn cancel(&self) {
    self.disarm();
    self.stage.cancel();
  }
}
