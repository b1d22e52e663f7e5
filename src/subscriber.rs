use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
  },
};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  error::FlowError,
  subscription::Subscription,
};

/// Consumer half of the protocol, called by a producer.
///
/// `on_subscribe` arrives exactly once before anything else; `on_next`
/// zero or more times, never exceeding the requested credit; `on_complete`
/// or `on_error` at most once in total, after which nothing else is
/// delivered.
pub trait Subscriber: Send + Sync {
  type Item;

  fn on_subscribe(&self, subscription: Arc<dyn Subscription>);
  fn on_next(&self, item: Self::Item);
  fn on_complete(&self);
  fn on_error(&self, error: FlowError);
}

/// Callback-driven consumer created by the `subscribe_*` helpers on
/// [`FlowableExt`](crate::flowable::FlowableExt).
///
/// Requests `batch` items up front and tops the window back up once half
/// of it has been consumed, keeping the producer busy without unbounded
/// buffering. A batch of [`credits::NO_FLOW_CONTROL`] disables flow
/// control entirely.
pub struct LambdaSubscriber<T, N, E, C> {
  state: SubscriberState,
  next: N,
  error: E,
  complete: C,
  batch: i64,
  consumed: AtomicI64,
  _marker: PhantomData<fn(T)>,
}

impl<T, N, E, C> LambdaSubscriber<T, N, E, C>
where
  T: Send + 'static,
  N: Fn(T) + Send + Sync + 'static,
  E: Fn(FlowError) + Send + Sync + 'static,
  C: Fn() + Send + Sync + 'static,
{
  pub fn new(next: N, error: E, complete: C, batch: i64) -> Arc<Self> {
    let batch = if batch <= 0 { credits::NO_FLOW_CONTROL } else { batch };
    Arc::new(LambdaSubscriber {
      state: SubscriberState::new(),
      next,
      error,
      complete,
      batch,
      consumed: AtomicI64::new(0),
      _marker: PhantomData,
    })
  }
}

impl<T, N, E, C> BaseSubscriber for LambdaSubscriber<T, N, E, C>
where
  T: Send + 'static,
  N: Fn(T) + Send + Sync + 'static,
  E: Fn(FlowError) + Send + Sync + 'static,
  C: Fn() + Send + Sync + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { &self.state }

  fn on_subscribe_impl(&self) { self.request(self.batch); }

  fn on_next_impl(&self, item: T) {
    (self.next)(item);
    if credits::is_infinite(self.batch) {
      return;
    }
    // Sliding window: once half the batch is consumed, request that many
    // again so the window climbs back to `batch`.
    let consumed = self.consumed.fetch_add(1, Ordering::AcqRel) + 1;
    if consumed >= (self.batch / 2).max(1) {
      self.consumed.store(0, Ordering::Release);
      self.request(consumed);
    }
  }

  fn on_error_impl(&self, error: FlowError) { (self.error)(error); }

  fn on_complete_impl(&self) { (self.complete)(); }
}

/// Handle returned by the callback subscribe helpers; disposing cancels
/// the underlying subscription.
pub struct Disposable {
  cancel: Box<dyn Fn() + Send + Sync>,
}

impl Disposable {
  pub(crate) fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
    Disposable { cancel: Box::new(cancel) }
  }

  /// Cancels the subscription. Idempotent.
  pub fn dispose(&self) { (self.cancel)() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::Subscription;
  use std::sync::Mutex;

  struct RecordingSubscription {
    requests: Mutex<Vec<i64>>,
  }

  impl Subscription for RecordingSubscription {
    fn request(&self, n: i64) { self.requests.lock().unwrap().push(n); }
    fn cancel(&self) {}
  }

  #[test]
  fn requests_the_batch_up_front() {
    let upstream =
      Arc::new(RecordingSubscription { requests: Mutex::new(vec![]) });
    let subscriber =
      LambdaSubscriber::new(|_: i32| {}, |_| {}, || {}, 4);
    subscriber.on_subscribe(upstream.clone());
    assert_eq!(*upstream.requests.lock().unwrap(), vec![4]);
  }

  #[test]
  fn tops_the_window_up_after_half_the_batch() {
    let upstream =
      Arc::new(RecordingSubscription { requests: Mutex::new(vec![]) });
    let subscriber =
      LambdaSubscriber::new(|_: i32| {}, |_| {}, || {}, 4);
    subscriber.on_subscribe(upstream.clone());
    subscriber.on_next(1);
    assert_eq!(*upstream.requests.lock().unwrap(), vec![4]);
    subscriber.on_next(2);
    assert_eq!(*upstream.requests.lock().unwrap(), vec![4, 2]);
    subscriber.on_next(3);
    subscriber.on_next(4);
    assert_eq!(*upstream.requests.lock().unwrap(), vec![4, 2, 2]);
  }

  #[test]
  fn unbounded_batch_never_rerequests() {
    let upstream =
      Arc::new(RecordingSubscription { requests: Mutex::new(vec![]) });
    let subscriber = LambdaSubscriber::new(
      |_: i32| {},
      |_| {},
      || {},
      credits::NO_FLOW_CONTROL,
    );
    subscriber.on_subscribe(upstream.clone());
    for i in 0..10 {
      subscriber.on_next(i);
    }
    assert_eq!(
      *upstream.requests.lock().unwrap(),
      vec![credits::NO_FLOW_CONTROL]
    );
  }

  #[test]
  fn callbacks_fire() {
    let seen = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(Mutex::new(false));
    let subscriber = {
      let seen = seen.clone();
      let completed = completed.clone();
      LambdaSubscriber::new(
        move |v: i32| seen.lock().unwrap().push(v),
        |_| {},
        move || *completed.lock().unwrap() = true,
        credits::NO_FLOW_CONTROL,
      )
    };
    subscriber.on_subscribe(crate::subscription::noop());
    subscriber.on_next(1);
    subscriber.on_next(2);
    subscriber.on_complete();
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert!(*completed.lock().unwrap());
  }
}
