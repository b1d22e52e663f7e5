use std::{
  marker::PhantomData,
  sync::{atomic::AtomicI64, atomic::Ordering, Arc, Mutex},
};

use crate::{
  credits,
  drain::DrainLoop,
  error::FlowError,
  flowable::Flowable,
  subscriber::Subscriber,
  subscription::{Subscription, TerminalSlot},
};

/// Budget-tracking proxy handed to an emit callback.
///
/// Forwards up to the requested number of items downstream and records a
/// terminal signal; items pushed beyond the budget are dropped (and assert
/// in debug builds).
pub struct Emission<T> {
  slot: Arc<TerminalSlot<dyn Subscriber<Item = T>>>,
  target: Arc<dyn Subscriber<Item = T>>,
  budget: i64,
  emitted: i64,
  finished: bool,
}

impl<T: Send + 'static> Emission<T> {
  /// Items still allowed in this emit call; zero once the stream finished
  /// or the consumer cancelled mid-batch.
  pub fn requested(&self) -> i64 {
    if self.finished {
      0
    } else if credits::is_infinite(self.budget) {
      self.budget
    } else {
      self.budget - self.emitted
    }
  }

  pub fn next(&mut self, item: T) {
    if self.finished {
      return;
    }
    if self.slot.is_empty() {
      // The consumer cancelled while this batch was being emitted.
      self.finished = true;
      return;
    }
    if !credits::is_infinite(self.budget) && self.emitted >= self.budget {
      debug_assert!(false, "emitter overran the requested budget");
      tracing::debug!("dropping item emitted beyond the requested budget");
      return;
    }
    self.emitted += 1;
    self.target.on_next(item);
  }

  pub fn complete(&mut self) {
    if !self.finished {
      self.finished = true;
      if let Some(subscriber) = self.slot.take() {
        subscriber.on_complete();
      }
    }
  }

  pub fn error(&mut self, error: FlowError) {
    if !self.finished {
      self.finished = true;
      if let Some(subscriber) = self.slot.take() {
        subscriber.on_error(error);
      }
    }
  }
}

struct EmitterSubscription<T, F> {
  credits: AtomicI64,
  drain: DrainLoop,
  emit: Mutex<F>,
  downstream: Arc<TerminalSlot<dyn Subscriber<Item = T>>>,
}

impl<T, F> EmitterSubscription<T, F>
where
  T: Send + 'static,
  F: FnMut(&mut Emission<T>, i64) + Send + 'static,
{
  fn drain(&self) { self.drain.run(|| self.drain_pass()); }

  fn drain_pass(&self) {
    loop {
      let current = self.credits.load(Ordering::Acquire);
      if credits::is_canceled(current) {
        drop(self.downstream.take());
        return;
      }
      if current <= 0 {
        return;
      }
      let Some(target) = self.downstream.get() else { return };
      let (emitted, finished) = {
        let mut emission = Emission {
          slot: self.downstream.clone(),
          target,
          budget: current,
          emitted: 0,
          finished: false,
        };
        let mut emit = self.emit.lock().unwrap();
        (*emit)(&mut emission, current);
        (emission.emitted, emission.finished)
      };
      if finished {
        credits::cancel(&self.credits);
        return;
      }
      if emitted == 0 {
        // The emitter had nothing to give; a later request re-drives it.
        return;
      }
      if !credits::is_infinite(current) {
        credits::consume(&self.credits, emitted);
      }
      // Under an unbounded request no further request call will arrive:
      // keep offering batches as long as the emitter makes progress.
    }
  }
}

impl<T, F> Subscription for EmitterSubscription<T, F>
where
  T: Send + 'static,
  F: FnMut(&mut Emission<T>, i64) + Send + 'static,
{
  fn request(&self, n: i64) {
    if n <= 0 {
      return;
    }
    credits::add(&self.credits, n);
    self.drain();
  }

  fn cancel(&self) {
    if credits::cancel(&self.credits) {
      drop(self.downstream.take());
    }
  }
}

/// Flowable built from an emit callback; see [`create`].
pub struct CreateFlowable<T, F> {
  emit: F,
  _marker: PhantomData<fn() -> T>,
}

impl<T, F> Flowable for CreateFlowable<T, F>
where
  T: Send + 'static,
  F: FnMut(&mut Emission<T>, i64) + Clone + Send + Sync + 'static,
{
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    let subscription = Arc::new(EmitterSubscription {
      credits: AtomicI64::new(0),
      drain: DrainLoop::new(),
      emit: Mutex::new(self.emit.clone()),
      downstream: Arc::new(TerminalSlot::new(subscriber.clone())),
    });
    subscriber.on_subscribe(subscription);
  }
}

/// Builds a flowable from a callback that synchronously pushes up to the
/// requested number of items per invocation.
///
/// The callback runs under a single-flight drain loop, so concurrent
/// `request` calls never invoke it concurrently; a `request` arriving
/// mid-drain only bumps the credit counter and is picked up on the next
/// iteration. Captured state is cloned per subscription, which keeps the
/// stream cold and repeatable.
pub fn create<T, F>(emit: F) -> CreateFlowable<T, F>
where
  T: Send + 'static,
  F: FnMut(&mut Emission<T>, i64) + Clone + Send + Sync + 'static,
{
  CreateFlowable { emit, _marker: PhantomData }
}
