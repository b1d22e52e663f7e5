use std::sync::{
  atomic::{AtomicBool, AtomicI64, Ordering},
  Arc, Mutex, Weak,
};

use smallvec::SmallVec;

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  drain::DrainLoop,
  error::FlowError,
  flowable::Flowable,
  ops::Stage,
  subscriber::Subscriber,
  subscription::{Subscription, TerminalSlot},
};

/// Maps each item to an inner flowable and merges the results; created by
/// [`FlowableExt::flat_map`](crate::flowable::FlowableExt::flat_map).
///
/// Each inner stream is consumed one buffered value at a time
/// (`request(1)` per child); delivered results are paced by the
/// downstream's credit while the outer source is consumed eagerly. Child
/// concurrency is unbounded and no ordering across children is
/// guaranteed.
pub struct FlatMapOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> FlatMapOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    FlatMapOp { source, func: Arc::new(func) }
  }
}

impl<S, F, FR> Flowable for FlatMapOp<S, F>
where
  S: Flowable,
  FR: Flowable + 'static,
  F: Fn(S::Item) -> FR + Send + Sync + 'static,
{
  type Item = FR::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = FR::Item>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| {
      FlatMapSubscription::new(
        Stage::new(subscriber, weak),
        move |item: S::Item| -> Result<FR, FlowError> { Ok((*func)(item)) },
        weak.clone(),
      )
    });
    self.source.subscribe(subscription);
  }
}

/// Fallible [`FlatMapOp`]; created by
/// [`FlowableExt::try_flat_map`](crate::flowable::FlowableExt::try_flat_map).
pub struct TryFlatMapOp<S, F> {
  source: S,
  func: Arc<F>,
}

impl<S, F> TryFlatMapOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self {
    TryFlatMapOp { source, func: Arc::new(func) }
  }
}

impl<S, F, FR> Flowable for TryFlatMapOp<S, F>
where
  S: Flowable,
  FR: Flowable + 'static,
  F: Fn(S::Item) -> Result<FR, FlowError> + Send + Sync + 'static,
{
  type Item = FR::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = FR::Item>>) {
    let func = self.func.clone();
    let subscription = Arc::new_cyclic(|weak| {
      FlatMapSubscription::new(
        Stage::new(subscriber, weak),
        move |item: S::Item| -> Result<FR, FlowError> { (*func)(item) },
        weak.clone(),
      )
    });
    self.source.subscribe(subscription);
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ChildState {
  /// `request(1)` issued, waiting for the value to arrive.
  Pending,
  /// Holding a buffered value ready for delivery.
  Ready,
  /// Value delivered; awaiting its next `request(1)`.
  Idle,
}

struct ChildEntry<U, R, FR, G> {
  child: Arc<ChildSubscriber<U, R, FR, G>>,
  state: ChildState,
}

struct ChildSync<R> {
  value: Option<R>,
  terminated: bool,
  /// Set while the parent evicts this child; a frozen child's callbacks
  /// must not touch the table or the live count.
  freeze: bool,
  error: Option<FlowError>,
}

/// Buffers at most one value of the inner stream it subscribes to.
struct ChildSubscriber<U, R, FR, G> {
  parent: TerminalSlot<FlatMapSubscription<U, R, FR, G>>,
  state: SubscriberState,
  sync: Mutex<ChildSync<R>>,
}

struct FlatMapSubscription<U, R, FR, G> {
  stage: Stage<R>,
  func: G,
  this: Weak<FlatMapSubscription<U, R, FR, G>>,
  drain: DrainLoop,
  /// Downstream credit for delivered results; decoupled from the outer
  /// source, which is always requested without flow control.
  requested: AtomicI64,
  /// Outer subscription plus children that have not terminated yet.
  live: AtomicI64,
  clear_all: AtomicBool,
  terminated: AtomicBool,
  pending_error: Mutex<Option<FlowError>>,
  children: Mutex<Vec<ChildEntry<U, R, FR, G>>>,
}

impl<U, R, FR, G> FlatMapSubscription<U, R, FR, G>
where
  U: Send + 'static,
  R: Send + 'static,
  FR: Flowable<Item = R> + 'static,
  G: Fn(U) -> Result<FR, FlowError> + Send + Sync + 'static,
{
  fn new(
    stage: Stage<R>,
    func: G,
    this: Weak<FlatMapSubscription<U, R, FR, G>>,
  ) -> Self {
    FlatMapSubscription {
      stage,
      func,
      this,
      drain: DrainLoop::new(),
      requested: AtomicI64::new(0),
      live: AtomicI64::new(0),
      clear_all: AtomicBool::new(false),
      terminated: AtomicBool::new(false),
      pending_error: Mutex::new(None),
      children: Mutex::new(Vec::new()),
    }
  }

  fn drain(&self) { self.drain.run(|| self.drain_pass()); }

  fn drain_pass(&self) {
    self.evict_cleared();
    self.check_terminal();
    self.deliver_ready();
    self.cycle_idle();
  }

  /// Phase 1: on clear-all, freeze and cancel every child.
  fn evict_cleared(&self) {
    if !self.clear_all.load(Ordering::Acquire) {
      return;
    }
    let cleared: SmallVec<[_; 4]> = {
      let mut children = self.children.lock().unwrap();
      children
        .drain(..)
        .map(|entry| {
          entry.child.sync.lock().unwrap().freeze = true;
          entry.child
        })
        .collect()
    };
    for child in cleared {
      child.cancel();
    }
  }

  /// Phase 2: deliver the single outer terminal once an error is pending
  /// or every live subscription has ended.
  fn check_terminal(&self) {
    if self.terminated.load(Ordering::Acquire) {
      return;
    }
    let error = self.pending_error.lock().unwrap().take();
    if let Some(error) = error {
      self.terminated.store(true, Ordering::Release);
      self.clear_all.store(true, Ordering::Release);
      // The eviction runs on the pass this one queues.
      self.drain.reschedule();
      self.stage.terminate_err(error);
    } else if self.live.load(Ordering::Acquire) == 0 {
      self.terminated.store(true, Ordering::Release);
      self.stage.terminate();
    }
  }

  /// Phase 3: pop buffered values while the downstream has credit.
  fn deliver_ready(&self) {
    loop {
      let item = {
        let mut children = self.children.lock().unwrap();
        let Some(index) = children
          .iter()
          .position(|entry| entry.state == ChildState::Ready)
        else {
          break;
        };
        if !credits::try_consume(&self.requested, 1) {
          break;
        }
        let entry = &mut children[index];
        let item = entry.child.sync.lock().unwrap().value.take();
        entry.state = ChildState::Idle;
        item
      };
      match item {
        Some(item) => self.stage.forward(item),
        None => debug_assert!(false, "ready child held no value"),
      }
    }
  }

  /// Phases 4 and 5: ask idle children for their next value, routing
  /// terminated ones to removal, then release the removed and run another
  /// pass if the live count may have hit zero.
  fn cycle_idle(&self) {
    let mut to_request: SmallVec<[_; 4]> = SmallVec::new();
    let mut removed: SmallVec<[_; 4]> = SmallVec::new();
    {
      let mut children = self.children.lock().unwrap();
      let mut index = 0;
      while index < children.len() {
        if children[index].state != ChildState::Idle {
          index += 1;
          continue;
        }
        let child = children[index].child.clone();
        let mut sync = child.sync.lock().unwrap();
        debug_assert!(sync.value.is_none());
        if sync.terminated {
          sync.freeze = true;
          drop(sync);
          children.swap_remove(index);
          removed.push(child);
        } else {
          drop(sync);
          children[index].state = ChildState::Pending;
          to_request.push(child);
          index += 1;
        }
      }
    }
    for child in &to_request {
      child.request(1);
    }
    if !removed.is_empty() {
      self.drain.reschedule();
    }
    for _child in removed {
      self.live.fetch_sub(1, Ordering::AcqRel);
    }
  }

  /// A child received its requested value.
  fn child_ready(&self, child: &ChildSubscriber<U, R, FR, G>, item: R) {
    {
      let mut children = self.children.lock().unwrap();
      let mut sync = child.sync.lock().unwrap();
      if sync.freeze {
        return;
      }
      debug_assert!(sync.value.is_none(), "child buffered a second value");
      sync.value = Some(item);
      if let Some(entry) = children
        .iter_mut()
        .find(|entry| std::ptr::eq(Arc::as_ptr(&entry.child), child))
      {
        entry.state = ChildState::Ready;
      }
    }
    self.drain();
  }

  /// A child terminated; its buffered value (if any) still gets
  /// delivered before the record is released.
  fn child_terminated(&self, child: &ChildSubscriber<U, R, FR, G>) {
    {
      let mut sync = child.sync.lock().unwrap();
      sync.terminated = true;
      if let Some(error) = sync.error.take() {
        *self.pending_error.lock().unwrap() = Some(error);
      }
      if sync.freeze {
        // The evicting drain pass owns this child.
        return;
      }
    }
    {
      let mut children = self.children.lock().unwrap();
      let mut sync = child.sync.lock().unwrap();
      if sync.freeze {
        return;
      }
      if let Some(index) = children
        .iter()
        .position(|entry| std::ptr::eq(Arc::as_ptr(&entry.child), child))
      {
        if sync.value.is_some() {
          children[index].state = ChildState::Ready;
        } else {
          drop(sync);
          children.swap_remove(index);
          self.live.fetch_sub(1, Ordering::AcqRel);
        }
      }
    }
    self.drain();
  }
}

impl<U, R, FR, G> BaseSubscriber for FlatMapSubscription<U, R, FR, G>
where
  U: Send + 'static,
  R: Send + 'static,
  FR: Flowable<Item = R> + 'static,
  G: Fn(U) -> Result<FR, FlowError> + Send + Sync + 'static,
{
  type Item = U;

  fn state(&self) -> &SubscriberState { self.stage.state() }

  fn on_subscribe_impl(&self) {
    self.live.fetch_add(1, Ordering::AcqRel);
    self.stage.handshake();
  }

  fn on_next_impl(&self, item: U) {
    if self.clear_all.load(Ordering::Acquire) {
      return;
    }
    let inner = match (self.func)(item) {
      Ok(inner) => inner,
      Err(error) => {
        *self.pending_error.lock().unwrap() = Some(error);
        self.drain();
        return;
      }
    };
    let Some(me) = self.this.upgrade() else { return };
    let child = Arc::new(ChildSubscriber {
      parent: TerminalSlot::new(me),
      state: SubscriberState::new(),
      sync: Mutex::new(ChildSync {
        value: None,
        terminated: false,
        freeze: false,
        error: None,
      }),
    });
    // Registered as pending before subscribing so a concurrent drain pass
    // cannot see it idle and request a second value.
    self
      .children
      .lock()
      .unwrap()
      .push(ChildEntry { child: child.clone(), state: ChildState::Pending });
    self.live.fetch_add(1, Ordering::AcqRel);
    inner.subscribe(child);
    self.drain();
  }

  fn on_complete_impl(&self) {}

  fn on_error_impl(&self, error: FlowError) {
    *self.pending_error.lock().unwrap() = Some(error);
    self.clear_all.store(true, Ordering::Release);
  }

  fn on_terminate_impl(&self) {
    self.live.fetch_sub(1, Ordering::AcqRel);
    self.drain();
  }
}

impl<U, R, FR, G> Subscription for FlatMapSubscription<U, R, FR, G>
where
  U: Send + 'static,
  R: Send + 'static,
  FR: Flowable<Item = R> + 'static,
  G: Fn(U) -> Result<FR, FlowError> + Send + Sync + 'static,
{
  fn request(&self, n: i64) {
    if n > 0 {
      credits::add(&self.requested, n);
      // Delivered results are paced by `requested`; the outer source is
      // always consumed eagerly.
      self.stage.request_upstream(credits::NO_FLOW_CONTROL);
    }
    self.drain();
  }

  fn cancel(&self) {
    self.clear_all.store(true, Ordering::Release);
    self.stage.cancel();
    self.drain();
  }
}

impl<U, R, FR, G> BaseSubscriber for ChildSubscriber<U, R, FR, G>
where
  U: Send + 'static,
  R: Send + 'static,
  FR: Flowable<Item = R> + 'static,
  G: Fn(U) -> Result<FR, FlowError> + Send + Sync + 'static,
{
  type Item = R;

  fn state(&self) -> &SubscriberState { &self.state }

  fn on_subscribe_impl(&self) {
    let clearing = match self.parent.get() {
      Some(parent) => parent.clear_all.load(Ordering::Acquire),
      None => true,
    };
    if clearing {
      self.cancel();
    } else {
      self.request(1);
    }
  }

  fn on_next_impl(&self, item: R) {
    if let Some(parent) = self.parent.get() {
      parent.child_ready(self, item);
    }
  }

  fn on_complete_impl(&self) {}

  fn on_error_impl(&self, error: FlowError) {
    self.sync.lock().unwrap().error = Some(error);
  }

  fn on_terminate_impl(&self) {
    if let Some(parent) = self.parent.take() {
      parent.child_terminated(self);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn merges_every_inner_stream() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 5)
      .flat_map(|v| source::just(v * 10))
      .subscribe(consumer.clone());

    let mut values = consumer.values();
    values.sort();
    assert_eq!(values, vec![0, 10, 20, 30, 40]);
    assert_eq!(consumer.terminal_count(), 1);
    assert!(consumer.is_completed());
  }

  #[test]
  fn inner_streams_may_be_longer_than_one_item() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 3)
      .flat_map(|v| source::just_n(vec![v, v + 100]))
      .subscribe(consumer.clone());

    let mut values = consumer.values();
    values.sort();
    assert_eq!(values, vec![0, 1, 2, 100, 101, 102]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn delivery_is_paced_by_downstream_credit() {
    let consumer = TestSubscriber::with_request(2);
    source::range(0, 10)
      .flat_map(source::just)
      .subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 2);
    assert!(!consumer.is_terminated());

    consumer.request(3);
    assert_eq!(consumer.value_count(), 5);
  }

  #[test]
  fn empty_inner_streams_still_complete_the_whole() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 4)
      .flat_map(|_| source::empty::<i64>())
      .subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    assert!(consumer.is_completed());
  }

  #[test]
  fn child_error_terminates_the_merge_once() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 5)
      .flat_map(|v| {
        if v == 2 {
          source::error(FlowError::message("child failed")).shared()
        } else {
          source::just(v).shared()
        }
      })
      .subscribe(consumer.clone());

    assert!(matches!(consumer.error(), Some(FlowError::Message(_))));
    assert_eq!(consumer.terminal_count(), 1);
  }

  #[test]
  fn mapper_error_terminates_the_merge() {
    let consumer = TestSubscriber::unbounded();
    source::range(0, 5)
      .try_flat_map(|v| {
        if v == 3 {
          Err(FlowError::message("mapper failed"))
        } else {
          Ok(source::just(v))
        }
      })
      .subscribe(consumer.clone());

    assert!(matches!(consumer.error(), Some(FlowError::Message(_))));
    assert_eq!(consumer.terminal_count(), 1);
  }

  #[test]
  fn cancel_cancels_outer_and_children() {
    let child_cancels = Arc::new(AtomicUsize::new(0));
    let outer_cancels = Arc::new(AtomicUsize::new(0));
    let consumer = TestSubscriber::with_request(1);
    {
      let child_cancels = child_cancels.clone();
      let outer_cancels = outer_cancels.clone();
      // Emits three items and then stalls without completing, so the
      // outer subscription is still live when the consumer cancels.
      let mut emitted = 0;
      let outer = source::create(move |emission: &mut Emission<i64>, _| {
        while emitted < 3 && emission.requested() > 0 {
          emission.next(emitted);
          emitted += 1;
        }
      });
      outer
        .do_on_cancel(move || {
          outer_cancels.fetch_add(1, Ordering::SeqCst);
        })
        .flat_map(move |_| {
          let child_cancels = child_cancels.clone();
          source::never::<i64>().do_on_cancel(move || {
            child_cancels.fetch_add(1, Ordering::SeqCst);
          })
        })
        .subscribe(consumer.clone());
    }

    consumer.cancel();
    assert_eq!(outer_cancels.load(Ordering::SeqCst), 1);
    assert_eq!(child_cancels.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn merge_flattens_a_stream_of_streams() {
    let consumer = TestSubscriber::unbounded();
    source::just_n(vec![
      source::just_n(vec![1, 2]).shared(),
      source::just_n(vec![3, 4]).shared(),
    ])
    .merge()
    .subscribe(consumer.clone());

    let mut values = consumer.values();
    values.sort();
    assert_eq!(values, vec![1, 2, 3, 4]);
    assert!(consumer.is_completed());
  }
}
