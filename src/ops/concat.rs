use std::sync::{Arc, Mutex, Weak};

use crate::{
  base::{BaseSubscriber, SubscriberState},
  credits,
  error::FlowError,
  flowable::Flowable,
  subscriber::Subscriber,
  subscription::{Subscription, TerminalSlot},
};

/// Emits the first stream, then the second; created by
/// [`FlowableExt::concat_with`](crate::flowable::FlowableExt::concat_with).
///
/// The second source is subscribed only after the first completes, with
/// the consumer's leftover credit as its initial request.
pub struct ConcatWithOp<S1, S2> {
  first: S1,
  second: Arc<S2>,
}

impl<S1, S2> ConcatWithOp<S1, S2> {
  pub(crate) fn new(first: S1, second: S2) -> Self {
    ConcatWithOp { first, second: Arc::new(second) }
  }
}

impl<S1, S2> Flowable for ConcatWithOp<S1, S2>
where
  S1: Flowable,
  S2: Flowable<Item = S1::Item> + 'static,
{
  type Item = S1::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = Self::Item>>) {
    let second = self.second.clone();
    let parent = Arc::new_cyclic(|weak| ConcatSubscription {
      downstream: TerminalSlot::new(subscriber),
      second,
      inner: Mutex::new(ConcatInner { requested: 0, current: None }),
      this: weak.clone(),
    });
    let segment = Arc::new(SegmentSubscriber {
      parent,
      first: true,
      state: SubscriberState::new(),
    });
    self.first.subscribe(segment);
  }
}

struct ConcatInner {
  /// Outstanding downstream credit, shared by both segments.
  requested: i64,
  /// Subscription of whichever segment is currently active.
  current: Option<Arc<dyn Subscription>>,
}

struct ConcatSubscription<T, S2> {
  downstream: TerminalSlot<dyn Subscriber<Item = T>>,
  second: Arc<S2>,
  inner: Mutex<ConcatInner>,
  this: Weak<ConcatSubscription<T, S2>>,
}

impl<T, S2> ConcatSubscription<T, S2>
where
  T: Send + 'static,
  S2: Flowable<Item = T> + 'static,
{
  fn attach(&self, upstream: Option<Arc<dyn Subscription>>, first: bool) {
    if self.downstream.is_empty() {
      // Cancelled before this segment wired up.
      if let Some(upstream) = upstream {
        upstream.cancel();
      }
      return;
    }
    let leftover = {
      let mut inner = self.inner.lock().unwrap();
      inner.current = upstream.clone();
      if first { None } else { Some(inner.requested) }
    };
    if first {
      if let (Some(this), Some(downstream)) =
        (self.this.upgrade(), self.downstream.get())
      {
        downstream.on_subscribe(this);
      }
    } else if let (Some(n), Some(upstream)) = (leftover, upstream) {
      if n > 0 {
        upstream.request(n);
      }
    }
  }

  fn relay(&self, item: T) {
    {
      let mut inner = self.inner.lock().unwrap();
      if !credits::is_infinite(inner.requested) && inner.requested > 0 {
        inner.requested -= 1;
      }
    }
    if let Some(downstream) = self.downstream.get() {
      downstream.on_next(item);
    }
  }

  fn segment_complete(&self, first: bool) {
    if !first {
      if let Some(downstream) = self.downstream.take() {
        downstream.on_complete();
      }
      return;
    }
    self.inner.lock().unwrap().current = None;
    if self.downstream.is_empty() {
      return;
    }
    let Some(this) = self.this.upgrade() else { return };
    let second = self.second.clone();
    let segment = Arc::new(SegmentSubscriber {
      parent: this,
      first: false,
      state: SubscriberState::new(),
    });
    second.subscribe(segment);
  }

  fn segment_error(&self, error: FlowError) {
    self.inner.lock().unwrap().current = None;
    if let Some(downstream) = self.downstream.take() {
      downstream.on_error(error);
    }
  }
}

impl<T, S2> Subscription for ConcatSubscription<T, S2>
where
  T: Send + 'static,
  S2: Flowable<Item = T> + 'static,
{
  fn request(&self, n: i64) {
    if n <= 0 {
      return;
    }
    let current = {
      let mut inner = self.inner.lock().unwrap();
      inner.requested = credits::add_values(inner.requested, n);
      inner.current.clone()
    };
    if let Some(current) = current {
      current.request(n);
    }
  }

  fn cancel(&self) {
    drop(self.downstream.take());
    let current = self.inner.lock().unwrap().current.take();
    if let Some(current) = current {
      current.cancel();
    }
  }
}

struct SegmentSubscriber<T, S2> {
  parent: Arc<ConcatSubscription<T, S2>>,
  first: bool,
  state: SubscriberState,
}

impl<T, S2> BaseSubscriber for SegmentSubscriber<T, S2>
where
  T: Send + 'static,
  S2: Flowable<Item = T> + 'static,
{
  type Item = T;

  fn state(&self) -> &SubscriberState { &self.state }

  fn on_subscribe_impl(&self) {
    self.parent.attach(self.state.get(), self.first);
  }

  fn on_next_impl(&self, item: T) { self.parent.relay(item) }

  fn on_complete_impl(&self) { self.parent.segment_complete(self.first) }

  fn on_error_impl(&self, error: FlowError) {
    self.parent.segment_error(error)
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn emits_both_streams_in_order() {
    let consumer = TestSubscriber::unbounded();
    source::just_n(vec![1, 2])
      .concat_with(source::just_n(vec![3, 4]))
      .subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![1, 2, 3, 4]);
    assert!(consumer.is_completed());
    assert_eq!(consumer.terminal_count(), 1);
  }

  #[test]
  fn second_is_not_subscribed_before_the_first_completes() {
    let second_subscribed = Arc::new(AtomicBool::new(false));
    let flag = second_subscribed.clone();
    let second = source::just(99).do_on_subscribe(move || {
      flag.store(true, Ordering::SeqCst);
    });

    let consumer = TestSubscriber::with_request(1);
    source::just_n(vec![1, 2]).concat_with(second).subscribe(consumer.clone());

    // First stream still has an item left: second must stay cold.
    assert_eq!(consumer.values(), vec![1]);
    assert!(!second_subscribed.load(Ordering::SeqCst));

    consumer.request(1);
    assert!(second_subscribed.load(Ordering::SeqCst));
    consumer.request(1);
    assert_eq!(consumer.values(), vec![1, 2, 99]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn leftover_credit_carries_into_the_second_stream() {
    let consumer = TestSubscriber::with_request(3);
    source::just_n(vec![1, 2])
      .concat_with(source::just_n(vec![3, 4]))
      .subscribe(consumer.clone());
    // Two from the first stream, the leftover one from the second.
    assert_eq!(consumer.values(), vec![1, 2, 3]);
    assert!(!consumer.is_terminated());

    consumer.request(1);
    assert_eq!(consumer.values(), vec![1, 2, 3, 4]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn error_in_the_first_stream_skips_the_second() {
    let second_subscribed = Arc::new(AtomicUsize::new(0));
    let flag = second_subscribed.clone();
    let second = source::just(1).do_on_subscribe(move || {
      flag.fetch_add(1, Ordering::SeqCst);
    });

    let consumer = TestSubscriber::<i32>::unbounded();
    source::error(FlowError::message("first failed"))
      .concat_with(second)
      .subscribe(consumer.clone());

    assert!(consumer.error().is_some());
    assert_eq!(second_subscribed.load(Ordering::SeqCst), 0);
  }
}
