use std::{sync::Arc, time::Duration};

use crate::{
  base::BaseSubscriber,
  credits,
  error::FlowError,
  executor::Executor,
  ops::{
    backpressure::{BackpressureStrategy, OnBackpressureOp},
    concat::ConcatWithOp,
    do_on::{noop0, noop_err, noop_item, noop_req, DoCallbacks, DoOp},
    filter::FilterOp,
    flat_map::{FlatMapOp, TryFlatMapOp},
    ignore_elements::IgnoreElementsOp,
    map::{MapOp, TryMapOp},
    map_err::MapErrOp,
    observe_on::ObserveOnOp,
    reduce::ReduceOp,
    skip::SkipOp,
    subscribe_on::SubscribeOnOp,
    take::TakeOp,
    timeout::TimeoutOp,
  },
  subscriber::{Disposable, LambdaSubscriber, Subscriber},
  timer::Timer,
};

/// A cold, repeatable description of an item sequence.
///
/// Subscribing wires the chain from the tail toward the head and hands the
/// subscriber a [`Subscription`](crate::subscription::Subscription) it uses
/// to pull items. Every subscription is independent: the descriptor itself
/// holds no per-consumer state.
pub trait Flowable: Send + Sync {
  type Item: Send + 'static;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = Self::Item>>);
}

/// Type-erased flowable, the form handed across crate boundaries (for
/// example to a transport layer feeding frames in or out).
pub type SharedFlowable<T> = Arc<dyn Flowable<Item = T>>;

impl<F> Flowable for Arc<F>
where
  F: Flowable + ?Sized,
{
  type Item = F::Item;

  #[inline]
  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = Self::Item>>) {
    (**self).subscribe(subscriber)
  }
}

/// Fluent composition methods available on every [`Flowable`].
pub trait FlowableExt: Flowable + Sized {
  /// Transforms each item with `f`.
  fn map<D, F>(self, f: F) -> MapOp<Self, F>
  where
    D: Send + 'static,
    F: Fn(Self::Item) -> D + Send + Sync + 'static,
  {
    MapOp::new(self, f)
  }

  /// Transforms each item with a fallible `f`; an `Err` terminates the
  /// stream with that error and cancels the upstream.
  fn try_map<D, F>(self, f: F) -> TryMapOp<Self, F>
  where
    D: Send + 'static,
    F: Fn(Self::Item) -> Result<D, FlowError> + Send + Sync + 'static,
  {
    TryMapOp::new(self, f)
  }

  /// Rewrites a terminal error before it reaches the downstream.
  fn map_err<F>(self, f: F) -> MapErrOp<Self, F>
  where
    F: Fn(FlowError) -> FlowError + Send + Sync + 'static,
  {
    MapErrOp::new(self, f)
  }

  /// Keeps only the items matching `predicate`; rejected items refill
  /// their credit upstream.
  fn filter<F>(self, predicate: F) -> FilterOp<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    FilterOp::new(self, predicate)
  }

  /// Folds the stream with `f`, seeding the accumulator with the first
  /// item, and emits the single result on completion. An empty source
  /// completes without a value.
  fn reduce<F>(self, f: F) -> ReduceOp<Self, F>
  where
    F: Fn(Self::Item, Self::Item) -> Self::Item + Send + Sync + 'static,
  {
    ReduceOp::new(self, f)
  }

  /// Forwards at most `limit` items, then completes and cancels upstream.
  fn take(self, limit: i64) -> TakeOp<Self> { TakeOp::new(self, limit) }

  /// Swallows the first `count` items without charging them to the
  /// downstream's credit.
  fn skip(self, count: i64) -> SkipOp<Self> { SkipOp::new(self, count) }

  /// Swallows every item; only the terminal signal reaches downstream.
  fn ignore_elements(self) -> IgnoreElementsOp<Self> {
    IgnoreElementsOp::new(self)
  }

  /// Emits every item of this stream, then every item of `next`. The
  /// second source is not subscribed before the first completes.
  fn concat_with<S2>(self, next: S2) -> ConcatWithOp<Self, S2>
  where
    S2: Flowable<Item = Self::Item> + 'static,
  {
    ConcatWithOp::new(self, next)
  }

  /// Maps every item to an inner flowable and merges the inner streams in
  /// arrival order.
  fn flat_map<F, FR>(self, f: F) -> FlatMapOp<Self, F>
  where
    FR: Flowable + 'static,
    F: Fn(Self::Item) -> FR + Send + Sync + 'static,
  {
    FlatMapOp::new(self, f)
  }

  /// Fallible [`flat_map`](Self::flat_map): a mapper error terminates the
  /// merged stream.
  fn try_flat_map<F, FR>(self, f: F) -> TryFlatMapOp<Self, F>
  where
    FR: Flowable + 'static,
    F: Fn(Self::Item) -> Result<FR, FlowError> + Send + Sync + 'static,
  {
    TryFlatMapOp::new(self, f)
  }

  /// Flattens a stream of flowables.
  fn merge(self) -> FlatMapOp<Self, fn(Self::Item) -> Self::Item>
  where
    Self::Item: Flowable + 'static,
  {
    FlatMapOp::new(self, (|inner| inner) as fn(Self::Item) -> Self::Item)
  }

  /// Runs `f` when the downstream gets its subscription.
  #[allow(clippy::type_complexity)]
  fn do_on_subscribe<F>(
    self,
    f: F,
  ) -> DoOp<Self, F, fn(&Self::Item), fn(&FlowError), fn(), fn(i64), fn()>
  where
    F: Fn() + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: f,
        on_next: noop_item::<Self::Item> as fn(&Self::Item),
        on_error: noop_err as fn(&FlowError),
        on_complete: noop0 as fn(),
        on_request: noop_req as fn(i64),
        on_cancel: noop0 as fn(),
      },
    )
  }

  /// Runs `f` for every item before it is forwarded.
  #[allow(clippy::type_complexity)]
  fn do_on_next<F>(
    self,
    f: F,
  ) -> DoOp<Self, fn(), F, fn(&FlowError), fn(), fn(i64), fn()>
  where
    F: Fn(&Self::Item) + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: noop0 as fn(),
        on_next: f,
        on_error: noop_err as fn(&FlowError),
        on_complete: noop0 as fn(),
        on_request: noop_req as fn(i64),
        on_cancel: noop0 as fn(),
      },
    )
  }

  /// Runs `f` when the stream fails, before the error is forwarded.
  #[allow(clippy::type_complexity)]
  fn do_on_error<F>(
    self,
    f: F,
  ) -> DoOp<Self, fn(), fn(&Self::Item), F, fn(), fn(i64), fn()>
  where
    F: Fn(&FlowError) + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: noop0 as fn(),
        on_next: noop_item::<Self::Item> as fn(&Self::Item),
        on_error: f,
        on_complete: noop0 as fn(),
        on_request: noop_req as fn(i64),
        on_cancel: noop0 as fn(),
      },
    )
  }

  /// Runs `f` when the stream completes.
  #[allow(clippy::type_complexity)]
  fn do_on_complete<F>(
    self,
    f: F,
  ) -> DoOp<Self, fn(), fn(&Self::Item), fn(&FlowError), F, fn(i64), fn()>
  where
    F: Fn() + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: noop0 as fn(),
        on_next: noop_item::<Self::Item> as fn(&Self::Item),
        on_error: noop_err as fn(&FlowError),
        on_complete: f,
        on_request: noop_req as fn(i64),
        on_cancel: noop0 as fn(),
      },
    )
  }

  /// Runs `f` for every downstream `request(n)`.
  #[allow(clippy::type_complexity)]
  fn do_on_request<F>(
    self,
    f: F,
  ) -> DoOp<Self, fn(), fn(&Self::Item), fn(&FlowError), fn(), F, fn()>
  where
    F: Fn(i64) + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: noop0 as fn(),
        on_next: noop_item::<Self::Item> as fn(&Self::Item),
        on_error: noop_err as fn(&FlowError),
        on_complete: noop0 as fn(),
        on_request: f,
        on_cancel: noop0 as fn(),
      },
    )
  }

  /// Runs `f` when the downstream cancels.
  #[allow(clippy::type_complexity)]
  fn do_on_cancel<F>(
    self,
    f: F,
  ) -> DoOp<Self, fn(), fn(&Self::Item), fn(&FlowError), fn(), fn(i64), F>
  where
    F: Fn() + Send + Sync + 'static,
  {
    DoOp::new(
      self,
      DoCallbacks {
        on_subscribe: noop0 as fn(),
        on_next: noop_item::<Self::Item> as fn(&Self::Item),
        on_error: noop_err as fn(&FlowError),
        on_complete: noop0 as fn(),
        on_request: noop_req as fn(i64),
        on_cancel: f,
      },
    )
  }

  /// Runs `f` on either terminal signal.
  fn do_on_terminate<F>(self, f: F) -> impl Flowable<Item = Self::Item>
  where
    F: Fn() + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let on_error = {
      let f = f.clone();
      move |_: &FlowError| f()
    };
    self.do_on_error(on_error).do_on_complete(move || f())
  }

  /// Runs `f` for every signal: each item and either terminal.
  fn do_on_each<F>(self, f: F) -> impl Flowable<Item = Self::Item>
  where
    F: Fn() + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let on_next = {
      let f = f.clone();
      move |_: &Self::Item| f()
    };
    let on_error = {
      let f = f.clone();
      move |_: &FlowError| f()
    };
    self
      .do_on_next(on_next)
      .do_on_error(on_error)
      .do_on_complete(move || f())
  }

  /// Decouples an eager upstream from downstream credit with the given
  /// overflow strategy.
  fn on_backpressure(
    self,
    strategy: BackpressureStrategy,
  ) -> OnBackpressureOp<Self> {
    OnBackpressureOp::new(self, strategy)
  }

  /// Performs the subscription-time wiring (`on_subscribe`, `request`,
  /// `cancel` traveling upstream) on `executor`.
  fn subscribe_on<E>(self, executor: E) -> SubscribeOnOp<Self>
  where
    E: Executor + 'static,
  {
    SubscribeOnOp::new(self, executor)
  }

  /// Delivers downstream signals (`on_next`, `on_complete`, `on_error`)
  /// on `executor`, one task per signal. Order is preserved when the
  /// executor runs tasks in submission order.
  fn observe_on<E>(self, executor: E) -> ObserveOnOp<Self>
  where
    E: Executor + 'static,
  {
    ObserveOnOp::new(self, executor)
  }

  /// Fails with [`FlowError::Timeout`] if the first item takes longer
  /// than `initial` or any later item longer than `per_item`. A zero
  /// duration disables the corresponding deadline.
  fn timeout<Ti>(
    self,
    timer: Ti,
    per_item: Duration,
    initial: Duration,
  ) -> TimeoutOp<Self>
  where
    Ti: Timer + 'static,
  {
    TimeoutOp::new(self, timer, per_item, initial)
  }

  /// Erases the concrete operator chain type.
  fn shared(self) -> SharedFlowable<Self::Item>
  where
    Self: 'static,
  {
    Arc::new(self)
  }

  /// Subscribes with an item callback and no flow control. Errors are
  /// logged and completion is ignored.
  fn subscribe_next<N>(self, next: N) -> Disposable
  where
    N: Fn(Self::Item) + Send + Sync + 'static,
  {
    self.subscribe_with(
      next,
      |error| tracing::warn!("unhandled stream error: {error}"),
      || {},
      credits::NO_FLOW_CONTROL,
    )
  }

  /// Subscribes with callbacks for every signal and the given request
  /// batch size (`<= 0` means no flow control).
  fn subscribe_with<N, E, C>(
    self,
    next: N,
    error: E,
    complete: C,
    batch: i64,
  ) -> Disposable
  where
    N: Fn(Self::Item) + Send + Sync + 'static,
    E: Fn(FlowError) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
  {
    let subscriber = LambdaSubscriber::new(next, error, complete, batch);
    self.subscribe(subscriber.clone());
    Disposable::new(move || subscriber.cancel())
  }
}

impl<S: Flowable> FlowableExt for S {}
