//! Operators.
//!
//! An operator is a [`Flowable`](crate::flowable::Flowable) wrapping an
//! upstream flowable. Its `subscribe` creates one object that plays both
//! protocol roles at once: a subscriber of the upstream and a subscription
//! for the downstream. [`Stage`] carries those two halves; each operator
//! module layers its transformation on top.

pub mod backpressure;
pub mod concat;
pub mod do_on;
pub mod filter;
pub mod flat_map;
pub mod ignore_elements;
pub mod map;
pub mod map_err;
pub mod observe_on;
pub mod reduce;
pub mod skip;
pub mod subscribe_on;
pub mod take;
pub mod timeout;

use std::sync::{Arc, Weak};

use crate::{
  base::SubscriberState,
  error::FlowError,
  subscriber::Subscriber,
  subscription::{Subscription, TerminalSlot},
};

/// The two halves of an operator subscription.
///
/// `downstream` is the swap-to-null subscriber reference (releasing it is
/// the one observable side effect of a downstream terminal), `upstream` the
/// lifecycle cell of this stage's own subscription to the source. The weak
/// self-reference lets the stage hand itself to the downstream during the
/// `on_subscribe` handshake.
pub(crate) struct Stage<D> {
  downstream: TerminalSlot<dyn Subscriber<Item = D>>,
  upstream: SubscriberState,
  this: Weak<dyn Subscription>,
}

impl<D: Send + 'static> Stage<D> {
  pub fn new<X>(
    downstream: Arc<dyn Subscriber<Item = D>>,
    this: &Weak<X>,
  ) -> Self
  where
    X: Subscription + 'static,
  {
    let this: Weak<dyn Subscription> = this.clone();
    Stage {
      downstream: TerminalSlot::new(downstream),
      upstream: SubscriberState::new(),
      this,
    }
  }

  pub fn state(&self) -> &SubscriberState { &self.upstream }

  /// Completes the wiring: hands this stage to the downstream as its
  /// subscription.
  pub fn handshake(&self) {
    if let (Some(this), Some(downstream)) =
      (self.this.upgrade(), self.downstream.get())
    {
      downstream.on_subscribe(this);
    }
  }

  pub fn forward(&self, item: D) {
    if let Some(downstream) = self.downstream.get() {
      downstream.on_next(item);
    }
  }

  pub fn request_upstream(&self, n: i64) {
    if let Some(upstream) = self.upstream.get() {
      upstream.request(n);
    }
  }

  /// Downstream-initiated cancel: releases the subscriber and cancels the
  /// upstream, each exactly once.
  pub fn cancel(&self) {
    drop(self.downstream.take());
    if let Some(upstream) = self.upstream.terminate() {
      upstream.cancel();
    }
  }

  /// Terminates both ends normally: cancels up, completes down.
  pub fn terminate(&self) {
    let downstream = self.downstream.take();
    if let Some(upstream) = self.upstream.terminate() {
      upstream.cancel();
    }
    if let Some(downstream) = downstream {
      downstream.on_complete();
    }
  }

  /// Terminates both ends with an error.
  pub fn terminate_err(&self, error: FlowError) {
    let downstream = self.downstream.take();
    if let Some(upstream) = self.upstream.terminate() {
      upstream.cancel();
    }
    if let Some(downstream) = downstream {
      downstream.on_error(error);
    }
  }

  /// Upstream completed: release and complete the downstream.
  pub fn complete_downstream(&self) {
    if let Some(downstream) = self.downstream.take() {
      downstream.on_complete();
    }
  }

  /// Upstream failed: release and fail the downstream.
  pub fn error_downstream(&self, error: FlowError) {
    if let Some(downstream) = self.downstream.take() {
      downstream.on_error(error);
    }
  }

  /// Whether the downstream can still receive signals.
  pub fn is_live(&self) -> bool { !self.downstream.is_empty() }
}
