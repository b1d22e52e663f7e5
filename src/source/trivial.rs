use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::FlowError, flowable::Flowable, subscriber::Subscriber, subscription,
};

/// Completes the subscriber right after it subscribes; see [`empty`].
pub struct EmptyFlowable<T> {
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Flowable for EmptyFlowable<T> {
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    subscriber.on_subscribe(subscription::noop());
    // Completes without waiting for a request.
    subscriber.on_complete();
  }
}

/// A flowable that emits nothing and completes immediately.
pub fn empty<T: Send + 'static>() -> EmptyFlowable<T> {
  EmptyFlowable { _marker: PhantomData }
}

/// Never signals the subscriber after wiring it; see [`never`].
pub struct NeverFlowable<T> {
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Flowable for NeverFlowable<T> {
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    subscriber.on_subscribe(subscription::noop());
  }
}

/// A flowable that never terminates the subscriber.
pub fn never<T: Send + 'static>() -> NeverFlowable<T> {
  NeverFlowable { _marker: PhantomData }
}

/// Fails the subscriber right after it subscribes; see [`error`].
pub struct ErrorFlowable<T> {
  error: FlowError,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Flowable for ErrorFlowable<T> {
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    subscriber.on_subscribe(subscription::noop());
    // Fails without waiting for a request.
    subscriber.on_error(self.error.clone());
  }
}

/// A flowable that terminates every subscriber with `error`.
pub fn error<T: Send + 'static>(error: FlowError) -> ErrorFlowable<T> {
  ErrorFlowable { error, _marker: PhantomData }
}
