use std::sync::Arc;

use crate::{flowable::Flowable, subscriber::Subscriber};

/// Calls the factory at subscribe time so each subscriber gets a sequence
/// generated afresh; see [`defer`].
pub struct DeferFlowable<F> {
  factory: F,
}

impl<F, FR> Flowable for DeferFlowable<F>
where
  F: Fn() -> FR + Send + Sync,
  FR: Flowable,
{
  type Item = FR::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = Self::Item>>) {
    (self.factory)().subscribe(subscriber)
  }
}

/// Defers building the underlying flowable until a subscriber arrives.
pub fn defer<F, FR>(factory: F) -> DeferFlowable<F>
where
  F: Fn() -> FR + Send + Sync,
  FR: Flowable,
{
  DeferFlowable { factory }
}
