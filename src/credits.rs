//! Credit arithmetic for the backpressure protocol.
//!
//! A producer-side subscription tracks how many items it may still deliver
//! in a shared signed 64-bit counter. Two values are sentinels:
//! [`NO_FLOW_CONTROL`] means the consumer accepts an unbounded stream and
//! [`CANCELED`] means the subscription ended. Every mutation is a
//! compare-and-swap retry loop so concurrent `request`/`cancel`/delivery
//! never lose an update.

use std::sync::atomic::{AtomicI64, Ordering};

/// Credit value meaning "no flow control requested".
pub const NO_FLOW_CONTROL: i64 = i64::MAX;

/// Sentinel meaning the subscription was cancelled. One-way: once a
/// counter holds this value it never changes again.
pub const CANCELED: i64 = i64::MIN;

#[inline]
pub fn is_infinite(value: i64) -> bool { value == NO_FLOW_CONTROL }

#[inline]
pub fn is_canceled(value: i64) -> bool { value == CANCELED }

/// Saturating add over plain credit values. Non-positive deltas are
/// absorbed and a cancelled value stays cancelled; the result saturates at
/// [`NO_FLOW_CONTROL`].
pub fn add_values(current: i64, delta: i64) -> i64 {
  if current == CANCELED || delta <= 0 {
    return current;
  }
  current.saturating_add(delta)
}

/// Adds `delta` credits to `counter`. Returns the value now stored.
pub fn add(counter: &AtomicI64, delta: i64) -> i64 {
  let mut current = counter.load(Ordering::Acquire);
  loop {
    let next = add_values(current, delta);
    if next == current {
      return current;
    }
    match counter.compare_exchange_weak(
      current,
      next,
      Ordering::AcqRel,
      Ordering::Acquire,
    ) {
      Ok(_) => return next,
      Err(observed) => current = observed,
    }
  }
}

/// Consumes `n` credits. The unbounded sentinel is unaffected and the
/// counter never drops below zero. Returns the value now stored.
pub fn consume(counter: &AtomicI64, n: i64) -> i64 {
  let mut current = counter.load(Ordering::Acquire);
  loop {
    if current == CANCELED || current == NO_FLOW_CONTROL || n <= 0 {
      return current;
    }
    let next = (current - n).max(0);
    match counter.compare_exchange_weak(
      current,
      next,
      Ordering::AcqRel,
      Ordering::Acquire,
    ) {
      Ok(_) => return next,
      Err(observed) => current = observed,
    }
  }
}

/// Consumes `n` credits only if that many are outstanding. Always succeeds
/// on an unbounded counter, never on a cancelled one.
pub fn try_consume(counter: &AtomicI64, n: i64) -> bool {
  let mut current = counter.load(Ordering::Acquire);
  loop {
    if current == CANCELED {
      return false;
    }
    if current == NO_FLOW_CONTROL {
      return true;
    }
    if current < n {
      return false;
    }
    match counter.compare_exchange_weak(
      current,
      current - n,
      Ordering::AcqRel,
      Ordering::Acquire,
    ) {
      Ok(_) => return true,
      Err(observed) => current = observed,
    }
  }
}

/// Marks the counter cancelled. Returns whether *this* call performed the
/// transition, so exactly one caller releases the resources it guards.
pub fn cancel(counter: &AtomicI64) -> bool {
  counter.swap(CANCELED, Ordering::AcqRel) != CANCELED
}
